//! Guest CPU feature flag verification.
//!
//! Given a QEMU CPU model dump, the host's cpuinfo and the `-cpu` boot string,
//! this crate works out which flags a guest should expose and compares that
//! against what the guest reports.

pub mod check;
pub mod cpuinfo;
pub mod dump;
pub mod error;
pub mod extra;
pub mod flag;
pub mod host;
pub mod qemu;
pub mod reconcile;
pub mod report;
pub mod session;

pub use check::{CheckPlan, Expectation, FlagCheck};
pub use cpuinfo::HostCpu;
pub use dump::{ModelDump, ModelInfo};
pub use error::{Error, Result};
pub use extra::ExtraFlags;
pub use flag::{Flag, FlagSet};
pub use qemu::{CapturedQuery, QemuProbe, RecognisedFlags};
pub use report::FlagReport;
pub use session::{CommandSession, FileSession, GuestSession};
