//! Flag set reconciliation.
//!
//! ```text
//! expected   = (model ∪ added) − removed − out
//! lack       = (expected ∪ requested) − host
//! missing    = expected − guest
//! unexpected = guest − expected − recognised − option
//! ```

use crate::extra::ExtraFlags;
use crate::flag::{Flag, FlagSet};

/// Flag the kernel reports on uniprocessor guests.
pub const UNIPROCESSOR_FLAG: &str = "up";

/// Flags the guest should expose given the model and the boot request.
pub fn expected_flags(
    model: &FlagSet,
    extra: &ExtraFlags,
    host: &FlagSet,
    out: &FlagSet,
) -> FlagSet {
    model
        .union(&extra.added(host))
        .difference(&extra.removed(host))
        .difference(out)
}

/// Expected or requested flags the host cannot provide.
pub fn lack_flags(expected: &FlagSet, extra: &ExtraFlags, host: &FlagSet) -> FlagSet {
    expected.union(&extra.added_all()).difference(host)
}

/// Option flags plus `up` for single-vCPU guests.
pub fn effective_option_flags(option: &FlagSet, smp: u32) -> FlagSet {
    let mut flags = option.clone();
    if smp == 1 {
        flags.insert(Flag::new(UNIPROCESSOR_FLAG));
    }
    flags
}

/// Result of comparing the guest against the expectation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Comparison {
    pub missing: FlagSet,
    pub unexpected: FlagSet,
}

impl Comparison {
    pub fn is_match(&self) -> bool {
        self.missing.is_empty() && self.unexpected.is_empty()
    }
}

/// Extra guest flags are tolerated when QEMU itself knows them or when they
/// are listed as option flags.
pub fn compare(
    expected: &FlagSet,
    guest: &FlagSet,
    recognised: &FlagSet,
    option: &FlagSet,
) -> Comparison {
    Comparison {
        missing: expected.difference(guest),
        unexpected: guest
            .difference(expected)
            .difference(recognised)
            .difference(option),
    }
}

/// Lacking flags QEMU did not warn about in its output.
pub fn unwarned_lack_flags(lack: &FlagSet, qemu_output: &str) -> FlagSet {
    lack.iter()
        .filter(|flag| !flag.spellings().any(|name| qemu_output.contains(name)))
        .cloned()
        .collect()
}
