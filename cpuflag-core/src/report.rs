use std::fmt;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::flag::FlagSet;

/// Outcome of one flag check.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FlagReport {
    pub guest_model: Option<String>,
    pub qemu_model: String,
    pub expected: FlagSet,
    pub guest: FlagSet,
    pub missing: FlagSet,
    pub unexpected: FlagSet,
    pub lack: FlagSet,
    /// Lacking flags QEMU should have warned about but did not. Only filled
    /// when the `check` option was requested.
    pub unwarned: FlagSet,
    pub passed: bool,
}

impl FlagReport {
    pub fn update_status(&mut self) {
        self.passed =
            self.missing.is_empty() && self.unexpected.is_empty() && self.unwarned.is_empty();
    }

    /// Converts a failed report into the matching error.
    pub fn into_result(self) -> Result<FlagReport> {
        if !self.unwarned.is_empty() {
            return Err(Error::MissingLackWarning(self.unwarned));
        }
        if !self.missing.is_empty() || !self.unexpected.is_empty() {
            return Err(Error::Mismatch(Box::new(self)));
        }
        Ok(self)
    }
}

impl fmt::Display for FlagReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "missing flags:\n {}", self.missing)?;
        writeln!(f, "more flags than expected:\n {}", self.unexpected)?;
        writeln!(f, "expected flags:\n {}", self.expected)?;
        write!(f, "guest flags:\n {}", self.guest)?;
        if !self.unwarned.is_empty() {
            write!(f, "\nno warning for lack flags:\n {}", self.unwarned)?;
        }
        Ok(())
    }
}
