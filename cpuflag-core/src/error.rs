use std::fmt::{self, Display, Formatter};
use thiserror::Error;

use crate::flag::FlagSet;
use crate::report::FlagReport;

#[derive(Error, Debug)]
pub enum Error {
    Io(#[from] std::io::Error),
    Dump(String),
    GuestFlags(String),
    NoHostModel(Option<String>),
    Command(String),
    Timeout(String),
    Pattern(String),
    MissingLackWarning(FlagSet),
    Mismatch(Box<FlagReport>),
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Dump(s) => write!(f, "CPU model dump error: {}", s),
            Error::GuestFlags(s) => write!(f, "Failed to get guest cpu flags: {}", s),
            Error::NoHostModel(vendor) => {
                write!(f, "No known CPU model matches the host")?;
                match vendor {
                    Some(v) => write!(f, " (vendor {})", v),
                    None => write!(f, " (vendor_id missing from cpuinfo)"),
                }
            }
            Error::Command(s) => write!(f, "Command failed: {}", s),
            Error::Timeout(s) => write!(f, "Timed out: {}", s),
            Error::Pattern(s) => write!(f, "Invalid pattern: {}", s),
            Error::MissingLackWarning(flags) => {
                write!(f, "no warning for lack flag {}", flags)
            }
            Error::Mismatch(report) => write!(f, "{}", report),
        }
    }
}

impl From<regex::Error> for Error {
    fn from(err: regex::Error) -> Self {
        Error::Pattern(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
