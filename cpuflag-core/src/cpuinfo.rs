//! `/proc/cpuinfo` parsing for host and guest.

use std::fs;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};
use crate::flag::FlagSet;

pub const DEFAULT_CPUINFO_PATH: &str = "/proc/cpuinfo";

static FLAGS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^flags\s*:(.*)$").expect("static regex"));
static VENDOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^vendor_id\s*:\s*(\S+)").expect("static regex"));

/// Flags from the first `flags : ...` line of cpuinfo output.
pub fn parse_cpu_flags(cpuinfo: &str) -> Result<FlagSet> {
    FLAGS_RE
        .captures(cpuinfo)
        .and_then(|caps| caps.get(1))
        .map(|m| FlagSet::parse_whitespace(m.as_str()))
        .ok_or_else(|| Error::GuestFlags("no 'flags' line in cpuinfo output".to_string()))
}

pub fn parse_vendor(cpuinfo: &str) -> Option<String> {
    VENDOR_RE
        .captures(cpuinfo)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Vendor and feature flags of the machine running the check.
#[derive(Debug, Clone, Default)]
pub struct HostCpu {
    pub vendor: Option<String>,
    pub flags: FlagSet,
}

impl HostCpu {
    pub fn from_cpuinfo(cpuinfo: &str) -> Result<Self> {
        Ok(Self {
            vendor: parse_vendor(cpuinfo),
            flags: parse_cpu_flags(cpuinfo)?,
        })
    }

    pub fn detect(path: &Path) -> Result<Self> {
        let cpuinfo = fs::read_to_string(path)?;
        Self::from_cpuinfo(&cpuinfo)
    }
}
