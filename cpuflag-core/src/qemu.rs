//! Flags the QEMU binary itself recognises.

use std::fs;
use std::path::PathBuf;

use duct::cmd;
use regex::Regex;
use tracing::{debug, info};
use which::which;

use crate::error::{Error, Result};
use crate::flag::FlagSet;

pub const DEFAULT_QUERY_CMD: &str = "-cpu ?";
pub const DEFAULT_FLAGS_PATTERN: &str = "flags:(.*)";

const QEMU_CANDIDATES: &[&str] = &["qemu-kvm", "qemu-system-x86_64"];
const QEMU_LIBEXEC: &str = "/usr/libexec/qemu-kvm";

/// Source of the flags QEMU knows about. Guest flags in this set are never
/// reported as unexpected.
pub trait RecognisedFlags {
    fn recognised_flags(&self) -> Result<FlagSet>;
}

impl RecognisedFlags for FlagSet {
    fn recognised_flags(&self) -> Result<FlagSet> {
        Ok(self.clone())
    }
}

/// Extracts the flag list following `pattern` in a QEMU query output. The
/// capture group and everything after the match are taken, since QEMU wraps
/// the list over several lines.
pub fn parse_recognised_flags(output: &str, pattern: &Regex) -> FlagSet {
    let Some(caps) = pattern.captures(output) else {
        return FlagSet::new();
    };
    let Some(whole) = caps.get(0) else {
        return FlagSet::new();
    };
    let mut flags = caps
        .get(1)
        .map(|m| FlagSet::parse_whitespace(m.as_str()))
        .unwrap_or_default();
    flags.extend(FlagSet::parse_whitespace(&output[whole.end()..]).iter().cloned());
    flags
}

/// Resolves the QEMU binary: explicit path, then `PATH`, then libexec.
pub fn find_qemu_binary(explicit: Option<&str>) -> Result<PathBuf> {
    if let Some(binary) = explicit {
        return which(binary).or_else(|_| {
            let path = PathBuf::from(binary);
            if path.exists() {
                Ok(path)
            } else {
                Err(Error::Command(format!("QEMU binary not found: {}", binary)))
            }
        });
    }
    QEMU_CANDIDATES
        .iter()
        .find_map(|name| which(name).ok())
        .or_else(|| Some(PathBuf::from(QEMU_LIBEXEC)).filter(|p| p.exists()))
        .ok_or_else(|| {
            Error::Command(format!(
                "no QEMU binary found (tried {} and {})",
                QEMU_CANDIDATES.join(", "),
                QEMU_LIBEXEC
            ))
        })
}

/// Queries a QEMU binary for its recognised CPUID flags.
#[derive(Debug, Clone)]
pub struct QemuProbe {
    binary: PathBuf,
    query_args: Vec<String>,
    pattern: Regex,
}

impl QemuProbe {
    pub fn new(binary: PathBuf, query_cmd: &str, pattern: &str) -> Result<Self> {
        Ok(Self {
            binary,
            query_args: query_cmd.split_whitespace().map(str::to_string).collect(),
            pattern: Regex::new(pattern)?,
        })
    }
}

impl RecognisedFlags for QemuProbe {
    fn recognised_flags(&self) -> Result<FlagSet> {
        info!(
            "Querying {} {}",
            self.binary.display(),
            self.query_args.join(" ")
        );
        let output = cmd(&self.binary, &self.query_args)
            .stderr_to_stdout()
            .stdout_capture()
            .unchecked()
            .run()
            .map_err(|e| {
                Error::Command(format!("Failed to run {}: {}", self.binary.display(), e))
            })?;
        let text = String::from_utf8_lossy(&output.stdout);
        let flags = parse_recognised_flags(&text, &self.pattern);
        debug!("QEMU recognises {} flags", flags.len());
        Ok(flags)
    }
}

/// Captured `-cpu ?` output, parsed on demand.
#[derive(Debug, Clone)]
pub struct CapturedQuery {
    path: PathBuf,
    pattern: Regex,
}

impl CapturedQuery {
    pub fn new(path: impl Into<PathBuf>, pattern: &str) -> Result<Self> {
        Ok(Self {
            path: path.into(),
            pattern: Regex::new(pattern)?,
        })
    }
}

impl RecognisedFlags for CapturedQuery {
    fn recognised_flags(&self) -> Result<FlagSet> {
        let text = fs::read_to_string(&self.path)?;
        Ok(parse_recognised_flags(&text, &self.pattern))
    }
}
