//! Access to the guest under test.

use std::fs;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use duct::cmd;
use tracing::debug;

use crate::cpuinfo::parse_cpu_flags;
use crate::error::{Error, Result};
use crate::flag::FlagSet;

pub const GUEST_CPUINFO_CMD: &str = "cat /proc/cpuinfo";

/// A logged-in guest that can run shell commands.
pub trait GuestSession {
    fn cmd_output(&self, command: &str) -> Result<String>;
}

/// Replays a file captured from the guest, whatever the command.
#[derive(Debug, Clone)]
pub struct FileSession {
    path: PathBuf,
}

impl FileSession {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl GuestSession for FileSession {
    fn cmd_output(&self, command: &str) -> Result<String> {
        debug!("replaying '{}' from {}", command, self.path.display());
        Ok(fs::read_to_string(&self.path)?)
    }
}

/// Runs commands through a login prefix such as `ssh root@guest`.
#[derive(Debug, Clone)]
pub struct CommandSession {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandSession {
    pub fn new(login_cmd: &str, timeout: Duration) -> Result<Self> {
        let mut parts = login_cmd.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| Error::Command("empty guest login command".to_string()))?;
        Ok(Self {
            program,
            args: parts.collect(),
            timeout,
        })
    }
}

impl GuestSession for CommandSession {
    fn cmd_output(&self, command: &str) -> Result<String> {
        let mut args = self.args.clone();
        args.push(command.to_string());
        let full_command = format!("{} {}", self.program, args.join(" "));
        debug!("running guest command: {}", full_command);

        let handle = cmd(&self.program, &args)
            .stdout_capture()
            .stderr_capture()
            .unchecked()
            .start()
            .map_err(|e| {
                Error::Command(format!("Failed to start '{}': {}", full_command, e))
            })?;

        let start = Instant::now();
        loop {
            if start.elapsed() >= self.timeout {
                let _ = handle.kill();
                return Err(Error::Timeout(format!(
                    "'{}' did not finish within {}s",
                    full_command,
                    self.timeout.as_secs()
                )));
            }
            match handle.try_wait() {
                Ok(Some(output)) => {
                    if !output.status.success() {
                        return Err(Error::Command(format!(
                            "'{}' exited with {:?}: {}",
                            full_command,
                            output.status.code(),
                            String::from_utf8_lossy(&output.stderr).trim()
                        )));
                    }
                    return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
                }
                Ok(None) => thread::sleep(Duration::from_millis(100)),
                Err(e) => {
                    return Err(Error::Command(format!(
                        "Error waiting for '{}': {}",
                        full_command, e
                    )))
                }
            }
        }
    }
}

/// Reads the guest's `/proc/cpuinfo` flags through `session`.
pub fn guest_cpu_flags(session: &dyn GuestSession) -> Result<FlagSet> {
    let output = session.cmd_output(GUEST_CPUINFO_CMD)?;
    parse_cpu_flags(&output)
}
