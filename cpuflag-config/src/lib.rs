//! Parameters of a flag check.
//!
//! Parameters are read from a YAML file whose keys follow the harness
//! parameter names (`cpu_model`, `cpu_model_flags`, `out_flags`, ...). Flag
//! lists may be written either as a YAML sequence or as a single
//! whitespace separated string.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use cpuflag_core::qemu::{DEFAULT_FLAGS_PATTERN, DEFAULT_QUERY_CMD};
use cpuflag_core::{CheckPlan, FlagSet};

pub const DEFAULT_DUMP_PATH: &str = "deps/cpuid";
pub const DEFAULT_LOGIN_TIMEOUT: f64 = 240.0;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CheckParams {
    /// Model dump file name, or an absolute path.
    #[serde(default)]
    pub dump_file: Option<String>,
    #[serde(default = "default_dump_path")]
    pub dump_path: PathBuf,
    /// Unset means `-cpu host`.
    #[serde(default)]
    pub cpu_model: Option<String>,
    #[serde(default)]
    pub cpu_model_flags: String,
    #[serde(default = "default_reg_list", deserialize_with = "words")]
    pub reg_list: Vec<String>,
    #[serde(default, deserialize_with = "words")]
    pub out_flags: Vec<String>,
    #[serde(default, deserialize_with = "words")]
    pub option_flags: Vec<String>,
    #[serde(default = "default_smp")]
    pub smp: u32,
    #[serde(default = "default_login_timeout")]
    pub login_timeout: f64,
    #[serde(default = "default_query_cmd")]
    pub query_cmd: String,
    #[serde(default = "default_pattern")]
    pub pattern: String,
    #[serde(default)]
    pub qemu_binary: Option<String>,
    /// Captured query output, used instead of running QEMU.
    #[serde(default)]
    pub qemu_flags_file: Option<PathBuf>,
    /// QEMU process output, searched for lack-flag warnings.
    #[serde(default)]
    pub qemu_output: Option<PathBuf>,
    #[serde(default = "default_host_cpuinfo")]
    pub host_cpuinfo: PathBuf,
    #[serde(default)]
    pub guest_cpuinfo: Option<PathBuf>,
    #[serde(default)]
    pub guest_login_cmd: Option<String>,
}

fn default_dump_path() -> PathBuf {
    PathBuf::from(DEFAULT_DUMP_PATH)
}

fn default_reg_list() -> Vec<String> {
    vec!["feature_edx".to_string()]
}

fn default_smp() -> u32 {
    1
}

fn default_login_timeout() -> f64 {
    DEFAULT_LOGIN_TIMEOUT
}

fn default_query_cmd() -> String {
    DEFAULT_QUERY_CMD.to_string()
}

fn default_pattern() -> String {
    DEFAULT_FLAGS_PATTERN.to_string()
}

fn default_host_cpuinfo() -> PathBuf {
    PathBuf::from(cpuflag_core::cpuinfo::DEFAULT_CPUINFO_PATH)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WordsOrList {
    Words(String),
    List(Vec<String>),
}

fn words<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match WordsOrList::deserialize(deserializer)? {
        WordsOrList::Words(s) => s.split_whitespace().map(str::to_string).collect(),
        WordsOrList::List(items) => items
            .into_iter()
            .flat_map(|item| {
                item.split_whitespace()
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .collect(),
    })
}

impl Default for CheckParams {
    fn default() -> Self {
        Self {
            dump_file: None,
            dump_path: default_dump_path(),
            cpu_model: None,
            cpu_model_flags: String::new(),
            reg_list: default_reg_list(),
            out_flags: Vec::new(),
            option_flags: Vec::new(),
            smp: default_smp(),
            login_timeout: default_login_timeout(),
            query_cmd: default_query_cmd(),
            pattern: default_pattern(),
            qemu_binary: None,
            qemu_flags_file: None,
            qemu_output: None,
            host_cpuinfo: default_host_cpuinfo(),
            guest_cpuinfo: None,
            guest_login_cmd: None,
        }
    }
}

impl CheckParams {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read parameters from {}", path.display()))?;
        let params: Self = serde_yaml_ng::from_str(&contents)
            .with_context(|| format!("Invalid parameters in {}", path.display()))?;
        debug!("loaded check parameters from {}", path.display());
        Ok(params)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    /// `dump_file` joined onto `dump_path` unless it is already absolute.
    pub fn dump_file_path(&self) -> Result<PathBuf> {
        let Some(file) = self.dump_file.as_deref().filter(|f| !f.trim().is_empty()) else {
            bail!("Missing required parameter: dump_file");
        };
        let file = Path::new(file.trim());
        if file.is_absolute() {
            Ok(file.to_path_buf())
        } else {
            Ok(self.dump_path.join(file))
        }
    }

    /// Guest model name, `None` for `-cpu host` or an unset model.
    pub fn guest_model(&self) -> Option<&str> {
        self.cpu_model
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
    }

    pub fn login_timeout(&self) -> Result<Duration> {
        if self.login_timeout <= 0.0 {
            bail!("login_timeout must be a positive number of seconds");
        }
        Duration::try_from_secs_f64(self.login_timeout).with_context(|| {
            format!("login_timeout {} is not a usable duration", self.login_timeout)
        })
    }

    /// Checks everything needed to compute the expected flag set.
    pub fn validate(&self) -> Result<()> {
        self.dump_file_path()?;
        if self.reg_list.is_empty() {
            bail!("reg_list must name at least one register");
        }
        if self.smp == 0 {
            bail!("smp must be at least 1");
        }
        self.login_timeout()?;
        Ok(())
    }

    /// Additionally requires exactly one way to reach the guest.
    pub fn validate_for_run(&self) -> Result<()> {
        self.validate()?;
        match (&self.guest_cpuinfo, &self.guest_login_cmd) {
            (None, None) => bail!("Set guest_cpuinfo or guest_login_cmd to read guest flags"),
            (Some(_), Some(_)) => {
                bail!("guest_cpuinfo and guest_login_cmd are mutually exclusive")
            }
            _ => Ok(()),
        }
    }

    pub fn plan(&self) -> CheckPlan {
        CheckPlan {
            guest_model: self.guest_model().map(str::to_string),
            reg_list: self.reg_list.clone(),
            out_flags: FlagSet::from_tokens(&self.out_flags),
            option_flags: FlagSet::from_tokens(&self.option_flags),
            smp: self.smp,
            ..Default::default()
        }
        .with_extra_flags(&self.cpu_model_flags)
    }
}
