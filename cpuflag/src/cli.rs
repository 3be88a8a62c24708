use std::path::PathBuf;

use clap::{Parser, Subcommand};

use cpuflag_config::CheckParams;

#[derive(Parser)]
#[command(name = "cpuflag")]
#[command(about = "Verify a guest's CPU feature flags against its CPU model")]
#[command(version)]
pub struct Args {
    /// Check parameters file (YAML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(flatten)]
    pub overrides: Overrides,

    #[command(subcommand)]
    pub command: Command,
}

/// Per-run overrides of values from the parameters file.
#[derive(clap::Args, Debug, Default)]
pub struct Overrides {
    /// CPU model dump file name or absolute path
    #[arg(long, global = true)]
    pub dump_file: Option<String>,
    /// Directory holding dump files
    #[arg(long, global = true)]
    pub dump_path: Option<PathBuf>,
    /// Guest CPU model (omit for -cpu host)
    #[arg(long, global = true)]
    pub cpu_model: Option<String>,
    /// Extra -cpu flags, e.g. "+vmx,-x2apic,check"
    #[arg(long, global = true, allow_hyphen_values = true)]
    pub cpu_model_flags: Option<String>,
    /// Dump registers to read, space separated
    #[arg(long, global = true)]
    pub reg_list: Option<String>,
    /// Flags in the dump the guest is not expected to show
    #[arg(long, global = true)]
    pub out_flags: Option<String>,
    /// Kernel generated flags tolerated in the guest
    #[arg(long, global = true)]
    pub option_flags: Option<String>,
    /// Number of guest vCPUs
    #[arg(long, global = true)]
    pub smp: Option<u32>,
    /// Seconds to wait for the guest command
    #[arg(long, global = true)]
    pub login_timeout: Option<f64>,
    /// Arguments passed to QEMU to list recognised flags
    #[arg(long, global = true, allow_hyphen_values = true)]
    pub query_cmd: Option<String>,
    /// Regex locating the flag list in the query output
    #[arg(long, global = true)]
    pub pattern: Option<String>,
    #[arg(long, global = true)]
    pub host_cpuinfo: Option<PathBuf>,
    /// Captured guest /proc/cpuinfo
    #[arg(long, global = true, conflicts_with = "guest_login_cmd")]
    pub guest_cpuinfo: Option<PathBuf>,
    /// Command prefix that runs a command in the guest, e.g. "ssh root@guest"
    #[arg(long, global = true)]
    pub guest_login_cmd: Option<String>,
    #[arg(long, global = true)]
    pub qemu_binary: Option<String>,
    /// Captured output of the QEMU flag query
    #[arg(long, global = true)]
    pub qemu_flags_file: Option<PathBuf>,
    /// QEMU process output, searched for lack-flag warnings
    #[arg(long, global = true)]
    pub qemu_output: Option<PathBuf>,
}

fn split_words(value: &str) -> Vec<String> {
    value.split_whitespace().map(str::to_string).collect()
}

impl Overrides {
    pub fn apply(self, params: &mut CheckParams) {
        if let Some(v) = self.dump_file {
            params.dump_file = Some(v);
        }
        if let Some(v) = self.dump_path {
            params.dump_path = v;
        }
        if let Some(v) = self.cpu_model {
            params.cpu_model = Some(v);
        }
        if let Some(v) = self.cpu_model_flags {
            params.cpu_model_flags = v;
        }
        if let Some(v) = self.reg_list {
            params.reg_list = split_words(&v);
        }
        if let Some(v) = self.out_flags {
            params.out_flags = split_words(&v);
        }
        if let Some(v) = self.option_flags {
            params.option_flags = split_words(&v);
        }
        if let Some(v) = self.smp {
            params.smp = v;
        }
        if let Some(v) = self.login_timeout {
            params.login_timeout = v;
        }
        if let Some(v) = self.query_cmd {
            params.query_cmd = v;
        }
        if let Some(v) = self.pattern {
            params.pattern = v;
        }
        if let Some(v) = self.host_cpuinfo {
            params.host_cpuinfo = v;
        }
        if let Some(v) = self.guest_cpuinfo {
            params.guest_cpuinfo = Some(v);
            params.guest_login_cmd = None;
        }
        if let Some(v) = self.guest_login_cmd {
            params.guest_login_cmd = Some(v);
            params.guest_cpuinfo = None;
        }
        if let Some(v) = self.qemu_binary {
            params.qemu_binary = Some(v);
        }
        if let Some(v) = self.qemu_flags_file {
            params.qemu_flags_file = Some(v);
        }
        if let Some(v) = self.qemu_output {
            params.qemu_output = Some(v);
        }
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Compare the guest's flags with the expected set
    Check {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the flags the guest is expected to expose
    Expected {
        #[arg(long)]
        json: bool,
    },
    /// List the models defined in the dump file
    Models,
    /// List the CPU models the host can run, most capable first
    HostModels,
}
