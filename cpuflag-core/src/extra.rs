//! Boot-time flag requests (`-cpu Model,+flag,-flag,check`).

use crate::flag::{Flag, FlagSet};

/// The parsed `cpu_model_flags` boot string.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtraFlags {
    added: Vec<Flag>,
    removed: Vec<Flag>,
    options: Vec<String>,
    properties: Vec<(String, String)>,
}

impl ExtraFlags {
    /// Splits the string on commas. `+f`/`f=on` request a flag, `-f`/`f=off`
    /// drop it, other `key=value` pairs are CPU properties and bare words
    /// (`check`, `enforce`) are QEMU options.
    pub fn parse(boot_flags: &str) -> Self {
        let mut extra = Self::default();
        for token in boot_flags.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            if let Some(name) = token.strip_prefix('+') {
                extra.push_flag(name, true);
            } else if let Some(name) = token.strip_prefix('-') {
                extra.push_flag(name, false);
            } else if let Some((key, value)) = token.split_once('=') {
                match value.trim() {
                    "on" | "true" | "yes" => extra.push_flag(key, true),
                    "off" | "false" | "no" => extra.push_flag(key, false),
                    other => extra
                        .properties
                        .push((key.trim().to_string(), other.to_string())),
                }
            } else {
                extra.options.push(token.to_string());
            }
        }
        extra
    }

    fn push_flag(&mut self, name: &str, add: bool) {
        let name = name.trim();
        if name.is_empty() {
            return;
        }
        let flag = Flag::new(name);
        if add {
            self.added.push(flag);
        } else {
            self.removed.push(flag);
        }
    }

    /// Requested additions the host supports; only these reach the guest.
    pub fn added(&self, host: &FlagSet) -> FlagSet {
        self.added.iter().filter(|f| host.contains(f)).cloned().collect()
    }

    /// Requested removals the host supports.
    pub fn removed(&self, host: &FlagSet) -> FlagSet {
        self.removed.iter().filter(|f| host.contains(f)).cloned().collect()
    }

    /// Every requested addition, supported or not.
    pub fn added_all(&self) -> FlagSet {
        self.added.iter().cloned().collect()
    }

    pub fn has_option(&self, option: &str) -> bool {
        self.options.iter().any(|o| o == option)
    }

    pub fn properties(&self) -> &[(String, String)] {
        &self.properties
    }
}
