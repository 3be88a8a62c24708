//! CPU model dump parsing.
//!
//! A dump is the output of `qemu -cpu ?dump`: one block per model, opened by a
//! line starting with `x86 <name>`, followed by indented register lines such as
//!
//! ```text
//!   feature_edx 07813fbfd (sse2 sse fxsr mmx clflush pse36 pat cmov ...)
//! ```

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::{Error, Result};
use crate::flag::FlagSet;

const MODEL_MARKER: &str = "x86";

/// One model block from a dump file.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInfo {
    pub name: String,
    text: String,
}

impl ModelInfo {
    /// Flags listed in parentheses on the line for `reg` (e.g. `feature_edx`).
    pub fn register_flags(&self, reg: &str) -> FlagSet {
        self.text
            .lines()
            .find(|line| line.split_whitespace().next() == Some(reg))
            .and_then(|line| {
                let open = line.find('(')?;
                let close = line.rfind(')')?;
                (close > open).then(|| &line[open + 1..close])
            })
            .map(FlagSet::parse_whitespace)
            .unwrap_or_default()
    }

    /// Union of the flags of every register in `reg_list`.
    pub fn support_flags<S: AsRef<str>>(&self, reg_list: &[S]) -> FlagSet {
        let mut flags = FlagSet::new();
        for reg in reg_list {
            let reg_flags = self.register_flags(reg.as_ref());
            if reg_flags.is_empty() {
                debug!("model {} has no flags for register {}", self.name, reg.as_ref());
            }
            flags = flags.union(&reg_flags);
        }
        flags
    }
}

/// All models defined in a dump file, in file order.
#[derive(Debug, Clone, Default)]
pub struct ModelDump {
    models: Vec<ModelInfo>,
}

impl ModelDump {
    pub fn parse(text: &str) -> Self {
        let mut models: Vec<ModelInfo> = Vec::new();
        for line in text.lines() {
            let mut tokens = line.split_whitespace();
            if tokens.next() == Some(MODEL_MARKER) {
                if let Some(name) = tokens.next() {
                    models.push(ModelInfo {
                        name: name.to_string(),
                        text: String::new(),
                    });
                    continue;
                }
            }
            if let Some(current) = models.last_mut() {
                current.text.push_str(line);
                current.text.push('\n');
            }
        }
        Self { models }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            Error::Dump(format!("failed to read {}: {}", path.display(), e))
        })?;
        let dump = Self::parse(&text);
        if dump.is_empty() {
            return Err(Error::Dump(format!(
                "no CPU model definitions in {}",
                path.display()
            )));
        }
        debug!("loaded {} models from {}", dump.len(), path.display());
        Ok(dump)
    }

    /// Exact name match first, then the first block mentioning `model`.
    pub fn find(&self, model: &str) -> Option<&ModelInfo> {
        self.models
            .iter()
            .find(|m| m.name == model)
            .or_else(|| {
                self.models
                    .iter()
                    .find(|m| m.name.contains(model) || m.text.contains(model))
            })
    }

    pub fn model_names(&self) -> impl Iterator<Item = &str> {
        self.models.iter().map(|m| m.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const DUMP: &str = "\
x86       Opteron_G3  AMD Opteron 23xx (Gen 3 Class Opteron)
  family 16 model 2 stepping 3 level 5 xlevel 0x80000008 vendor \"AuthenticAMD\"
  feature_edx 07813fbfd (sse2 sse fxsr mmx clflush pse36 pat cmov mca pge mtrr sep apic cx8 mce pae msr tsc pse de fpu)
  feature_ecx 00802209 (popcnt cx16 monitor pni)
  extfeature_edx 2fd3fbfd (lm fxsr_opt rdtscp nx syscall)
x86      SandyBridge  Intel Xeon E312xx (Sandy Bridge)
  feature_edx 0783fbfd (sse2 sse fxsr mmx clflush pse36 pat cmov mca pge mtrr sep apic cx8 mce pae msr tsc pse de fpu)
  feature_ecx 1fbae3ff (avx xsave aes tsc-deadline popcnt x2apic sse4.2 sse4.1 cx16 ssse3 pclmulqdq sse3)
x86  SandyBridge-IBRS  Intel Xeon E312xx (Sandy Bridge, IBRS update)
  feature_edx 0783fbfd (sse2 fpu)
";

    #[test]
    fn test_parse_models_in_order() {
        let dump = ModelDump::parse(DUMP);
        let names: Vec<&str> = dump.model_names().collect();
        assert_eq!(names, vec!["Opteron_G3", "SandyBridge", "SandyBridge-IBRS"]);
    }

    #[test]
    fn test_register_line_matches_first_token_only() {
        let dump = ModelDump::parse(DUMP);
        let g3 = dump.find("Opteron_G3").unwrap();
        let edx = g3.register_flags("feature_edx");
        assert!(edx.contains_name("fpu"));
        assert!(!edx.contains_name("lm"));
        assert!(g3.register_flags("extfeature_edx").contains_name("lm"));
        assert!(g3.register_flags("feature_ebx").is_empty());
    }

    #[test]
    fn test_support_flags_union_with_aliases() {
        let dump = ModelDump::parse(DUMP);
        let snb = dump.find("SandyBridge").unwrap();
        let flags = snb.support_flags(&["feature_edx", "feature_ecx"]);
        assert!(flags.contains_name("sse4_1"));
        assert!(flags.contains_name("pni"));
        assert!(flags.contains_name("pclmuldq"));
        assert!(flags.contains_name("fpu"));
    }

    #[test]
    fn test_find_prefers_exact_name() {
        let dump = ModelDump::parse(DUMP);
        assert_eq!(dump.find("SandyBridge").unwrap().name, "SandyBridge");
        assert_eq!(dump.find("SandyBridge-IBRS").unwrap().name, "SandyBridge-IBRS");
        assert_eq!(dump.find("IBRS").unwrap().name, "SandyBridge-IBRS");
        assert!(dump.find("Haswell").is_none());
    }

    #[test]
    fn test_load_rejects_file_without_models() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "Available CPUs:\n  feature_edx 0 (fpu)").unwrap();

        let err = ModelDump::load(file.path()).unwrap_err();
        assert!(matches!(err, Error::Dump(_)));
        assert!(err.to_string().contains("no CPU model definitions"));
    }

    #[test]
    fn test_load_reads_models() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(DUMP.as_bytes()).unwrap();

        let dump = ModelDump::load(file.path()).unwrap();
        assert_eq!(dump.len(), 3);
    }

    #[test]
    fn test_header_before_first_model_is_ignored() {
        let dump = ModelDump::parse("Available CPUs:\nfeature_edx 0 (fpu)\n");
        assert!(dump.is_empty());
    }
}
