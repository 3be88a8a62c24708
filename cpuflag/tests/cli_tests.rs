use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

const DUMP: &str = "\
x86         Westmere  Westmere E56xx/L56xx/X56xx (Nehalem-C)
  feature_edx 078bfbfd (sse2 sse fxsr mmx clflush pse36 pat cmov mca pge mtrr sep apic cx8 mce pae msr tsc pse de fpu)
  feature_ecx 02982203 (aes popcnt x2apic sse4.2 sse4.1 cx16 ssse3 pclmulqdq sse3)
x86      SandyBridge  Intel Xeon E312xx (Sandy Bridge)
  feature_edx 078bfbfd (sse2 sse fxsr mmx clflush pse36 pat cmov mca pge mtrr sep apic cx8 mce pae msr tsc pse de fpu)
  feature_ecx 1fbae3ff (avx xsave aes tsc-deadline popcnt x2apic sse4.2 sse4.1 cx16 ssse3 pclmulqdq sse3)
";

const MODEL_FLAGS: &str = "sse2 sse fxsr mmx clflush pse36 pat cmov mca pge mtrr sep apic cx8 mce pae msr tsc pse de fpu \
aes popcnt x2apic sse4_2 sse4_1 cx16 ssse3 pclmulqdq pni";

const QEMU_QUERY: &str = "\
x86         Westmere  Westmere E56xx/L56xx/X56xx (Nehalem-C)

Recognized CPUID flags:
  hypervisor rdrand f16c avx xsave aes tsc-deadline
";

/// Lays out every artefact a check needs in a temporary directory.
struct CheckFixture {
    _temp_dir: TempDir,
    dir: PathBuf,
}

impl CheckFixture {
    fn new(guest_flags: &str) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().to_path_buf();

        fs::write(dir.join("cpuid_dump"), DUMP).unwrap();
        fs::write(
            dir.join("host_cpuinfo"),
            format!(
                "processor\t: 0\nvendor_id\t: GenuineIntel\nflags\t\t: {} lm nx vmx\n",
                MODEL_FLAGS
            ),
        )
        .unwrap();
        fs::write(
            dir.join("guest_cpuinfo"),
            format!("processor\t: 0\nvendor_id\t: GenuineIntel\nflags\t\t: {}\n", guest_flags),
        )
        .unwrap();
        fs::write(dir.join("qemu_query"), QEMU_QUERY).unwrap();

        Self {
            _temp_dir: temp_dir,
            dir,
        }
    }

    fn write_params(&self, extra: &str) -> PathBuf {
        let path = self.dir.join("params.yaml");
        let params = format!(
            "dump_file: cpuid_dump\n\
             dump_path: {dir}\n\
             cpu_model: Westmere\n\
             reg_list: feature_edx feature_ecx\n\
             host_cpuinfo: {dir}/host_cpuinfo\n\
             guest_cpuinfo: {dir}/guest_cpuinfo\n\
             qemu_flags_file: {dir}/qemu_query\n\
             {extra}",
            dir = self.dir.display(),
            extra = extra
        );
        fs::write(&path, params).unwrap();
        path
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }
}

fn cpuflag(config: &Path) -> Command {
    let mut cmd = Command::cargo_bin("cpuflag").unwrap();
    cmd.env("LOG_OUTPUT", "off")
        .env("NO_COLOR", "1")
        .arg("--config")
        .arg(config);
    cmd
}

#[test]
fn test_check_passes_for_matching_guest() {
    let fixture = CheckFixture::new(&format!("{} up hypervisor", MODEL_FLAGS));
    let params = fixture.write_params("");

    cpuflag(&params)
        .arg("check")
        .assert()
        .success()
        .stdout(predicate::str::contains("guest flags match model Westmere"));
}

#[test]
fn test_check_fails_with_report() {
    let fixture = CheckFixture::new("fpu sse2 up nonstop_tsc");
    let params = fixture.write_params("");

    cpuflag(&params)
        .arg("check")
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("missing flags:"))
        .stdout(predicate::str::contains("more flags than expected:\n nonstop_tsc"));
}

#[test]
fn test_check_json_report() {
    let fixture = CheckFixture::new(&format!("{} up rep_good", MODEL_FLAGS));
    let params = fixture.write_params("option_flags: rep_good\n");

    let output = cpuflag(&params).args(["check", "--json"]).output().unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["passed"], true);
    assert_eq!(report["qemu_model"], "Westmere");
    assert!(report["missing"].as_array().unwrap().is_empty());
}

#[test]
fn test_cli_overrides_apply() {
    let fixture = CheckFixture::new(&format!("{} up", MODEL_FLAGS));
    let params = fixture.write_params("");

    cpuflag(&params)
        .args(["expected", "--cpu-model-flags=+vmx,-x2apic"])
        .assert()
        .success()
        .stdout(predicate::str::contains("model: Westmere"))
        .stdout(predicate::str::contains(" vmx"))
        .stdout(predicate::str::contains("x2apic").not());
}

#[test]
fn test_lack_warning_check() {
    let fixture = CheckFixture::new(&format!("{} up", MODEL_FLAGS));
    fs::write(
        fixture.path("qemu_output"),
        "warning: host doesn't support requested feature: CPUID.07H:EBX.avx2 [bit 5]\n",
    )
    .unwrap();
    let params = fixture.write_params(&format!(
        "cpu_model_flags: \"+avx2,+avx512f,check\"\nqemu_output: {}\n",
        fixture.path("qemu_output").display()
    ));

    cpuflag(&params)
        .arg("check")
        .assert()
        .failure()
        .stdout(predicate::str::contains("no warning for lack flags:\n avx512f"));
}

#[test]
fn test_models_lists_dump() {
    let fixture = CheckFixture::new("fpu");
    let params = fixture.write_params("");

    cpuflag(&params)
        .arg("models")
        .assert()
        .success()
        .stdout("Westmere\nSandyBridge\n");
}

#[test]
fn test_host_models() {
    let fixture = CheckFixture::new("fpu");
    let params = fixture.write_params("");

    cpuflag(&params)
        .arg("host-models")
        .assert()
        .success()
        .stdout("Westmere\nNehalem\nPenryn\nConroe\n");
}

#[test]
fn test_missing_dump_file_is_an_error() {
    let fixture = CheckFixture::new("fpu");
    let params = fixture.write_params("");

    cpuflag(&params)
        .args(["check", "--dump-file", "no_such_dump"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no_such_dump"));
}

#[test]
fn test_oversized_login_timeout_is_an_error() {
    let fixture = CheckFixture::new("fpu");
    let params = fixture.write_params("");

    cpuflag(&params)
        .args(["check", "--login-timeout", "1e30"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("login_timeout"));
}
