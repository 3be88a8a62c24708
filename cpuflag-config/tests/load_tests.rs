use anyhow::Result;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

use cpuflag_config::CheckParams;

struct ParamsFixture {
    _temp_dir: TempDir,
    params_path: PathBuf,
}

impl ParamsFixture {
    fn new(contents: &str) -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let params_path = temp_dir.path().join("flag_check.yaml");
        fs::write(&params_path, contents)?;
        Ok(Self {
            _temp_dir: temp_dir,
            params_path,
        })
    }
}

#[test]
fn test_load_harness_style_params() -> Result<()> {
    let fixture = ParamsFixture::new(
        r#"
dump_file: cpuid_dump_kvm
dump_path: /usr/share/cpuid
cpu_model: SandyBridge
cpu_model_flags: "+vmx,-x2apic,check"
reg_list: "feature_edx feature_ecx extfeature_edx extfeature_ecx"
out_flags: "tsc-deadline"
option_flags: "rep_good nopl"
smp: 2
login_timeout: 360
guest_cpuinfo: /tmp/guest_cpuinfo
"#,
    )?;

    let params = CheckParams::load(&fixture.params_path)?;
    params.validate_for_run()?;

    assert_eq!(
        params.dump_file_path()?,
        PathBuf::from("/usr/share/cpuid/cpuid_dump_kvm")
    );
    assert_eq!(params.reg_list.len(), 4);
    assert_eq!(params.option_flags, vec!["rep_good", "nopl"]);
    assert_eq!(params.login_timeout()?.as_secs(), 360);

    let plan = params.plan();
    assert_eq!(plan.guest_model.as_deref(), Some("SandyBridge"));
    assert_eq!(plan.smp, 2);
    Ok(())
}

#[test]
fn test_load_reports_path_on_error() -> Result<()> {
    let fixture = ParamsFixture::new("smp: [1, 2]\n")?;
    let err = CheckParams::load(&fixture.params_path).unwrap_err();
    assert!(format!("{:#}", err).contains("flag_check.yaml"));
    Ok(())
}

#[test]
fn test_yaml_round_trip_keeps_defaults() -> Result<()> {
    let params = CheckParams {
        dump_file: Some("dump".to_string()),
        ..Default::default()
    };
    let fixture = ParamsFixture::new(&params.to_yaml()?)?;
    assert_eq!(CheckParams::load(&fixture.params_path)?, params);
    Ok(())
}
