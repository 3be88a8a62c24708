use std::fs;

use anyhow::{bail, Context, Result};
use colored::Colorize;
use serde_json::json;
use tracing::debug;

use cpuflag_config::CheckParams;
use cpuflag_core::host::host_cpu_models;
use cpuflag_core::qemu::find_qemu_binary;
use cpuflag_core::{
    CapturedQuery, CommandSession, FileSession, FlagCheck, GuestSession, HostCpu, ModelDump,
    QemuProbe, RecognisedFlags,
};

fn load_dump(params: &CheckParams) -> Result<ModelDump> {
    let path = params.dump_file_path()?;
    debug!("using model dump {}", path.display());
    Ok(ModelDump::load(&path)?)
}

fn load_host(params: &CheckParams) -> Result<HostCpu> {
    HostCpu::detect(&params.host_cpuinfo).with_context(|| {
        format!(
            "Failed to read host CPU flags from {}",
            params.host_cpuinfo.display()
        )
    })
}

fn guest_session(params: &CheckParams) -> Result<Box<dyn GuestSession>> {
    if let Some(path) = &params.guest_cpuinfo {
        return Ok(Box::new(FileSession::new(path)));
    }
    let login_cmd = params
        .guest_login_cmd
        .as_deref()
        .context("No guest source configured")?;
    Ok(Box::new(CommandSession::new(
        login_cmd,
        params.login_timeout()?,
    )?))
}

fn recognised_source(params: &CheckParams) -> Result<Box<dyn RecognisedFlags>> {
    if let Some(path) = &params.qemu_flags_file {
        return Ok(Box::new(CapturedQuery::new(path, &params.pattern)?));
    }
    let binary = find_qemu_binary(params.qemu_binary.as_deref())?;
    Ok(Box::new(QemuProbe::new(
        binary,
        &params.query_cmd,
        &params.pattern,
    )?))
}

fn qemu_output(params: &CheckParams) -> Result<Option<String>> {
    params
        .qemu_output
        .as_ref()
        .map(|path| {
            fs::read_to_string(path)
                .with_context(|| format!("Failed to read QEMU output {}", path.display()))
        })
        .transpose()
}

/// Returns whether the guest passed.
pub fn check(params: &CheckParams, as_json: bool) -> Result<bool> {
    params.validate_for_run()?;
    let dump = load_dump(params)?;
    let host = load_host(params)?;
    let plan = params.plan();
    let session = guest_session(params)?;
    let recognised = recognised_source(params)?;
    let output = qemu_output(params)?;

    let report = FlagCheck::new(&plan, &dump, &host).run(
        session.as_ref(),
        recognised.as_ref(),
        output.as_deref(),
    )?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if report.passed {
        println!(
            "{} guest flags match model {}",
            "✅".green(),
            report.qemu_model
        );
    } else {
        println!(
            "{} guest flags do not match model {}",
            "❌".red(),
            report.qemu_model
        );
        println!("{}", report);
    }
    Ok(report.passed)
}

pub fn expected(params: &CheckParams, as_json: bool) -> Result<()> {
    params.validate()?;
    let dump = load_dump(params)?;
    let host = load_host(params)?;
    let plan = params.plan();
    let expectation = FlagCheck::new(&plan, &dump, &host).expectation()?;

    if as_json {
        let value = json!({
            "qemu_model": expectation.qemu_model,
            "model_flags": expectation.model_flags,
            "expected": expectation.expected,
            "lack": expectation.lack,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("model: {}", expectation.qemu_model);
        println!("expected: {}", expectation.expected);
        if !expectation.lack.is_empty() {
            println!("lack: {}", expectation.lack);
        }
    }
    Ok(())
}

pub fn models(params: &CheckParams) -> Result<()> {
    let dump = load_dump(params)?;
    for name in dump.model_names() {
        println!("{}", name);
    }
    Ok(())
}

pub fn host_models(params: &CheckParams) -> Result<()> {
    let host = load_host(params)?;
    let models = host_cpu_models(&host);
    if models.is_empty() {
        bail!(
            "No known CPU model matches host vendor {}",
            host.vendor.as_deref().unwrap_or("unknown")
        );
    }
    for model in models {
        println!("{}", model);
    }
    Ok(())
}
