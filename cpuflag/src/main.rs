mod cli;
mod commands;

// External crates
use anyhow::Result;
use clap::Parser;
use cpuflag_config::CheckParams;
use cpuflag_logging::{init_subscriber, LogSettings};

// Internal imports
use cli::{Args, Command};

fn load_params(args: &mut Args) -> Result<CheckParams> {
    let mut params = match &args.config {
        Some(path) => CheckParams::load(path)?,
        None => CheckParams::default(),
    };
    std::mem::take(&mut args.overrides).apply(&mut params);
    Ok(params)
}

fn run(mut args: Args) -> Result<bool> {
    let params = load_params(&mut args)?;

    match args.command {
        Command::Check { json } => return commands::check(&params, json),
        Command::Expected { json } => commands::expected(&params, json)?,
        Command::Models => commands::models(&params)?,
        Command::HostModels => commands::host_models(&params)?,
    }
    Ok(true)
}

fn main() -> Result<()> {
    let args = Args::parse();
    let guard = init_subscriber(&LogSettings::from_env().verbose(args.verbose));

    let passed = run(args)?;
    drop(guard);
    if !passed {
        std::process::exit(1);
    }
    Ok(())
}
