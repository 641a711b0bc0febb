//! Check command implementation

use anyhow::Result;
use clap::Args;
use layered_config::{ConfigError, Phase};
use std::process::ExitCode;

use super::SourceArgs;

#[derive(Args)]
pub struct CheckArgs {
    #[command(flatten)]
    pub source: SourceArgs,
}

pub fn run(args: CheckArgs) -> Result<ExitCode> {
    match args.source.load(true) {
        Ok(cfg) => {
            println!(
                "Config OK: {} ({}) from {}",
                cfg.app_name,
                args.source.environment,
                args.source.config_dir.display()
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            Ok(ExitCode::from(exit_code(&e)))
        }
    }
}

fn exit_code(err: &ConfigError) -> u8 {
    match err.phase() {
        Phase::Unmarshal => 2,
        Phase::Validation => 3,
        _ => 1,
    }
}
