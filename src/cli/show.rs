//! Show command implementation

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use layered_config::utils::redact::mask_secrets;
use std::process::ExitCode;

use super::SourceArgs;

#[derive(Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Yaml,
    Json,
}

#[derive(Args)]
pub struct ShowArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Yaml)]
    pub format: OutputFormat,

    /// Print passwords, tokens and secret keys in clear text
    #[arg(long)]
    pub reveal: bool,
}

pub fn run(args: ShowArgs) -> Result<ExitCode> {
    let cfg = args.source.load(false)?;

    let mut value = serde_yaml::to_value(&cfg).context("Failed to serialize config")?;
    if !args.reveal {
        mask_secrets(&mut value);
    }

    let rendered = match args.format {
        OutputFormat::Yaml => serde_yaml::to_string(&value)?,
        OutputFormat::Json => {
            let mut out = serde_json::to_string_pretty(&value)?;
            out.push('\n');
            out
        }
    };
    print!("{}", rendered);
    Ok(ExitCode::SUCCESS)
}
