//! Command-line interface for layered-config
//!
//! Provides `show`, `check` and `env-keys` subcommands over the preset
//! `AppConfig`.

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use layered_config::presets::AppConfig;
use layered_config::{ConfigError, ConfigLoader};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod check;
mod keys;
mod show;

/// Inspect layered application configuration
#[derive(Parser)]
#[command(name = "layered-config")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging (sets log level to DEBUG)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the config and print the merged result
    Show(show::ShowArgs),

    /// Load and validate the config, exiting non-zero on failure
    Check(check::CheckArgs),

    /// List the environment variables that bind into the config
    EnvKeys(keys::EnvKeysArgs),
}

/// Where to load from; shared by the subcommands that read files.
#[derive(Args)]
pub struct SourceArgs {
    /// Directory holding config.example.*, config.* and config.<env>.*
    #[arg(short = 'd', long, env = "CONFIG_DIR", default_value = "./configs", value_name = "DIR")]
    pub config_dir: PathBuf,

    /// Environment name selecting the config.<env> layer
    #[arg(short, long = "env", env = "APP_ENV", default_value = "dev", value_name = "NAME")]
    pub environment: String,

    /// Only bind variables named PREFIX_<KEY>
    #[arg(long, value_name = "PREFIX")]
    pub env_prefix: Option<String>,

    /// Fail on layer files that exist but cannot be parsed
    #[arg(long)]
    pub strict: bool,
}

impl SourceArgs {
    pub fn load(&self, validate: bool) -> Result<AppConfig, ConfigError> {
        let mut cfg = AppConfig::default();
        {
            let mut loader = ConfigLoader::new(&mut cfg).strict(self.strict);
            if let Some(prefix) = &self.env_prefix {
                loader = loader.with_env_prefix(prefix);
            }
            if validate {
                loader = loader.with_validation(AppConfig::validate);
            }
            loader.load(&self.environment, &self.config_dir)?;
        }
        Ok(cfg)
    }
}

pub fn run() -> Result<ExitCode> {
    let cli = Cli::parse();

    // RUST_LOG in the environment always takes precedence; --verbose falls back to DEBUG.
    let filter = if cli.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::from_default_env().add_directive(Level::WARN.into())
    };
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init();

    match cli.command {
        Commands::Show(args) => show::run(args),
        Commands::Check(args) => check::run(args),
        Commands::EnvKeys(args) => keys::run(args),
    }
}
