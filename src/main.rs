//! layered-config: inspect layered application configuration
//!
//! Loads the preset `AppConfig` from a config directory and prints, checks or
//! lists the environment variables it binds.

use anyhow::Result;
use std::process::ExitCode;

mod cli;

fn main() -> Result<ExitCode> {
    cli::run()
}
