//! Env-keys command implementation

use anyhow::Result;
use clap::Args;
use layered_config::presets::AppConfig;
use layered_config::KeySet;
use std::process::ExitCode;

#[derive(Args)]
pub struct EnvKeysArgs {
    /// Print names as PREFIX_<KEY>
    #[arg(long, value_name = "PREFIX")]
    pub prefix: Option<String>,

    /// Also print the dotted config key next to each variable
    #[arg(long)]
    pub with_paths: bool,
}

pub fn run(args: EnvKeysArgs) -> Result<ExitCode> {
    let keys = KeySet::of::<AppConfig>();
    for info in keys.bindable() {
        let name = info.env_var(args.prefix.as_deref());
        if args.with_paths {
            println!("{}\t{}", name, info.path());
        } else {
            println!("{}", name);
        }
    }
    Ok(ExitCode::SUCCESS)
}
