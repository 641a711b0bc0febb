//! layered-config: typed configuration from layered files and environment variables
//!
//! A [`ConfigLoader`] merges `config.example`, `config`, `config.<env>` and
//! environment variables, each overriding the previous per key, then decodes
//! the result into a caller-supplied struct and optionally validates it.

pub mod config;
pub mod presets;
pub mod utils;

pub use config::{
    server_port, AppEnvironment, ConfigError, ConfigLoader, Document, FileEngine, InMemoryEngine,
    KeySet, LayerError, MergeEngine, Phase, SetupError,
};
pub use utils::duration;
