//! Configuration loading and merging
//!
//! Merges `config.example`, `config`, `config.<env>` and environment
//! variables, in that order of increasing precedence, into a typed value.

pub mod document;
pub mod engine;
pub mod env;
pub mod environment;
pub mod error;
pub mod keys;
pub mod loader;

pub use document::Document;
pub use engine::{FileEngine, Format, InMemoryEngine, MergeEngine};
pub use environment::{server_port, AppEnvironment, APP_ENV_VAR};
pub use error::{ConfigError, LayerError, Phase, SetupError};
pub use keys::{KeyInfo, KeyKind, KeySet};
pub use loader::ConfigLoader;
