//! Error types for configuration loading

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// The stage of [`ConfigLoader::load`](super::ConfigLoader::load) that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Setup,
    Defaults,
    BaseLoad,
    EnvMerge,
    Unmarshal,
    Validation,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Setup => "setup",
            Phase::Defaults => "defaults",
            Phase::BaseLoad => "base-load",
            Phase::EnvMerge => "env-merge",
            Phase::Unmarshal => "unmarshal",
            Phase::Validation => "validation",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fatal failure of a load. Every variant carries the phase it came from.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to set up config source: {0}")]
    Setup(#[from] SetupError),

    #[error("failed to capture current config values: {0}")]
    Defaults(#[source] serde_yaml::Error),

    #[error("failed to load base config: {0}")]
    BaseLoad(#[source] LayerError),

    #[error("failed to merge environment config: {0}")]
    EnvMerge(#[source] LayerError),

    #[error("failed to unmarshal config: {0}")]
    Unmarshal(#[source] serde_yaml::Error),

    #[error("config validation failed: {0}")]
    Validation(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl ConfigError {
    pub fn phase(&self) -> Phase {
        match self {
            ConfigError::Setup(_) => Phase::Setup,
            ConfigError::Defaults(_) => Phase::Defaults,
            ConfigError::BaseLoad(_) => Phase::BaseLoad,
            ConfigError::EnvMerge(_) => Phase::EnvMerge,
            ConfigError::Unmarshal(_) => Phase::Unmarshal,
            ConfigError::Validation(_) => Phase::Validation,
        }
    }

    /// True when the configuration decoded but the validator rejected it.
    pub fn is_validation(&self) -> bool {
        matches!(self, ConfigError::Validation(_))
    }
}

/// The merge engine could not be pointed at the requested location.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("config path is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("environment name '{0}' must not contain a path separator")]
    InvalidEnvironment(String),

    #[error("failed to inspect config path {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A single layer file exists but could not be turned into a document.
#[derive(Debug, Error)]
pub enum LayerError {
    #[error("failed reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML in {}: {source}", path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid TOML in {}: {source}", path.display())]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("top level of {} must be a mapping, found {found}", path.display())]
    NotAMapping { path: PathBuf, found: &'static str },
}
