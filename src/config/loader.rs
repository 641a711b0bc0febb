//! Layered config loading
//!
//! Precedence, lowest to highest: the target's current values,
//! `config.example`, `config`, `config.<environment>`, environment variables.

use super::document::Document;
use super::engine::{FileEngine, MergeEngine};
use super::env::{self, EnvLookup};
use super::error::{ConfigError, Phase, SetupError};
use super::keys::KeySet;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

pub const CONFIG_NAME: &str = "config";
pub const EXAMPLE_NAME: &str = "config.example";

type Validator<'a, T> = Box<dyn Fn(&T) -> anyhow::Result<()> + 'a>;

/// Loads layered configuration into a caller-owned value.
///
/// ```no_run
/// use layered_config::ConfigLoader;
/// # #[derive(Default, serde::Serialize, serde::Deserialize)]
/// # struct AppConfig { port: u16 }
///
/// let mut cfg = AppConfig::default();
/// ConfigLoader::new(&mut cfg)
///     .with_validation(|cfg: &AppConfig| {
///         anyhow::ensure!(cfg.port > 0, "port must be positive");
///         Ok(())
///     })
///     .load("dev", "./configs")?;
/// # Ok::<(), layered_config::ConfigError>(())
/// ```
pub struct ConfigLoader<'a, T, E = FileEngine> {
    config: &'a mut T,
    engine: E,
    validator: Option<Validator<'a, T>>,
    env_lookup: EnvLookup<'a>,
    env_prefix: Option<String>,
    strict: bool,
}

impl<'a, T> ConfigLoader<'a, T, FileEngine>
where
    T: Serialize + DeserializeOwned,
{
    /// Wrap `config`. Nothing is read or written until [`load`](Self::load).
    pub fn new(config: &'a mut T) -> Self {
        Self {
            config,
            engine: FileEngine::new(),
            validator: None,
            env_lookup: env::process_env(),
            env_prefix: None,
            strict: false,
        }
    }
}

impl<'a, T, E> ConfigLoader<'a, T, E>
where
    T: Serialize + DeserializeOwned,
    E: MergeEngine,
{
    /// Swap the document source.
    pub fn with_engine<E2: MergeEngine>(self, engine: E2) -> ConfigLoader<'a, T, E2> {
        ConfigLoader {
            config: self.config,
            engine,
            validator: self.validator,
            env_lookup: self.env_lookup,
            env_prefix: self.env_prefix,
            strict: self.strict,
        }
    }

    /// Run `validator` on the decoded value. A later call replaces an earlier one.
    pub fn with_validation<F>(mut self, validator: F) -> Self
    where
        F: Fn(&T) -> anyhow::Result<()> + 'a,
    {
        self.validator = Some(Box::new(validator));
        self
    }

    /// Bind `PREFIX_DATABASE_HOST` instead of `DATABASE_HOST`.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    /// Read variables from `lookup` instead of the process environment.
    pub fn with_env_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + 'a,
    {
        self.env_lookup = Box::new(lookup);
        self
    }

    /// Fail on layer files that exist but cannot be read or parsed,
    /// instead of skipping them with a warning.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Merge every layer found in `config_dir` for `environment` and decode
    /// the result into the wrapped value.
    ///
    /// Missing layer files are never an error. The wrapped value is only
    /// replaced once decoding and validation have both succeeded.
    pub fn load(
        &mut self,
        environment: impl AsRef<str>,
        config_dir: impl AsRef<Path>,
    ) -> Result<(), ConfigError> {
        let environment = environment.as_ref();
        let config_dir = config_dir.as_ref();

        if environment.contains(['/', '\\']) {
            return Err(SetupError::InvalidEnvironment(environment.to_string()).into());
        }
        self.engine.configure(config_dir)?;

        let keys = KeySet::of::<T>();
        let current = serde_yaml::to_value(&*self.config).map_err(ConfigError::Defaults)?;
        let mut state = Document::from_value(current).unwrap_or_default();

        self.apply_layer(&mut state, EXAMPLE_NAME, Phase::BaseLoad)?;
        self.apply_layer(&mut state, CONFIG_NAME, Phase::BaseLoad)?;
        if environment.is_empty() {
            tracing::debug!("No environment name given; skipping per-environment config");
        } else {
            let name = format!("{CONFIG_NAME}.{environment}");
            self.apply_layer(&mut state, &name, Phase::EnvMerge)?;
        }

        keys.canonicalize(state.as_mapping_mut());
        let prefix = self.env_prefix.as_deref();
        let overlay = env::overlay(&mut state, &keys, prefix, &*self.env_lookup);

        let decoded: T = if overlay.created.is_empty() {
            serde_yaml::from_value(state.into_value())
        } else {
            // Structs without `#[serde(default)]` need every field; fill the
            // ones a lone variable left out with zero values and retry.
            serde_yaml::from_value(state.clone().into_value()).or_else(|_| {
                for path in &overlay.created {
                    keys.fill_missing(state.as_mapping_mut(), path);
                }
                serde_yaml::from_value(state.into_value())
            })
        }
        .map_err(ConfigError::Unmarshal)?;

        if let Some(validator) = &self.validator {
            validator(&decoded).map_err(|e| ConfigError::Validation(e.into()))?;
        }

        *self.config = decoded;
        Ok(())
    }

    fn apply_layer(
        &self,
        state: &mut Document,
        name: &str,
        phase: Phase,
    ) -> Result<(), ConfigError> {
        match self.engine.read(name) {
            Ok(Some(layer)) => {
                tracing::debug!("Merging config layer '{}'", name);
                self.engine.merge(state, layer);
                Ok(())
            }
            Ok(None) => {
                tracing::debug!("Config layer '{}' not found; skipping", name);
                Ok(())
            }
            Err(e) if self.strict => Err(match phase {
                Phase::EnvMerge => ConfigError::EnvMerge(e),
                _ => ConfigError::BaseLoad(e),
            }),
            Err(e) => {
                // Lenient by default: a broken optional layer must not stop startup.
                tracing::warn!("Ignoring config layer '{}': {}", name, e);
                Ok(())
            }
        }
    }
}
