//! Application environment names

use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Conventional variable holding the environment name.
pub const APP_ENV_VAR: &str = "APP_ENV";

/// Which per-environment layer (`config.<name>`) applies.
///
/// Any name is accepted; the well-known ones get their own variants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AppEnvironment {
    Prod,
    #[default]
    Dev,
    Test,
    Integration,
    Custom(String),
}

impl AppEnvironment {
    pub fn as_str(&self) -> &str {
        match self {
            AppEnvironment::Prod => "prod",
            AppEnvironment::Dev => "dev",
            AppEnvironment::Test => "test",
            AppEnvironment::Integration => "integration",
            AppEnvironment::Custom(name) => name,
        }
    }

    pub fn is_production(&self) -> bool {
        *self == AppEnvironment::Prod
    }

    pub fn is_development(&self) -> bool {
        *self == AppEnvironment::Dev
    }

    pub fn is_test(&self) -> bool {
        *self == AppEnvironment::Test
    }

    pub fn is_integration(&self) -> bool {
        *self == AppEnvironment::Integration
    }

    /// Read the environment name from `key`, falling back to `default` when unset.
    pub fn from_env(key: &str, default: &str) -> Self {
        std::env::var(key).map(Self::from).unwrap_or_else(|_| Self::from(default))
    }
}

impl From<&str> for AppEnvironment {
    fn from(name: &str) -> Self {
        match name {
            "prod" => AppEnvironment::Prod,
            "dev" => AppEnvironment::Dev,
            "test" => AppEnvironment::Test,
            "integration" => AppEnvironment::Integration,
            other => AppEnvironment::Custom(other.to_string()),
        }
    }
}

impl From<String> for AppEnvironment {
    fn from(name: String) -> Self {
        Self::from(name.as_str())
    }
}

impl From<AppEnvironment> for String {
    fn from(env: AppEnvironment) -> Self {
        env.as_str().to_string()
    }
}

impl FromStr for AppEnvironment {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

impl AsRef<str> for AppEnvironment {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for AppEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Port for the main service: `PORT` when set and non-empty, else `default`.
pub fn server_port(default: &str) -> String {
    port_from(std::env::var("PORT").ok(), default)
}

fn port_from(value: Option<String>, default: &str) -> String {
    value.filter(|port| !port.is_empty()).unwrap_or_else(|| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_and_custom_names() {
        assert_eq!(AppEnvironment::from("prod"), AppEnvironment::Prod);
        assert_eq!(AppEnvironment::from("integration"), AppEnvironment::Integration);
        assert_eq!(AppEnvironment::from("staging"), AppEnvironment::Custom("staging".into()));
        let parsed = "staging".parse::<AppEnvironment>().map(|e| e.to_string());
        assert_eq!(parsed, Ok("staging".to_string()));
    }

    #[test]
    fn test_predicates() {
        assert!(AppEnvironment::Prod.is_production());
        assert!(AppEnvironment::Dev.is_development());
        assert!(AppEnvironment::Test.is_test());
        assert!(AppEnvironment::Integration.is_integration());
        assert!(!AppEnvironment::Custom("prod-eu".into()).is_production());
    }

    #[test]
    fn test_serde_as_plain_string() {
        let env: AppEnvironment = serde_yaml::from_str("test").expect("yaml");
        assert_eq!(env, AppEnvironment::Test);
        let out = serde_yaml::to_string(&AppEnvironment::Custom("qa".into())).expect("yaml");
        assert_eq!(out.trim(), "qa");
    }

    #[test]
    fn test_from_env_default() {
        let env = AppEnvironment::from_env("LAYERED_CONFIG_TEST_SURELY_UNSET_ENV", "integration");
        assert_eq!(env, AppEnvironment::Integration);
    }

    #[test]
    fn test_port_fallback() {
        assert_eq!(port_from(Some("9090".into()), "8080"), "9090");
        assert_eq!(port_from(Some(String::new()), "8080"), "8080");
        assert_eq!(port_from(None, "8080"), "8080");
    }
}
