//! Ready-made application config

use super::database::{MongoDbConfig, MySqlConfig, PostgresConfig, RedisConfig};
use super::messaging::{EmailConfig, TelegramConfig};
use crate::config::AppEnvironment;
use anyhow::{bail, ensure, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings shared by most services: app identity, datastores, notification
/// channels, HTTP server and JWT.
///
/// Every field binds to an upper-cased variable, e.g. `DATABASE_HOST`,
/// `SERVER_PORT` or `JWT_SECRET_KEY`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub app_name: String,
    pub app_env: AppEnvironment,
    pub app_log_path: String,
    pub app_log_level: String,

    pub database: PostgresConfig,
    pub mysql: Option<MySqlConfig>,
    pub redis: RedisConfig,
    pub mongodb: Option<MongoDbConfig>,

    pub telegram: TelegramConfig,
    pub email: EmailConfig,

    pub server_port: i64,
    pub server_host: String,
    /// Seconds.
    pub server_timeout: i64,

    pub jwt_secret_key: String,
    #[serde(with = "crate::duration")]
    pub jwt_expiration: Duration,
    #[serde(with = "crate::duration")]
    pub jwt_refresh_expiry: Duration,
}

impl AppConfig {
    /// Sanity checks, suitable for
    /// [`ConfigLoader::with_validation`](crate::ConfigLoader::with_validation).
    pub fn validate(&self) -> Result<()> {
        ensure!(!self.app_name.is_empty(), "app_name is required");
        ensure!(
            (1..=65535).contains(&self.server_port),
            "server_port must be between 1 and 65535, got {}",
            self.server_port
        );
        ensure!(self.server_timeout >= 0, "server_timeout must not be negative");

        if self.database.enabled && self.database.host.is_empty() {
            bail!("database.host is required when database is enabled");
        }
        if let Some(mysql) = self.mysql.as_ref().filter(|m| m.enabled) {
            ensure!(!mysql.host.is_empty(), "mysql.host is required when mysql is enabled");
        }
        if self.redis.enabled && self.redis.host.is_empty() {
            bail!("redis.host is required when redis is enabled");
        }
        if let Some(mongodb) = self.mongodb.as_ref().filter(|m| m.enabled) {
            ensure!(!mongodb.host.is_empty(), "mongodb.host is required when mongodb is enabled");
        }
        if self.telegram.enabled && self.telegram.bot_token.is_empty() {
            bail!("telegram.bot_token is required when telegram is enabled");
        }
        if self.email.enabled && self.email.smtp_host.is_empty() {
            bail!("email.smtp_host is required when email is enabled");
        }

        if self.app_env.is_production() {
            ensure!(!self.jwt_secret_key.is_empty(), "jwt_secret_key is required in production");
        }
        if !self.jwt_refresh_expiry.is_zero() && self.jwt_refresh_expiry < self.jwt_expiration {
            bail!("jwt_refresh_expiry must not be shorter than jwt_expiration");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigLoader, KeySet};
    use std::fs;
    use tempfile::TempDir;

    fn valid() -> AppConfig {
        AppConfig { app_name: "svc".into(), server_port: 8080, ..Default::default() }
    }

    #[test]
    fn test_validate_accepts_minimal() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let cfg = AppConfig { app_name: String::new(), ..valid() };
        assert!(cfg.validate().unwrap_err().to_string().contains("app_name"));

        let cfg = AppConfig { server_port: 70000, ..valid() };
        assert!(cfg.validate().unwrap_err().to_string().contains("server_port"));

        let mut cfg = valid();
        cfg.redis.enabled = true;
        assert!(cfg.validate().unwrap_err().to_string().contains("redis.host"));

        let cfg = AppConfig { app_env: AppEnvironment::Prod, ..valid() };
        assert!(cfg.validate().unwrap_err().to_string().contains("jwt_secret_key"));
    }

    #[test]
    fn test_disabled_optional_store_is_not_checked() {
        let cfg = AppConfig { mysql: Some(MySqlConfig::default()), ..valid() };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_env_names() {
        let names = KeySet::of::<AppConfig>().env_var_names(None);
        for expected in [
            "APP_NAME",
            "APP_ENV",
            "DATABASE_HOST",
            "MYSQL_PARSE_TIME",
            "MONGODB_AUTH_SOURCE",
            "JWT_SECRET_KEY",
        ] {
            assert!(names.iter().any(|n| n == expected), "missing {expected}");
        }
        assert!(!names.iter().any(|n| n == "DATABASE"), "struct nodes do not bind");
    }

    #[test]
    fn test_load_from_yaml_with_env_overrides() {
        let tmp = TempDir::new().expect("tmp");
        fs::write(
            tmp.path().join("config.yaml"),
            "app_name: svc\napp_env: prod\nserver_port: 8080\n\
             jwt_secret_key: s3cret\njwt_expiration: 15m\n\
             database:\n  host: localhost\n  port: 5432\n  conn_max_lifetime: 1h\n\
             mongodb:\n  host: mongo\n  port: 27017\n  database: app\n",
        )
        .expect("write");

        let mut cfg = AppConfig::default();
        ConfigLoader::new(&mut cfg)
            .with_env_lookup(|name| match name {
                "DATABASE_PORT" => Some("6543".to_string()),
                "REDIS_DIAL_TIMEOUT" => Some("250ms".to_string()),
                _ => None,
            })
            .with_validation(AppConfig::validate)
            .load("prod", tmp.path())
            .expect("load");

        assert!(cfg.app_env.is_production());
        assert_eq!(cfg.database.port, 6543);
        assert_eq!(cfg.database.conn_max_lifetime, Duration::from_secs(3600));
        assert_eq!(cfg.redis.dial_timeout, Duration::from_millis(250));
        assert_eq!(cfg.jwt_expiration, Duration::from_secs(900));
        assert!(cfg.mysql.is_none());
        let uri = cfg.mongodb.as_ref().map(MongoDbConfig::uri);
        assert_eq!(uri.as_deref(), Some("mongodb://mongo:27017/app"));
    }
}
