//! Database connection settings

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub ssl_mode: String,
    pub timezone: String,
    pub max_open_conns: u32,
    pub max_idle_conns: u32,
    #[serde(with = "crate::duration")]
    pub conn_max_lifetime: Duration,
    #[serde(with = "crate::duration")]
    pub conn_max_idle_time: Duration,
    pub enabled: bool,
}

impl PostgresConfig {
    /// libpq keyword/value connection string.
    pub fn dsn(&self) -> String {
        format!(
            "host={} port={} user={} password={} dbname={} sslmode={} TimeZone={}",
            self.host,
            self.port,
            self.user,
            self.password,
            self.database,
            self.ssl_mode,
            self.timezone
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MySqlConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub charset: String,
    pub parse_time: bool,
    pub loc: String,
    pub max_open_conns: u32,
    pub max_idle_conns: u32,
    #[serde(with = "crate::duration")]
    pub conn_max_lifetime: Duration,
    #[serde(with = "crate::duration")]
    pub conn_max_idle_time: Duration,
    pub enabled: bool,
}

impl MySqlConfig {
    /// go-sql-driver style DSN.
    pub fn dsn(&self) -> String {
        format!(
            "{}:{}@tcp({}:{})/{}?charset={}&parseTime={}&loc={}",
            self.user,
            self.password,
            self.host,
            self.port,
            self.database,
            self.charset,
            self.parse_time,
            self.loc
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub db: u32,
    pub password: String,
    pub pool_size: u32,
    pub max_retries: u32,
    #[serde(with = "crate::duration")]
    pub dial_timeout: Duration,
    #[serde(with = "crate::duration")]
    pub read_timeout: Duration,
    #[serde(with = "crate::duration")]
    pub write_timeout: Duration,
    pub enabled: bool,
}

impl RedisConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MongoDbConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub auth_source: String,
    pub replica_set: String,
    pub max_pool_size: u64,
    pub min_pool_size: u64,
    #[serde(with = "crate::duration")]
    pub timeout: Duration,
    pub enabled: bool,
}

impl MongoDbConfig {
    pub fn uri(&self) -> String {
        let mut uri = format!("mongodb://{}:{}/{}", self.host, self.port, self.database);
        let mut params = Vec::new();
        if !self.auth_source.is_empty() {
            params.push(format!("authSource={}", self.auth_source));
        }
        if !self.replica_set.is_empty() {
            params.push(format!("replicaSet={}", self.replica_set));
        }
        if !params.is_empty() {
            uri.push('?');
            uri.push_str(&params.join("&"));
        }
        uri
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_postgres_dsn() {
        let cfg = PostgresConfig {
            host: "localhost".into(),
            port: 5432,
            user: "postgres".into(),
            password: "password".into(),
            database: "testdb".into(),
            ssl_mode: "disable".into(),
            timezone: "UTC".into(),
            ..Default::default()
        };
        assert_eq!(
            cfg.dsn(),
            "host=localhost port=5432 user=postgres password=password dbname=testdb \
             sslmode=disable TimeZone=UTC"
        );
    }

    #[test]
    fn test_mysql_dsn() {
        let cfg = MySqlConfig {
            host: "localhost".into(),
            port: 3306,
            user: "root".into(),
            password: "password".into(),
            database: "testdb".into(),
            charset: "utf8mb4".into(),
            parse_time: true,
            loc: "Local".into(),
            ..Default::default()
        };
        assert_eq!(
            cfg.dsn(),
            "root:password@tcp(localhost:3306)/testdb?charset=utf8mb4&parseTime=true&loc=Local"
        );
    }

    #[test]
    fn test_redis_addr() {
        let cfg = RedisConfig { host: "localhost".into(), port: 6379, ..Default::default() };
        assert_eq!(cfg.addr(), "localhost:6379");
    }

    #[test]
    fn test_mongodb_uri_variants() {
        let mut cfg = MongoDbConfig {
            host: "localhost".into(),
            port: 27017,
            database: "testdb".into(),
            auth_source: "admin".into(),
            replica_set: "rs0".into(),
            ..Default::default()
        };
        assert_eq!(cfg.uri(), "mongodb://localhost:27017/testdb?authSource=admin&replicaSet=rs0");

        cfg.auth_source.clear();
        assert_eq!(cfg.uri(), "mongodb://localhost:27017/testdb?replicaSet=rs0");

        cfg.replica_set.clear();
        assert_eq!(cfg.uri(), "mongodb://localhost:27017/testdb");
    }
}
