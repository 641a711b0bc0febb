//! Config structs for common service dependencies
//!
//! All structs use `#[serde(default)]`, so a partial file or a single
//! environment variable is enough to populate them.

pub mod app;
pub mod database;
pub mod messaging;

pub use app::AppConfig;
pub use database::{MongoDbConfig, MySqlConfig, PostgresConfig, RedisConfig};
pub use messaging::{EmailConfig, TelegramConfig};
