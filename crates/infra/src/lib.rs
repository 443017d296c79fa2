//! Infrastructure layer: configuration, database pool and product stores.

pub mod config;
pub mod db;
pub mod store;

pub use config::{AppConfig, ConfigError, DatabaseConfig, ServerConfig};
pub use store::{InMemoryProductStore, PostgresProductStore};
