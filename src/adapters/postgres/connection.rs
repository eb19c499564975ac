//! Postgres connection pool management.

use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::domain::models::DatabaseConfig;

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Failed to create pool: {0}")]
    PoolCreationFailed(#[source] sqlx::Error),
    #[error("Invalid database URL for host {0}")]
    InvalidDatabaseUrl(String),
}

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(10),
        }
    }
}

impl PoolConfig {
    pub fn for_database(database: &DatabaseConfig) -> Self {
        Self {
            max_connections: database.max_connections,
            ..Default::default()
        }
    }
}

/// Connect options built field by field, so credentials never go through URL parsing.
pub fn connect_options(database: &DatabaseConfig) -> PgConnectOptions {
    PgConnectOptions::new()
        .host(&database.host)
        .port(database.port)
        .username(&database.user)
        .password(&database.password)
        .database(&database.database)
}

/// Parse a `postgres://` URL. Credentials in it must be percent-encoded.
pub fn parse_database_url(database_url: &str) -> Result<PgConnectOptions, ConnectionError> {
    // the URL carries the password, keep it out of the error
    PgConnectOptions::from_str(database_url).map_err(|_| {
        ConnectionError::InvalidDatabaseUrl(
            database_url.rsplit('@').next().unwrap_or_default().to_string(),
        )
    })
}

pub async fn create_pool(
    connect_options: PgConnectOptions,
    config: Option<PoolConfig>,
) -> Result<PgPool, ConnectionError> {
    let config = config.unwrap_or_default();

    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect_with(connect_options)
        .await
        .map_err(ConnectionError::PoolCreationFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn database(password: &str) -> DatabaseConfig {
        DatabaseConfig {
            user: "sink".to_string(),
            password: password.to_string(),
            host: "db".to_string(),
            port: 5433,
            database: "indexer".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_connect_options_accept_reserved_characters_in_password() {
        let options = connect_options(&database("pa#ss/w?rd:@x"));

        assert_eq!(options.get_host(), "db");
        assert_eq!(options.get_port(), 5433);
        assert_eq!(options.get_username(), "sink");
        assert_eq!(options.get_database(), Some("indexer"));
    }

    #[test]
    fn test_unencoded_password_in_url_is_rejected_without_leaking_it() {
        let err = parse_database_url("postgres://sink:pa#ss/w?rd@db:5432/indexer").unwrap_err();
        assert!(matches!(err, ConnectionError::InvalidDatabaseUrl(_)));
        assert!(!err.to_string().contains("pa#ss"));
    }

    #[test]
    fn test_parse_database_url() {
        let options = parse_database_url("postgres://sink:p%23ss@db:5432/indexer").unwrap();
        assert_eq!(options.get_host(), "db");
        assert_eq!(options.get_database(), Some("indexer"));
    }

    #[test]
    fn test_pool_config_follows_database_settings() {
        let mut db = database("x");
        db.max_connections = 3;
        assert_eq!(PoolConfig::for_database(&db).max_connections, 3);
    }
}
