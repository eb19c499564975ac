//! Postgres adapters: pool, control-table migrations, schema registry and read queries.

pub mod catalog_repository;
pub mod connection;
pub mod migrations;
pub mod schema_registry;

pub use catalog_repository::PgCatalogRepository;
pub use connection::{connect_options, create_pool, parse_database_url, ConnectionError, PoolConfig};
pub use migrations::{all_embedded_migrations, Migration, MigrationError, Migrator};
pub use schema_registry::PgSchemaRegistry;

use sqlx::postgres::PgConnectOptions;
use sqlx::PgPool;

use crate::domain::models::DatabaseConfig;

#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),
    #[error("Migration error: {0}")]
    Migration(#[from] MigrationError),
    #[error("Query error: {0}")]
    Query(#[from] sqlx::Error),
}

/// Connect to `database_url` and bring the control tables up to date.
pub async fn initialize_database(database_url: &str, config: Option<PoolConfig>) -> Result<PgPool, DatabaseError> {
    initialize_with_options(parse_database_url(database_url)?, config).await
}

/// Connect with the configured credentials and bring the control tables up to date.
pub async fn initialize_from_config(database: &DatabaseConfig) -> Result<PgPool, DatabaseError> {
    initialize_with_options(connect_options(database), Some(PoolConfig::for_database(database))).await
}

async fn initialize_with_options(
    options: PgConnectOptions,
    config: Option<PoolConfig>,
) -> Result<PgPool, DatabaseError> {
    let pool = create_pool(options, config).await?;
    let migrator = Migrator::new(pool.clone());
    migrator.run_embedded_migrations(all_embedded_migrations()).await?;
    Ok(pool)
}
