//! Postgres implementation of the SchemaRegistry.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{error, info};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{is_plain_identifier, next_schema, NetworkSchema};
use crate::domain::ports::SchemaRegistry;

#[derive(Clone)]
pub struct PgSchemaRegistry {
    pool: PgPool,
    prefix: String,
}

impl PgSchemaRegistry {
    pub fn new(pool: PgPool, prefix: impl Into<String>) -> Self {
        Self {
            pool,
            prefix: prefix.into(),
        }
    }

    /// Physical namespaces that look like ours, registered or not.
    async fn existing_namespaces(&self) -> DomainResult<Vec<String>> {
        let pattern = format!("^{}[0-9]+$", self.prefix);
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT schema_name::text FROM information_schema.schemata WHERE schema_name ~ $1",
        )
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    async fn next_schema_after(&self, latest: Option<&NetworkSchema>) -> DomainResult<String> {
        let existing = self.existing_namespaces().await?;
        let schema = next_schema(&self.prefix, latest.map(|s| s.schema_name.as_str()), &existing)?;
        if !is_plain_identifier(&schema) {
            return Err(DomainError::InvalidSchema(schema));
        }
        Ok(schema)
    }

    /// Name the next allocation for `network` would produce. Changes nothing.
    pub async fn peek_next_schema(&self, network: &str) -> DomainResult<String> {
        let latest = self.current_schema(network).await?;
        self.next_schema_after(latest.as_ref()).await
    }

    /// Statements that materialize `schema` and make it active for `network`.
    ///
    /// Identifiers cannot be bound, so `schema` must already be a plain identifier.
    async fn create_schema(&self, network: &str, schema: &str) -> Result<(), sqlx::Error> {
        let mut conn = self.pool.acquire().await?;

        sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {schema}"))
            .execute(&mut *conn)
            .await?;

        sqlx::query(
            r#"INSERT INTO substreams.network_schema (network, entity_schema, created_at)
               VALUES ($1, $2, now())
               ON CONFLICT (network) DO UPDATE
               SET entity_schema = EXCLUDED.entity_schema, created_at = EXCLUDED.created_at"#,
        )
        .bind(network)
        .bind(schema)
        .execute(&mut *conn)
        .await?;

        sqlx::query("INSERT INTO substreams.deployments (schema, network) VALUES ($1, $2)")
            .bind(schema)
            .bind(network)
            .execute(&mut *conn)
            .await?;

        sqlx::query(&format!(
            r#"CREATE TABLE {schema}.cursors (
                id text PRIMARY KEY,
                cursor text,
                block_num bigint,
                block_id text
            )"#
        ))
        .execute(&mut *conn)
        .await?;

        sqlx::query(&format!("CREATE UNIQUE INDEX cursor_pk ON {schema}.cursors (id)"))
            .execute(&mut *conn)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl SchemaRegistry for PgSchemaRegistry {
    async fn current_schema(&self, network: &str) -> DomainResult<Option<NetworkSchema>> {
        let row: Option<NetworkSchemaRow> = sqlx::query_as(
            "SELECT network, entity_schema, created_at FROM substreams.network_schema WHERE network = $1",
        )
        .bind(network)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn allocate_next_schema(&self, network: &str) -> DomainResult<String> {
        let latest = self.current_schema(network).await?;
        let schema = self.next_schema_after(latest.as_ref()).await?;

        if let Err(e) = self.create_schema(network, &schema).await {
            error!(network, schema = %schema, error = %e, "schema allocation failed, namespace may be partially created");
            return Err(DomainError::SchemaCreationFailed {
                network: network.to_string(),
                schema,
                reason: e.to_string(),
            });
        }

        info!(network, schema = %schema, previous = ?latest.map(|s| s.schema_name), "allocated schema");
        Ok(schema)
    }
}

#[derive(sqlx::FromRow)]
struct NetworkSchemaRow {
    network: String,
    entity_schema: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<NetworkSchemaRow> for NetworkSchema {
    type Error = DomainError;

    fn try_from(row: NetworkSchemaRow) -> Result<Self, Self::Error> {
        if !is_plain_identifier(&row.entity_schema) {
            return Err(DomainError::InvalidSchema(row.entity_schema));
        }
        Ok(Self {
            network: row.network,
            schema_name: row.entity_schema,
            created_at: row.created_at,
        })
    }
}
