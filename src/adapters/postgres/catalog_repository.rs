//! Read-only queries over the tables the sink binary populates.

use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;

use crate::domain::errors::DomainResult;
use crate::domain::models::{CatalogView, JsonRow};
use crate::domain::ports::{CatalogRepository, SchemaRegistry};

/// Serves each view from the network's active namespace.
#[derive(Clone)]
pub struct PgCatalogRepository {
    pool: PgPool,
    registry: Arc<dyn SchemaRegistry>,
    network: String,
}

impl PgCatalogRepository {
    pub fn new(pool: PgPool, registry: Arc<dyn SchemaRegistry>, network: impl Into<String>) -> Self {
        Self {
            pool,
            registry,
            network: network.into(),
        }
    }
}

/// SQL for `view` inside `schema`. `schema` comes from the registry and is a plain identifier.
pub fn view_query(view: CatalogView, schema: &str) -> String {
    match view {
        CatalogView::Items => format!("SELECT row_to_json(t) AS data FROM {schema}.items t"),
        CatalogView::Collections => {
            format!("SELECT row_to_json(t) AS data FROM {schema}.collections t")
        }
        CatalogView::Catalog => format!(
            r#"SELECT row_to_json(c) AS data FROM (
                SELECT
                    items.*,
                    cast(items.max_supply as numeric(77)) - COUNT(nfts) as available,
                    MIN(orders.price) as min_order_price,
                    (
                        CASE WHEN cast(items.max_supply as numeric(77)) - COUNT(nfts) > 0
                            THEN LEAST(cast(items.price as numeric(77)), MIN(cast(orders.price as numeric(77))))
                            ELSE cast(MIN(orders.price) as numeric(77))
                        END
                    ) as min_price
                FROM {schema}.items
                JOIN {schema}.nfts ON nfts.item_id = items.id
                JOIN {schema}.orders ON orders.nft_id || '-' || orders.token_id = nfts.id
                    AND orders.status = 'open'
                    AND to_timestamp(substr(orders.expires_at, 1, length(orders.expires_at) - 3)::double precision) > now()
                GROUP BY items.id
                ORDER BY min_price
            ) c"#
        ),
    }
}

#[async_trait]
impl CatalogRepository for PgCatalogRepository {
    async fn fetch(&self, view: CatalogView) -> DomainResult<Vec<JsonRow>> {
        let Some(active) = self.registry.current_schema(&self.network).await? else {
            return Ok(Vec::new());
        };

        let rows: Vec<JsonRow> = sqlx::query_as(&view_query(view, &active.schema_name))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }
}
