//! In-memory SchemaRegistry with the same allocation rules as Postgres.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeSet, HashMap};
use tokio::sync::RwLock;

use crate::domain::errors::DomainResult;
use crate::domain::models::{next_schema, NetworkSchema};
use crate::domain::ports::SchemaRegistry;

#[derive(Default)]
struct State {
    active: HashMap<String, NetworkSchema>,
    namespaces: BTreeSet<String>,
}

pub struct InMemorySchemaRegistry {
    prefix: String,
    state: RwLock<State>,
}

impl InMemorySchemaRegistry {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            state: RwLock::new(State::default()),
        }
    }

    /// Register a namespace that exists without being active for any network.
    pub async fn add_namespace(&self, name: impl Into<String>) {
        self.state.write().await.namespaces.insert(name.into());
    }

    pub async fn namespaces(&self) -> Vec<String> {
        self.state.read().await.namespaces.iter().cloned().collect()
    }
}

#[async_trait]
impl SchemaRegistry for InMemorySchemaRegistry {
    async fn current_schema(&self, network: &str) -> DomainResult<Option<NetworkSchema>> {
        Ok(self.state.read().await.active.get(network).cloned())
    }

    async fn allocate_next_schema(&self, network: &str) -> DomainResult<String> {
        let mut state = self.state.write().await;
        let existing: Vec<String> = state.namespaces.iter().cloned().collect();
        let latest = state.active.get(network).map(|s| s.schema_name.clone());
        let schema = next_schema(&self.prefix, latest.as_deref(), &existing)?;

        state.namespaces.insert(schema.clone());
        state.active.insert(
            network.to_string(),
            NetworkSchema {
                network: network.to_string(),
                schema_name: schema.clone(),
                created_at: Utc::now(),
            },
        );
        Ok(schema)
    }
}
