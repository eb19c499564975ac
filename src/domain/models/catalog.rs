//! Rows served by the read API.

use serde::Serialize;

/// Data sets exposed by the read API, all read from the active namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogView {
    Items,
    Collections,
    Catalog,
}

impl CatalogView {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Items => "items",
            Self::Collections => "collections",
            Self::Catalog => "catalog",
        }
    }
}

/// One row of a sink-owned table, whose columns are defined by the sink's schema file.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(transparent)]
pub struct JsonRow {
    pub data: serde_json::Value,
}
