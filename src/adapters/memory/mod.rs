//! In-memory adapters.

pub mod schema_registry;

pub use schema_registry::InMemorySchemaRegistry;
