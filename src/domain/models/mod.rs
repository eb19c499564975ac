//! Domain models for the sink supervisor.

pub mod catalog;
pub mod config;
pub mod process;
pub mod schema;
pub mod sink;

pub use catalog::{CatalogView, JsonRow};
pub use config::{Config, DatabaseConfig, LoggingConfig, ServerConfig, SinkConfig};
pub use process::ExitResult;
pub use schema::{
    increment_schema, initial_schema, is_plain_identifier, next_schema, CursorRecord,
    NetworkSchema,
};
pub use sink::{
    ApiToken, Readiness, RestartPolicy, RestartTracker, SinkCommand, SupervisorPhase,
    API_TOKEN_ENV,
};
