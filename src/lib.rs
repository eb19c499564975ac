//! Sink supervisor
//!
//! Keeps a `substreams-sink-postgres` process alive against one network,
//! hands every run a fresh Postgres schema namespace, and serves the indexed
//! data over HTTP.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): models, errors and port traits
//! - **Adapters** (`adapters`): Postgres, in-memory and HTTP implementations
//! - **Infrastructure Layer** (`infrastructure`): config, logging, child processes, binary releases
//! - **Service Layer** (`services`): supervisor, job lifecycle manager, readiness probe
//! - **CLI Layer** (`cli`): command-line interface

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

pub use domain::errors::{DomainError, DomainResult};
pub use domain::models::{Config, DatabaseConfig, LoggingConfig, SinkConfig};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{JobLifecycleManager, SinkSupervisor};
