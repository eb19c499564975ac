//! Port trait definitions (Hexagonal Architecture)
//!
//! Async trait interfaces the services depend on and the adapters implement:
//! - SchemaRegistry: namespace allocation per network
//! - BinaryProvisioner: sink binary download and credentials
//! - SinkProcess: one invocation of the sink binary
//! - ReadinessCheck: head block drift readiness
//! - CatalogRepository: read-only queries for the HTTP API
//! - Job: unit of work driven by the job lifecycle manager

pub mod binary_provisioner;
pub mod catalog_repository;
pub mod job;
pub mod readiness;
pub mod schema_registry;
pub mod sink_process;

pub use binary_provisioner::BinaryProvisioner;
pub use catalog_repository::CatalogRepository;
pub use job::{Job, JobFactory};
pub use readiness::ReadinessCheck;
pub use schema_registry::SchemaRegistry;
pub use sink_process::SinkProcess;
