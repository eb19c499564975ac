//! Domain errors for the sink supervisor.

use thiserror::Error;

/// Domain-level errors that can occur while provisioning or supervising a sink.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The schema name carries no trailing number to advance.
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    /// Allocating a new namespace failed part-way. Already executed DDL is not rolled back.
    #[error("Failed to create schema {schema} for network {network}: {reason}")]
    SchemaCreationFailed {
        network: String,
        schema: String,
        reason: String,
    },

    #[error("Provisioning failed: {0}")]
    ProvisioningFailed(String),

    #[error("Process error: {0}")]
    ProcessFailed(String),

    #[error("Sink setup exited unsuccessfully: {0}")]
    SetupFailed(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Io error: {0}")]
    Io(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::DatabaseError(err.to_string())
    }
}

impl From<std::io::Error> for DomainError {
    fn from(err: std::io::Error) -> Self {
        DomainError::Io(err.to_string())
    }
}
