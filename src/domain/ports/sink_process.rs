//! Sink process port - one invocation of the external sink binary.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{ApiToken, ExitResult, SinkCommand};

#[async_trait]
pub trait SinkProcess: Send + Sync {
    /// Run `command` to completion.
    ///
    /// A non-zero exit is an `Ok` result; `Err` means the process could not be
    /// launched or did not finish in time.
    async fn execute(&self, command: &SinkCommand, token: &ApiToken) -> DomainResult<ExitResult>;
}
