//! CLI command implementations.

pub mod ready;
pub mod schema;
pub mod serve;
