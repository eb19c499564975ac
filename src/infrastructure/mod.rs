//! Infrastructure layer module
//!
//! - Configuration management
//! - Logging infrastructure
//! - Process management for the sink binary
//! - Sink binary release provisioning

pub mod config;
pub mod logging;
pub mod process;
pub mod release;
