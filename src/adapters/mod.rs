//! Adapters implementing the domain ports.

pub mod http;
pub mod memory;
pub mod postgres;
