//! HTTP read API.

pub mod server;

pub use server::{build_router, AppState, HttpServer};
