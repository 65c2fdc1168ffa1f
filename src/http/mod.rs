//! HTTP API
//!
//! Serves the cached graph, the rebuild trigger, the paper to lab lookup and
//! the collaborator proxies.

pub mod handler;
pub mod server;

pub use server::{router, AppState, HttpServer};
