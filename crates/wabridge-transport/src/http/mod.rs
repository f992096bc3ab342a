//! HTTP surface of the bridge.

mod routes;
mod server;

pub use routes::{AppState, router};
pub use server::HttpServer;
