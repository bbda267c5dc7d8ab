//! HTTP transport for the bridge resource API

pub mod handlers;
pub mod routes;
pub mod server;

pub use routes::build_router;
pub use server::{build_app, BridgeServer};
