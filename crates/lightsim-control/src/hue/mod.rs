//! Simulated Hue bridge
//!
//! - [`bridge`]: light resources, entertainment configuration, stream lifecycle
//! - [`store`]: light records and per-light observers
//! - [`stream`]: the `HueStream` packet codec and UDP receive loop
//! - [`client`]: device-side client talking to a bridge over HTTP and UDP
//! - [`models`]: JSON resource model shared by bridge, router and client

pub mod bridge;
pub mod client;
pub mod error;
pub mod models;
pub mod store;
pub mod stream;

pub use bridge::{Bridge, BridgeConfig, STREAM_PORT_OFFSET};
pub use client::StreamingClient;
pub use error::HueError;
pub use models::{LightState, LightUpdate, StreamAction, StreamStatus, Xy};
pub use store::{LightObserver, LightResourceStore};
