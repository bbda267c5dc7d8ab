//! LightSim Control - virtual lighting hardware for testing control software
//!
//! This crate simulates:
//! - **DMX**: addressable 512-channel fixtures, optional Art-Net output
//! - **Hue**: a bridge with the light resource API and entertainment
//!   streaming over UDP, plus a device-side streaming client
//! - **Web**: the axum transport serving the bridge's resource API
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lightsim_control::hue::{BridgeConfig, StreamAction, StreamingClient};
//! use lightsim_control::web::BridgeServer;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let server = BridgeServer::bind(BridgeConfig::new(8000)).await?;
//! server.bridge().register_light("1", None);
//!
//! let mut client = StreamingClient::new("127.0.0.1:8000", "app-key", "1")?;
//! client.fetch_channel_id().await?;
//! client.control_entertainment(StreamAction::Start).await?;
//! client.stream_rgb(255, 0, 0)?;
//!
//! server.shutdown().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`color`] - CIE xy / RGB conversion
//! - [`dmx`] - fixtures, the bridge-to-DMX adapter, Art-Net output
//! - [`hue`] - bridge, light store, stream codec and client
//! - [`web`] - HTTP server for the resource API
//! - [`logging`] - tracing subscriber setup
//! - [`error`] - Error types

pub mod color;
pub mod dmx;
/// Error types
pub mod error;
pub mod hue;
pub mod logging;
pub mod web;

// Re-exports
pub use dmx::{ArtNetSender, DmxAdapter, DmxFixture};
pub use error::{ControlError, Result};
pub use hue::{Bridge, BridgeConfig, HueError, LightState, LightUpdate, StreamingClient};
pub use logging::LogConfig;
pub use web::BridgeServer;
