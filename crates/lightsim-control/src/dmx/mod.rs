//! Virtual DMX512 output
//!
//! A [`DmxFixture`] holds one 512-channel universe with a start address.
//! A [`DmxAdapter`] drives a fixture from a bridge light, and an
//! [`ArtNetSender`] can put the fixture's universe on the wire.
//!
//! ```rust
//! use lightsim_control::dmx::{DmxAdapter, DmxFixture};
//! use lightsim_control::hue::{Bridge, BridgeConfig, LightUpdate};
//! use parking_lot::Mutex;
//! use std::sync::Arc;
//!
//! # fn main() -> lightsim_control::Result<()> {
//! let bridge = Bridge::new(BridgeConfig::new(8000));
//! let fixture = Arc::new(Mutex::new(DmxFixture::new(10)?));
//! DmxAdapter::attach(&bridge, "par-1", fixture.clone(), |r, g, b| {
//!     [(0, r), (1, g), (2, b)].into_iter().collect()
//! });
//!
//! let update = LightUpdate::new()
//!     .with_on(true)
//!     .with_brightness(100)
//!     .with_xy(0.7, 0.3);
//! bridge.put_light("par-1", &update);
//! assert!(fixture.lock().get_channel(10)? > 0);
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod artnet;
pub mod fixture;

pub use adapter::{rgb_par_mapper, DmxAdapter, RgbMapper, SharedFixture, DMX_REFRESH_HZ};
pub use artnet::ArtNetSender;
pub use fixture::{DmxFixture, DMX_CHANNELS, DMX_FRAME_LEN};
