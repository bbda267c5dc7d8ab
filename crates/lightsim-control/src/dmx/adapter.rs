//! Exposes a DMX fixture as a bridge light
//!
//! The adapter registers itself as the observer of one light. Every applied
//! update is turned into RGB, mapped to fixture-relative channels by a
//! caller-supplied function and written to the fixture. Updates arriving
//! faster than the DMX refresh ceiling are dropped.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::fixture::DmxFixture;
use crate::color::xy_to_rgb;
use crate::hue::bridge::Bridge;
use crate::hue::models::{LightState, LightUpdate};
use crate::hue::store::LightObserver;

/// Practical DMX512 refresh ceiling
pub const DMX_REFRESH_HZ: u32 = 44;

/// Maps an RGB color to `fixture-relative channel offset -> value`
pub type RgbMapper = Box<dyn Fn(u8, u8, u8) -> HashMap<u16, u8> + Send + Sync>;

/// Fixture shared between the adapter and whoever reads it
pub type SharedFixture = Arc<Mutex<DmxFixture>>;

/// Plain RGB par: offsets 0, 1, 2 carry red, green, blue
pub fn rgb_par_mapper() -> RgbMapper {
    Box::new(|r, g, b| HashMap::from([(0, r), (1, g), (2, b)]))
}

pub struct DmxAdapter {
    light_id: String,
    fixture: SharedFixture,
    mapper: RgbMapper,
    min_interval: Duration,
    last_applied: Mutex<Option<Instant>>,
    applied: AtomicU64,
}

impl DmxAdapter {
    pub fn new<F>(light_id: impl Into<String>, fixture: SharedFixture, mapper: F) -> Self
    where
        F: Fn(u8, u8, u8) -> HashMap<u16, u8> + Send + Sync + 'static,
    {
        Self {
            light_id: light_id.into(),
            fixture,
            mapper: Box::new(mapper),
            min_interval: Duration::from_secs(1) / DMX_REFRESH_HZ,
            last_applied: Mutex::new(None),
            applied: AtomicU64::new(0),
        }
    }

    /// Create an adapter and register it on `bridge` in one step
    pub fn attach<F>(
        bridge: &Bridge,
        light_id: impl Into<String>,
        fixture: SharedFixture,
        mapper: F,
    ) -> Arc<Self>
    where
        F: Fn(u8, u8, u8) -> HashMap<u16, u8> + Send + Sync + 'static,
    {
        Self::new(light_id, fixture, mapper).register(bridge)
    }

    /// Minimum time between two applied updates
    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }

    /// Register as the light's observer (creating the light and its
    /// entertainment channel if needed). A new light starts off, at full
    /// brightness, with xy (0, 0).
    pub fn register(self, bridge: &Bridge) -> Arc<Self> {
        if !bridge.has_light(&self.light_id) {
            bridge.put_light(&self.light_id, &Self::initial_state());
        }

        let adapter = Arc::new(self);
        let channel = bridge.register_light(
            &adapter.light_id,
            Some(adapter.clone() as Arc<dyn LightObserver>),
        );
        tracing::info!(
            "DMX adapter attached to light {} (channel {:?})",
            adapter.light_id,
            channel
        );
        adapter
    }

    pub fn light_id(&self) -> &str {
        &self.light_id
    }

    pub fn fixture(&self) -> &SharedFixture {
        &self.fixture
    }

    /// Updates that passed the rate limit
    pub fn applied_updates(&self) -> u64 {
        self.applied.load(Ordering::SeqCst)
    }

    /// Color a light state should produce. A streamed color wins; otherwise
    /// xy + brightness is converted, and an off light is black.
    pub fn rgb_for(state: &LightState) -> (u8, u8, u8) {
        if let Some([r, g, b]) = state.stream_rgb {
            return (r, g, b);
        }
        if !state.on.unwrap_or(false) {
            return (0, 0, 0);
        }
        let xy = state.xy().unwrap_or_default();
        xy_to_rgb(xy.x, xy.y, state.brightness().unwrap_or(0))
    }

    fn initial_state() -> LightUpdate {
        LightUpdate::new()
            .with_on(false)
            .with_brightness(100)
            .with_xy(0.0, 0.0)
    }
}

impl LightObserver for DmxAdapter {
    fn on_light_update(&self, state: &LightState) {
        // Window check and stamp happen under one lock
        let mut last = self.last_applied.lock();
        let now = Instant::now();
        if let Some(previous) = *last {
            if now.duration_since(previous) < self.min_interval {
                tracing::trace!("DMX update for light {} throttled", self.light_id);
                return;
            }
        }

        let (r, g, b) = Self::rgb_for(state);
        let values = (self.mapper)(r, g, b);

        // A rejected write does not consume the window
        if let Err(e) = self.fixture.lock().set_relative_channels(&values) {
            tracing::warn!("DMX write for light {} rejected: {}", self.light_id, e);
            return;
        }
        *last = Some(now);
        self.applied.fetch_add(1, Ordering::SeqCst);
        tracing::trace!("Light {} -> DMX rgb({}, {}, {})", self.light_id, r, g, b);
    }
}

impl std::fmt::Debug for DmxAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DmxAdapter")
            .field("light_id", &self.light_id)
            .field("min_interval", &self.min_interval)
            .field("applied", &self.applied_updates())
            .finish()
    }
}
