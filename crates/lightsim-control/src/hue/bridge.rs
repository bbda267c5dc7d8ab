//! Simulated Hue bridge: light resources, entertainment configuration and
//! the UDP streaming endpoint.

use http::StatusCode;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::models::{
    BridgeResponse, ChannelMember, EntertainmentChannel, EntertainmentConfiguration,
    EntertainmentMetadata, EntertainmentStatus, LightState, LightUpdate, Position, ResourceRef,
    StreamAction, StreamStatus, DEFAULT_ENTERTAINMENT_ID,
};
use super::store::{LightObserver, LightResourceStore};
use super::stream::{DatagramSink, StreamListener, StreamPacket};
use crate::{error::ControlError, Result};

/// Offset between the resource-API port and the streaming port
pub const STREAM_PORT_OFFSET: u16 = 1000;

/// Bridge configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    pub host: String,
    /// Resource-API port (0 = ephemeral)
    pub port: u16,
    /// Streaming port; `None` means `port + 1000`
    #[serde(default)]
    pub stream_port: Option<u16>,
    /// How often the stream listener re-checks its flags
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_entertainment_name")]
    pub entertainment_name: String,
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_entertainment_name() -> String {
    "Virtual entertainment area".to_string()
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            stream_port: None,
            poll_interval_ms: default_poll_interval_ms(),
            entertainment_name: default_entertainment_name(),
        }
    }
}

impl BridgeConfig {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            ..Default::default()
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Override the streaming port (0 = ephemeral)
    pub fn with_stream_port(mut self, port: u16) -> Self {
        self.stream_port = Some(port);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis().max(1) as u64;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Port the stream listener binds
    pub fn resolved_stream_port(&self) -> Result<u16> {
        match self.stream_port {
            Some(port) => Ok(port),
            None => self.port.checked_add(STREAM_PORT_OFFSET).ok_or_else(|| {
                ControlError::InvalidParameter(format!(
                    "API port {} leaves no room for the stream port",
                    self.port
                ))
            }),
        }
    }

    fn stream_bind_addr(&self) -> Result<SocketAddr> {
        let port = self.resolved_stream_port()?;
        if let Ok(ip) = self.host.parse::<IpAddr>() {
            return Ok(SocketAddr::new(ip, port));
        }
        (self.host.as_str(), port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| ControlError::InvalidParameter(format!("Cannot resolve {}", self.host)))
    }
}

/// Lights registered for streaming; position = channel id
#[derive(Default)]
struct ChannelMap {
    lights: Vec<String>,
}

impl ChannelMap {
    fn channel_of(&self, light_id: &str) -> Option<u8> {
        self.lights
            .iter()
            .position(|id| id == light_id)
            .and_then(|idx| u8::try_from(idx).ok())
    }

    fn light_of(&self, channel_id: u8) -> Option<&str> {
        self.lights.get(usize::from(channel_id)).map(String::as_str)
    }

    /// Next sequential id; `None` once all 256 ids are taken
    fn assign(&mut self, light_id: &str) -> Option<u8> {
        if let Some(existing) = self.channel_of(light_id) {
            return Some(existing);
        }
        let next = u8::try_from(self.lights.len()).ok()?;
        self.lights.push(light_id.to_string());
        Some(next)
    }
}

struct BridgeShared {
    config: BridgeConfig,
    store: LightResourceStore,
    channels: RwLock<ChannelMap>,
    active: AtomicBool,
    listener: Mutex<Option<StreamListener>>,
}

/// Cheaply cloneable handle to one simulated bridge.
///
/// Owns the light store, the entertainment configuration singleton and the
/// lifecycle of its stream listener. The listener thread stops when
/// [`shutdown`](Bridge::shutdown) is called or the last handle is dropped.
#[derive(Clone)]
pub struct Bridge {
    shared: Arc<BridgeShared>,
}

impl Bridge {
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            shared: Arc::new(BridgeShared {
                config,
                store: LightResourceStore::new(),
                channels: RwLock::new(ChannelMap::default()),
                active: AtomicBool::new(false),
                listener: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.shared.config
    }

    /// `GET /clip/v2/resource/light`
    pub fn list_lights(&self) -> BridgeResponse<LightState> {
        BridgeResponse::ok(self.shared.store.list())
    }

    /// `GET /clip/v2/resource/light/{id}`
    pub fn get_light(&self, id: &str) -> BridgeResponse<LightState> {
        match self.shared.store.get(id) {
            Some(light) => BridgeResponse::ok(vec![light]),
            None => BridgeResponse::error(StatusCode::NOT_FOUND, "not found"),
        }
    }

    pub fn has_light(&self, id: &str) -> bool {
        self.shared.store.contains(id)
    }

    /// `PUT /clip/v2/resource/light/{id}`: create if absent, merge, notify
    pub fn put_light(&self, id: &str, update: &LightUpdate) -> BridgeResponse<LightState> {
        if let Err(msg) = update.validate() {
            tracing::warn!("Rejected update for light {}: {}", id, msg);
            return BridgeResponse::error(StatusCode::BAD_REQUEST, msg);
        }
        let light = self.shared.store.apply_update(id, update);
        tracing::debug!("Light {} updated: {:?}", id, light);
        BridgeResponse::ok(vec![light])
    }

    /// Register a light for streaming, optionally attaching an observer.
    ///
    /// Idempotent: the record is created only if absent, the observer is
    /// replaced, and a channel id is assigned only the first time. Returns
    /// the light's channel id, or `None` when all 256 ids are in use.
    pub fn register_light(
        &self,
        id: &str,
        observer: Option<Arc<dyn LightObserver>>,
    ) -> Option<u8> {
        self.shared.store.ensure(id);
        if let Some(observer) = observer {
            self.shared.store.set_observer(id, observer);
        }
        let channel = self.shared.channels.write().assign(id);
        match channel {
            Some(channel_id) => {
                tracing::debug!("Light {} registered on channel {}", id, channel_id);
            }
            None => tracing::warn!("No free entertainment channel for light {}", id),
        }
        channel
    }

    /// Channel id assigned to `light_id`
    pub fn channel_id(&self, light_id: &str) -> Option<u8> {
        self.shared.channels.read().channel_of(light_id)
    }

    pub fn stream_status(&self) -> StreamStatus {
        if self.shared.active.load(Ordering::SeqCst) {
            StreamStatus::Active
        } else {
            StreamStatus::Inactive
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.stream_status() == StreamStatus::Active
    }

    /// Bound address of the stream listener, once started
    pub fn stream_addr(&self) -> Option<SocketAddr> {
        self.shared.listener.lock().as_ref().map(StreamListener::local_addr)
    }

    /// `GET /clip/v2/resource/entertainment_configuration`
    pub fn list_entertainment_configuration(&self) -> BridgeResponse<EntertainmentConfiguration> {
        let channels = {
            let map = self.shared.channels.read();
            map.lights
                .iter()
                .enumerate()
                .map(|(idx, light_id)| EntertainmentChannel {
                    channel_id: idx as u8,
                    position: Position::default(),
                    members: vec![ChannelMember {
                        service: ResourceRef {
                            rid: light_id.clone(),
                            rtype: "light".to_string(),
                        },
                    }],
                })
                .collect()
        };

        BridgeResponse::ok(vec![EntertainmentConfiguration {
            id: DEFAULT_ENTERTAINMENT_ID.to_string(),
            kind: "entertainment_configuration".to_string(),
            metadata: EntertainmentMetadata {
                name: self.shared.config.entertainment_name.clone(),
            },
            channels,
            status: self.stream_status(),
        }])
    }

    /// `PUT /clip/v2/entertainment_configuration/{id}` with `{"action": ...}`.
    ///
    /// "start" activates streaming and starts the listener if it is not
    /// running. "stop" deactivates streaming; the listener keeps running
    /// but ignores packets until the next start.
    pub fn control_entertainment(
        &self,
        config_id: &str,
        action: &str,
    ) -> BridgeResponse<EntertainmentStatus> {
        let action = match action.parse::<StreamAction>() {
            Ok(action) => action,
            Err(msg) => return BridgeResponse::error(StatusCode::BAD_REQUEST, msg),
        };

        match action {
            StreamAction::Start => {
                if let Err(e) = self.ensure_listener() {
                    tracing::error!("Failed to start entertainment stream listener: {}", e);
                    return BridgeResponse::error(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        format!("failed to start streaming: {}", e),
                    );
                }
                self.shared.active.store(true, Ordering::SeqCst);
                tracing::info!("Entertainment streaming started ({})", config_id);
            }
            StreamAction::Stop => {
                self.shared.active.store(false, Ordering::SeqCst);
                tracing::info!("Entertainment streaming stopped ({})", config_id);
            }
        }

        BridgeResponse::ok(vec![EntertainmentStatus {
            id: config_id.to_string(),
            status: self.stream_status(),
        }])
    }

    /// Feed one datagram through the streaming path as if it had arrived on
    /// the UDP socket. Returns how many lights were updated.
    pub fn ingest_stream_datagram(&self, data: &[u8]) -> usize {
        self.shared.ingest(data)
    }

    /// Deactivate streaming and stop the listener thread
    pub fn shutdown(&self) {
        self.shared.active.store(false, Ordering::SeqCst);
        if let Some(mut listener) = self.shared.listener.lock().take() {
            listener.stop();
        }
    }

    fn ensure_listener(&self) -> Result<()> {
        let mut slot = self.shared.listener.lock();
        if slot.as_ref().is_some_and(StreamListener::is_running) {
            return Ok(());
        }

        let addr = self.shared.config.stream_bind_addr()?;
        let listener = StreamListener::spawn(
            addr,
            self.shared.config.poll_interval(),
            Arc::downgrade(&self.shared),
        )?;
        *slot = Some(listener);
        Ok(())
    }
}

impl BridgeShared {
    fn ingest(&self, data: &[u8]) -> usize {
        if !self.active.load(Ordering::SeqCst) {
            return 0;
        }
        let Some(packet) = StreamPacket::decode(data) else {
            tracing::trace!("Dropped malformed stream datagram ({} bytes)", data.len());
            return 0;
        };

        let mut updated = 0;
        for entry in &packet.entries {
            let light_id = self
                .channels
                .read()
                .light_of(entry.channel_id)
                .map(str::to_string);
            let Some(light_id) = light_id else {
                continue;
            };
            self.store.apply_stream(&light_id, entry);
            updated += 1;
        }
        updated
    }
}

impl DatagramSink for BridgeShared {
    fn handle_datagram(&self, data: &[u8]) {
        self.ingest(data);
    }
}

impl Drop for BridgeShared {
    fn drop(&mut self) {
        if let Some(mut listener) = self.listener.get_mut().take() {
            listener.stop();
        }
    }
}

impl Default for Bridge {
    fn default() -> Self {
        Self::new(BridgeConfig::default())
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("config", &self.shared.config)
            .field("lights", &self.shared.store.len())
            .field("status", &self.stream_status())
            .finish()
    }
}
