use super::bridge::STREAM_PORT_OFFSET;
use super::error::HueError;
use super::models::{
    ApiResponse, EntertainmentActionRequest, EntertainmentConfiguration, EntertainmentStatus,
    LightState, LightUpdate, StreamAction, StreamStatus, Xy, DEFAULT_ENTERTAINMENT_ID,
};
use super::stream::{StreamEntry, StreamPacket};
use crate::color::xy_to_rgb;
use serde::de::DeserializeOwned;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};

/// Port assumed when the bridge address carries none
pub const DEFAULT_API_PORT: u16 = 8000;

/// Header carrying the application key on every resource-API request
pub const APPLICATION_KEY_HEADER: &str = "hue-application-key";

/// Device-side client for one light.
///
/// Sends state changes through the resource API, or in streaming mode
/// encodes entertainment packets and sends them over UDP to the bridge's
/// stream port (API port + 1000 unless overridden). Each client owns its own
/// socket and sequence counter. Errors are returned to the caller; nothing
/// is retried here.
pub struct StreamingClient {
    http: reqwest::Client,
    scheme: String,
    host: String,
    port: u16,
    application_key: String,
    device_id: String,
    config_id: String,
    channel_id: u8,
    stream_addr: Option<SocketAddr>,
    socket: UdpSocket,
    sequence: u8,
}

impl StreamingClient {
    /// `bridge_addr` is "host" or "host:port"
    pub fn new(
        bridge_addr: &str,
        application_key: impl Into<String>,
        device_id: impl Into<String>,
    ) -> Result<Self, HueError> {
        let (host, port) = parse_bridge_addr(bridge_addr)?;

        // Real bridges present self-signed certificates
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .build()?;

        Ok(Self {
            http,
            scheme: "http".to_string(),
            host,
            port,
            application_key: application_key.into(),
            device_id: device_id.into(),
            config_id: DEFAULT_ENTERTAINMENT_ID.to_string(),
            channel_id: 0,
            stream_addr: None,
            socket: UdpSocket::bind("0.0.0.0:0")?,
            sequence: 0,
        })
    }

    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    pub fn with_channel_id(mut self, channel_id: u8) -> Self {
        self.channel_id = channel_id;
        self
    }

    pub fn with_config_id(mut self, config_id: impl Into<String>) -> Self {
        self.config_id = config_id.into();
        self
    }

    /// Send stream packets here instead of API port + 1000
    pub fn with_stream_addr(mut self, addr: SocketAddr) -> Self {
        self.stream_addr = Some(addr);
        self
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn channel_id(&self) -> u8 {
        self.channel_id
    }

    /// Sequence number the next packet will carry
    pub fn sequence(&self) -> u8 {
        self.sequence
    }

    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }

    pub fn light_url(&self) -> String {
        format!("{}/clip/v2/resource/light/{}", self.base_url(), self.device_id)
    }

    /// Change the light through the resource API
    pub async fn set_state(&self, update: &LightUpdate) -> Result<LightState, HueError> {
        let resp = self
            .http
            .put(self.light_url())
            .header(APPLICATION_KEY_HEADER, &self.application_key)
            .json(update)
            .send()
            .await?;

        first_item(read_envelope(resp, "set light state").await?)
    }

    /// Read the light back through the resource API
    pub async fn get_light(&self) -> Result<LightState, HueError> {
        let resp = self
            .http
            .get(self.light_url())
            .header(APPLICATION_KEY_HEADER, &self.application_key)
            .send()
            .await?;

        first_item(read_envelope(resp, "get light").await?)
    }

    /// Look up this device's channel id in the bridge's entertainment
    /// configuration and use it for subsequent packets
    pub async fn fetch_channel_id(&mut self) -> Result<u8, HueError> {
        let url = format!(
            "{}/clip/v2/resource/entertainment_configuration",
            self.base_url()
        );
        let resp = self
            .http
            .get(&url)
            .header(APPLICATION_KEY_HEADER, &self.application_key)
            .send()
            .await?;

        let configs: Vec<EntertainmentConfiguration> =
            read_envelope(resp, "get entertainment configurations").await?;

        let channel_id = configs
            .iter()
            .filter(|cfg| cfg.id == self.config_id)
            .flat_map(|cfg| cfg.channels.iter())
            .find(|ch| ch.light_id() == Some(self.device_id.as_str()))
            .map(|ch| ch.channel_id)
            .ok_or_else(|| HueError::ChannelNotFound(self.device_id.clone()))?;

        self.channel_id = channel_id;
        Ok(channel_id)
    }

    /// Start or stop streaming on the bridge
    pub async fn control_entertainment(
        &self,
        action: StreamAction,
    ) -> Result<StreamStatus, HueError> {
        let url = format!(
            "{}/clip/v2/entertainment_configuration/{}",
            self.base_url(),
            self.config_id
        );
        let body = EntertainmentActionRequest {
            action: match action {
                StreamAction::Start => "start".to_string(),
                StreamAction::Stop => "stop".to_string(),
            },
        };

        let resp = self
            .http
            .put(&url)
            .header(APPLICATION_KEY_HEADER, &self.application_key)
            .json(&body)
            .send()
            .await?;

        let status: EntertainmentStatus =
            first_item(read_envelope(resp, "control entertainment").await?)?;
        Ok(status.status)
    }

    /// Stream a color given as xy + brightness. Missing brightness means 100,
    /// missing xy means (0, 0) which streams black. Returns the RGB sent.
    pub fn stream_state(
        &mut self,
        brightness: Option<i32>,
        xy: Option<Xy>,
    ) -> Result<(u8, u8, u8), HueError> {
        let xy = xy.unwrap_or_default();
        let (r, g, b) = xy_to_rgb(xy.x, xy.y, brightness.unwrap_or(100));
        self.stream_rgb(r, g, b)?;
        Ok((r, g, b))
    }

    /// Stream one 8-bit RGB color for this device's channel
    pub fn stream_rgb(&mut self, r: u8, g: u8, b: u8) -> Result<(), HueError> {
        let packet = StreamPacket::new(self.sequence, self.config_id.clone())
            .with_entry(StreamEntry::from_rgb8(self.channel_id, r, g, b));

        let target = self.resolve_stream_addr()?;
        self.socket.send_to(&packet.encode(), target)?;
        tracing::trace!(
            "Streamed rgb({}, {}, {}) seq {} to {}",
            r,
            g,
            b,
            self.sequence,
            target
        );
        self.sequence = self.sequence.wrapping_add(1);
        Ok(())
    }

    fn resolve_stream_addr(&self) -> Result<SocketAddr, HueError> {
        if let Some(addr) = self.stream_addr {
            return Ok(addr);
        }
        let port = self
            .port
            .checked_add(STREAM_PORT_OFFSET)
            .ok_or_else(|| HueError::InvalidAddress(format!("no stream port for {}", self.port)))?;
        (self.host.as_str(), port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| HueError::InvalidAddress(self.host.clone()))
    }
}

fn parse_bridge_addr(addr: &str) -> Result<(String, u16), HueError> {
    match addr.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() => {
            let port = port
                .parse()
                .map_err(|_| HueError::InvalidAddress(addr.to_string()))?;
            Ok((host.to_string(), port))
        }
        Some(_) => Err(HueError::InvalidAddress(addr.to_string())),
        None if addr.is_empty() => Err(HueError::InvalidAddress(addr.to_string())),
        None => Ok((addr.to_string(), DEFAULT_API_PORT)),
    }
}

/// Unwrap a `{data, errors}` envelope; non-2xx and error entries both fail
async fn read_envelope<T: DeserializeOwned>(
    resp: reqwest::Response,
    what: &str,
) -> Result<Vec<T>, HueError> {
    let status = resp.status();
    let text = resp.text().await?;

    if !status.is_success() {
        return Err(HueError::ApiError(format!(
            "Failed to {}: HTTP {} - {}",
            what, status, text
        )));
    }

    let envelope: ApiResponse<T> = serde_json::from_str(&text)?;
    if let Some(error) = envelope.errors.first() {
        return Err(HueError::ApiError(format!(
            "Failed to {}: {}",
            what, error.description
        )));
    }
    Ok(envelope.data)
}

fn first_item<T>(data: Vec<T>) -> Result<T, HueError> {
    data.into_iter()
        .next()
        .ok_or_else(|| HueError::ApiError("Empty response from bridge".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_parse_bridge_addr() {
        assert_eq!(
            parse_bridge_addr("127.0.0.1:8080").unwrap(),
            ("127.0.0.1".to_string(), 8080)
        );
        assert_eq!(
            parse_bridge_addr("bridge.local").unwrap(),
            ("bridge.local".to_string(), DEFAULT_API_PORT)
        );
        assert!(parse_bridge_addr("host:notaport").is_err());
        assert!(parse_bridge_addr(":80").is_err());
        assert!(parse_bridge_addr("").is_err());
    }

    #[test]
    fn test_light_url() {
        let client = StreamingClient::new("127.0.0.1:8443", "token", "4")
            .unwrap()
            .with_scheme("https");
        assert_eq!(
            client.light_url(),
            "https://127.0.0.1:8443/clip/v2/resource/light/4"
        );
    }

    #[test]
    fn test_stream_port_follows_api_port() {
        let client = StreamingClient::new("127.0.0.1:8000", "token", "1").unwrap();
        assert_eq!(
            client.resolve_stream_addr().unwrap(),
            "127.0.0.1:9000".parse::<SocketAddr>().unwrap()
        );

        let mut client = StreamingClient::new("127.0.0.1:65000", "token", "1").unwrap();
        assert!(matches!(
            client.stream_rgb(1, 2, 3),
            Err(HueError::InvalidAddress(_))
        ));
        assert_eq!(client.sequence(), 0);
    }

    #[test]
    fn test_stream_packets_and_sequence_wrap() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();

        let mut client = StreamingClient::new("127.0.0.1:1", "token", "1")
            .unwrap()
            .with_channel_id(5)
            .with_stream_addr(receiver.local_addr().unwrap());

        let mut buf = [0u8; 128];
        for expected_seq in 0..=256u16 {
            client.stream_rgb(10, 20, 30).unwrap();
            let (len, _) = receiver.recv_from(&mut buf).unwrap();
            let packet = StreamPacket::decode(&buf[..len]).unwrap();
            assert_eq!(packet.sequence, (expected_seq % 256) as u8);
            assert_eq!(packet.config_id, "default");
            assert_eq!(packet.entries.len(), 1);
            assert_eq!(packet.entries[0].channel_id, 5);
            assert_eq!(packet.entries[0].rgb8(), (10, 20, 30));
        }
        assert_eq!(client.sequence(), 1);
    }

    #[test]
    fn test_stream_state_converts_xy() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        let mut client = StreamingClient::new("127.0.0.1", "token", "1")
            .unwrap()
            .with_stream_addr(receiver.local_addr().unwrap());

        let sent = client
            .stream_state(Some(100), Some(Xy::new(0.7, 0.298)))
            .unwrap();
        assert_eq!(sent, xy_to_rgb(0.7, 0.298, 100));

        let black = client.stream_state(None, None).unwrap();
        assert_eq!(black, (0, 0, 0));
    }
}
