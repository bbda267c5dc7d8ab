use lightsim_control::dmx::{DmxAdapter, DmxFixture, DMX_REFRESH_HZ};
use lightsim_control::hue::stream::{StreamEntry, StreamPacket};
use lightsim_control::hue::{
    BridgeConfig, LightState, StreamAction, StreamStatus, StreamingClient, STREAM_PORT_OFFSET,
};
use lightsim_control::web::BridgeServer;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::UdpSocket;
use std::sync::Arc;
use std::time::{Duration, Instant};

async fn start_server() -> BridgeServer {
    BridgeServer::bind(
        BridgeConfig::new(0)
            .with_stream_port(0)
            .with_poll_interval(Duration::from_millis(10)),
    )
    .await
    .unwrap()
}

fn rgb_mapping(r: u8, g: u8, b: u8) -> HashMap<u16, u8> {
    HashMap::from([(0, r), (1, g), (2, b)])
}

async fn wait_for_light(
    server: &BridgeServer,
    id: &str,
    mut condition: impl FnMut(&LightState) -> bool,
) -> bool {
    let deadline = Instant::now() + Duration::from_secs(3);
    while Instant::now() < deadline {
        if let Some(light) = server.bridge().get_light(id).first() {
            if condition(light) {
                return true;
            }
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    false
}

/// Observers run after the store write, so the fixture can lag the light
async fn wait_for_channel(fixture: &Mutex<DmxFixture>, channel: u16, value: u8) -> bool {
    let deadline = Instant::now() + Duration::from_secs(3);
    while Instant::now() < deadline {
        if fixture.lock().get_channel(channel).ok() == Some(value) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    false
}

/// Start streaming through the resource API and point a client at the
/// listener's bound address
async fn streaming_client(server: &BridgeServer, device_id: &str) -> StreamingClient {
    let mut client =
        StreamingClient::new(&server.local_addr().to_string(), "test-key", device_id).unwrap();
    client.fetch_channel_id().await.unwrap();
    assert_eq!(
        client.control_entertainment(StreamAction::Start).await.unwrap(),
        StreamStatus::Active
    );
    let addr = server.bridge().stream_addr().unwrap();
    client.with_stream_addr(addr)
}

#[tokio::test]
async fn test_streamed_color_reaches_light_and_fixture() {
    let server = start_server().await;
    let fixture = Arc::new(Mutex::new(DmxFixture::new(100).unwrap()));
    server.bridge().register_light("spare", None);
    DmxAdapter::attach(server.bridge(), "par", fixture.clone(), rgb_mapping);

    let mut client = streaming_client(&server, "par").await;
    assert_eq!(client.channel_id(), 1);

    client.stream_rgb(255, 128, 0).unwrap();

    assert!(wait_for_light(&server, "par", |l| l.stream_rgb == Some([255, 128, 0])).await);
    let light = server.bridge().get_light("par").first().cloned().unwrap();
    assert_eq!(light.on, Some(true));
    assert_eq!(light.brightness(), Some(100));

    assert!(wait_for_channel(&fixture, 101, 128).await);
    let dmx = fixture.lock();
    assert_eq!(dmx.get_channel(100).unwrap(), 255);
    assert_eq!(dmx.get_channel(101).unwrap(), 128);
    assert_eq!(dmx.get_channel(102).unwrap(), 0);
    drop(dmx);

    // the other channel was never addressed
    assert_eq!(
        server.bridge().get_light("spare").first(),
        Some(&LightState::new("spare"))
    );

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_default_stream_port_is_api_port_plus_offset() {
    let config = BridgeConfig::new(0).with_poll_interval(Duration::from_millis(10));
    let server = BridgeServer::bind(config).await.unwrap();
    let fixture = Arc::new(Mutex::new(DmxFixture::new(1).unwrap()));
    DmxAdapter::attach(server.bridge(), "lamp", fixture.clone(), rgb_mapping);

    // No stream address override: the client derives it from the API port
    let mut client =
        StreamingClient::new(&server.local_addr().to_string(), "test-key", "lamp").unwrap();
    client.fetch_channel_id().await.unwrap();
    assert_eq!(
        client.control_entertainment(StreamAction::Start).await.unwrap(),
        StreamStatus::Active
    );
    assert_eq!(
        server.bridge().stream_addr().unwrap().port(),
        server.local_addr().port() + STREAM_PORT_OFFSET
    );

    client.stream_rgb(40, 80, 120).unwrap();

    assert!(wait_for_light(&server, "lamp", |l| l.stream_rgb == Some([40, 80, 120])).await);
    assert!(wait_for_channel(&fixture, 3, 120).await);
    assert_eq!(fixture.lock().get_channel(1).unwrap(), 40);
    assert_eq!(fixture.lock().get_channel(2).unwrap(), 80);

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_stream_stops_applying_after_stop() {
    let server = start_server().await;
    server.bridge().register_light("1", None);
    let mut client = streaming_client(&server, "1").await;

    client.stream_rgb(10, 20, 30).unwrap();
    assert!(wait_for_light(&server, "1", |l| l.stream_rgb == Some([10, 20, 30])).await);

    assert_eq!(
        client.control_entertainment(StreamAction::Stop).await.unwrap(),
        StreamStatus::Inactive
    );
    client.stream_rgb(200, 200, 200).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(
        server.bridge().get_light("1").first().unwrap().stream_rgb,
        Some([10, 20, 30])
    );

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_malformed_datagrams_change_nothing() {
    let server = start_server().await;
    server.bridge().register_light("1", None);
    let _client = streaming_client(&server, "1").await;
    let target = server.bridge().stream_addr().unwrap();

    let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
    let valid = StreamPacket::new(0, "default")
        .with_entry(StreamEntry::from_rgb8(0, 255, 0, 0))
        .encode();

    let mut wrong_tag = valid.clone();
    wrong_tag[0] = b'X';
    socket.send_to(&wrong_tag, target).unwrap();
    socket.send_to(&valid[..40], target).unwrap();
    socket.send_to(b"", target).unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(
        server.bridge().get_light("1").first(),
        Some(&LightState::new("1"))
    );

    // the listener is still alive afterwards
    socket.send_to(&valid, target).unwrap();
    assert!(wait_for_light(&server, "1", |l| l.stream_rgb == Some([255, 0, 0])).await);

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_stream_burst_is_rate_limited_at_fixture() {
    let server = start_server().await;
    let fixture = Arc::new(Mutex::new(DmxFixture::new(1).unwrap()));
    let adapter = DmxAdapter::attach(server.bridge(), "1", fixture, rgb_mapping);
    let mut client = streaming_client(&server, "1").await;

    let start = Instant::now();
    for i in 0..200u16 {
        client.stream_rgb((i % 250) as u8, 0, 0).unwrap();
    }
    client.stream_rgb(255, 255, 255).unwrap();
    assert!(wait_for_light(&server, "1", |l| l.stream_rgb == Some([255, 255, 255])).await);
    let elapsed = start.elapsed();

    let bound = elapsed.as_secs_f64() * f64::from(DMX_REFRESH_HZ) + 1.0;
    assert!(adapter.applied_updates() >= 1);
    assert!(
        (adapter.applied_updates() as f64) <= bound,
        "{} updates applied in {:?}",
        adapter.applied_updates(),
        elapsed
    );

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_channel_ids_survive_reregistration() {
    let server = start_server().await;
    let bridge = server.bridge();
    assert_eq!(bridge.register_light("A", None), Some(0));
    assert_eq!(bridge.register_light("B", None), Some(1));

    let fixture = Arc::new(Mutex::new(DmxFixture::new(1).unwrap()));
    DmxAdapter::attach(bridge, "A", fixture, rgb_mapping);
    assert_eq!(bridge.channel_id("A"), Some(0));
    assert_eq!(bridge.channel_id("B"), Some(1));

    let client = streaming_client(&server, "B").await;
    assert_eq!(client.channel_id(), 1);

    server.shutdown().await.unwrap();
}
