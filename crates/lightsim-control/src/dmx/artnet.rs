//! Art-Net output for virtual fixtures
//!
//! Lets a [`DmxFixture`] drive a real Art-Net node (or a visualizer) so the
//! simulated universe can be observed on the wire.

use std::net::{SocketAddr, UdpSocket};
use std::time::{Duration, Instant};

use super::fixture::{DmxFixture, DMX_CHANNELS};
use crate::{error::ControlError, Result};

const ARTNET_ID: &[u8; 8] = b"Art-Net\0";
const OP_DMX: u16 = 0x5000;
const PROTOCOL_VERSION: u16 = 14;
const HEADER_LEN: usize = 18;

/// Art-Net sender for one universe
pub struct ArtNetSender {
    socket: UdpSocket,
    target: SocketAddr,
    universe: u16,
    sequence: u8,
    last_send: Option<Instant>,
    min_interval: Duration,
}

impl ArtNetSender {
    /// Create a sender for `universe` (0-32767) aimed at `target`,
    /// e.g. "255.255.255.255:6454"
    pub fn new(universe: u16, target: &str) -> Result<Self> {
        if universe > 0x7FFF {
            return Err(ControlError::DmxError(format!(
                "Invalid Art-Net universe: {} (must be 0-32767)",
                universe
            )));
        }

        let target: SocketAddr = target.parse().map_err(|e| {
            ControlError::DmxError(format!("Invalid Art-Net target address: {}", e))
        })?;

        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.set_broadcast(true)?;

        tracing::info!("Art-Net sender created for universe {} -> {}", universe, target);

        Ok(Self {
            socket,
            target,
            universe,
            sequence: 0,
            last_send: None,
            min_interval: Duration::from_secs(1) / 44,
        })
    }

    /// Transmit the fixture's universe. Returns `false` when the frame was
    /// skipped by the refresh-rate limit.
    pub fn send_fixture(&mut self, fixture: &DmxFixture) -> Result<bool> {
        let now = Instant::now();
        if let Some(last) = self.last_send {
            if now.duration_since(last) < self.min_interval {
                return Ok(false);
            }
        }

        let packet = self.build_packet(fixture.channels());
        self.socket.send_to(&packet, self.target)?;
        self.sequence = next_sequence(self.sequence);
        self.last_send = Some(now);

        tracing::trace!("Sent Art-Net DMX packet for universe {}", self.universe);
        Ok(true)
    }

    /// Build an ArtDmx packet
    fn build_packet(&self, channels: &[u8; DMX_CHANNELS]) -> Vec<u8> {
        let mut packet = Vec::with_capacity(HEADER_LEN + DMX_CHANNELS);
        packet.extend_from_slice(ARTNET_ID);
        packet.extend_from_slice(&OP_DMX.to_le_bytes());
        packet.extend_from_slice(&PROTOCOL_VERSION.to_be_bytes());
        packet.push(self.sequence);
        packet.push(0); // physical
        packet.extend_from_slice(&self.universe.to_le_bytes());
        packet.extend_from_slice(&(DMX_CHANNELS as u16).to_be_bytes());
        packet.extend_from_slice(channels);
        packet
    }

    /// Current universe
    pub fn universe(&self) -> u16 {
        self.universe
    }

    /// Maximum frames per second
    pub fn set_refresh_rate(&mut self, hz: u32) {
        self.min_interval = Duration::from_secs(1) / hz.max(1);
    }
}

/// Art-Net reserves sequence 0 for "sequencing disabled"
fn next_sequence(current: u8) -> u8 {
    match current.wrapping_add(1) {
        0 => 1,
        n => n,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_structure() {
        let sender = ArtNetSender::new(3, "127.0.0.1:6454").unwrap();
        let mut fixture = DmxFixture::new(1).unwrap();
        fixture.set_channel(1, 200).unwrap();

        let packet = sender.build_packet(fixture.channels());

        assert_eq!(&packet[0..8], b"Art-Net\0");
        assert_eq!(&packet[8..10], &[0x00, 0x50]);
        assert_eq!(&packet[10..12], &[0, 14]);
        assert_eq!(&packet[14..16], &[3, 0]);
        assert_eq!(&packet[16..18], &[0x02, 0x00]);
        assert_eq!(packet[18], 200);
        assert_eq!(packet.len(), HEADER_LEN + DMX_CHANNELS);
    }

    #[test]
    fn test_invalid_target() {
        assert!(ArtNetSender::new(0, "invalid:address").is_err());
        assert!(ArtNetSender::new(0x8000, "127.0.0.1:6454").is_err());
    }

    #[test]
    fn test_sequence_skips_zero() {
        assert_eq!(next_sequence(0), 1);
        assert_eq!(next_sequence(41), 42);
        assert_eq!(next_sequence(255), 1);
    }

    #[test]
    fn test_send_is_rate_limited() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        let target = receiver.local_addr().unwrap().to_string();
        let mut sender = ArtNetSender::new(0, &target).unwrap();
        let fixture = DmxFixture::default();

        assert!(sender.send_fixture(&fixture).unwrap());
        assert!(!sender.send_fixture(&fixture).unwrap());

        let mut buf = [0u8; 600];
        let (len, _) = receiver.recv_from(&mut buf).unwrap();
        assert_eq!(len, HEADER_LEN + DMX_CHANNELS);
        assert_eq!(buf[12], 0);
    }
}
