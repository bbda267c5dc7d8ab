//! Hue Entertainment streaming packet codec.
//!
//! Format (API v2, RGB color space):
//! - 16-byte header:
//!   - 9 bytes: "HueStream" (protocol name)
//!   - 2 bytes: version (0x02, 0x00)
//!   - 1 byte:  sequence number
//!   - 3 bytes: reserved (0x00); the middle byte is the color space, 0 = RGB
//!   - 1 byte:  reserved (0x00)
//! - 36-byte entertainment configuration id (ASCII, zero padded on the right)
//! - N x 7-byte channel entries:
//!   - 1 byte:  channel id
//!   - 6 bytes: R, G, B as 16-bit big endian

/// Protocol tag every packet starts with
pub const PROTOCOL_TAG: &[u8; 9] = b"HueStream";
pub const VERSION_MAJOR: u8 = 2;
pub const VERSION_MINOR: u8 = 0;
pub const HEADER_LEN: usize = 16;
pub const CONFIG_ID_LEN: usize = 36;
/// Header plus configuration id; anything shorter is not a packet
pub const MIN_PACKET_LEN: usize = HEADER_LEN + CONFIG_ID_LEN;
pub const ENTRY_LEN: usize = 7;

/// Widen an 8-bit component by byte replication (`v * 257`), so that
/// `pack_component(v) >> 8 == v` for every `v`.
pub fn pack_component(value: u8) -> u16 {
    u16::from_be_bytes([value, value])
}

/// Narrow a 16-bit component back to 8 bits
pub fn unpack_component(value: u16) -> u8 {
    (value >> 8) as u8
}

/// One light's color inside a packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamEntry {
    pub channel_id: u8,
    pub r: u16,
    pub g: u16,
    pub b: u16,
}

impl StreamEntry {
    /// Entry from 8-bit color
    pub fn from_rgb8(channel_id: u8, r: u8, g: u8, b: u8) -> Self {
        Self {
            channel_id,
            r: pack_component(r),
            g: pack_component(g),
            b: pack_component(b),
        }
    }

    /// Color truncated back to 8 bits
    pub fn rgb8(&self) -> (u8, u8, u8) {
        (
            unpack_component(self.r),
            unpack_component(self.g),
            unpack_component(self.b),
        )
    }

    /// Dominant channel scaled to 0-100. Not a luminance; kept for parity with
    /// bridges that report streamed brightness this way.
    pub fn brightness(&self) -> i32 {
        let max = u32::from(self.r.max(self.g).max(self.b));
        (max * 100 / u32::from(u16::MAX)) as i32
    }
}

/// A decoded or to-be-encoded entertainment frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamPacket {
    pub sequence: u8,
    pub config_id: String,
    pub entries: Vec<StreamEntry>,
}

impl StreamPacket {
    pub fn new(sequence: u8, config_id: impl Into<String>) -> Self {
        Self {
            sequence,
            config_id: config_id.into(),
            entries: Vec::new(),
        }
    }

    pub fn with_entry(mut self, entry: StreamEntry) -> Self {
        self.entries.push(entry);
        self
    }

    /// Serialize to wire format. The configuration id is zero padded or
    /// truncated to 36 bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(MIN_PACKET_LEN + self.entries.len() * ENTRY_LEN);

        // ===== 16-byte header =====
        buffer.extend_from_slice(PROTOCOL_TAG);
        buffer.extend_from_slice(&[VERSION_MAJOR, VERSION_MINOR]);
        buffer.push(self.sequence);
        buffer.extend_from_slice(&[0x00, 0x00, 0x00]);
        buffer.push(0x00);

        // ===== 36-byte configuration id =====
        let mut id = [0u8; CONFIG_ID_LEN];
        let id_bytes = self.config_id.as_bytes();
        let copy_len = id_bytes.len().min(CONFIG_ID_LEN);
        id[..copy_len].copy_from_slice(&id_bytes[..copy_len]);
        buffer.extend_from_slice(&id);

        // ===== channel entries =====
        for entry in &self.entries {
            buffer.push(entry.channel_id);
            buffer.extend_from_slice(&entry.r.to_be_bytes());
            buffer.extend_from_slice(&entry.g.to_be_bytes());
            buffer.extend_from_slice(&entry.b.to_be_bytes());
        }

        buffer
    }

    /// Parse a datagram. Returns `None` for anything that does not start with
    /// the protocol tag or is shorter than header + configuration id. A
    /// trailing partial entry is ignored.
    pub fn decode(data: &[u8]) -> Option<Self> {
        if data.len() < MIN_PACKET_LEN || !data.starts_with(PROTOCOL_TAG) {
            return None;
        }

        let id_field = &data[HEADER_LEN..MIN_PACKET_LEN];
        let id_len = id_field
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(CONFIG_ID_LEN);
        let config_id = String::from_utf8_lossy(&id_field[..id_len]).into_owned();

        let entries = data[MIN_PACKET_LEN..]
            .chunks_exact(ENTRY_LEN)
            .map(|chunk| StreamEntry {
                channel_id: chunk[0],
                r: u16::from_be_bytes([chunk[1], chunk[2]]),
                g: u16::from_be_bytes([chunk[3], chunk[4]]),
                b: u16::from_be_bytes([chunk[5], chunk[6]]),
            })
            .collect();

        Some(Self {
            sequence: data[11],
            config_id,
            entries,
        })
    }
}
