//! Virtual DMX512 fixture

use std::collections::HashMap;

use crate::{error::ControlError, Result};

/// Channels in one DMX512 universe
pub const DMX_CHANNELS: usize = 512;

/// Start code + channel data
pub const DMX_FRAME_LEN: usize = DMX_CHANNELS + 1;

/// DMX512 null start code
pub const START_CODE: u8 = 0x00;

/// In-memory model of a DMX512 universe driven by a fixture with an
/// assignable start address.
///
/// Channels are 1-indexed as on the wire; index 0 of [`channels`] is DMX
/// channel 1. Out-of-range writes are rejected, never clamped.
///
/// [`channels`]: DmxFixture::channels
#[derive(Debug, Clone)]
pub struct DmxFixture {
    address: u16,
    channels: [u8; DMX_CHANNELS],
}

impl Default for DmxFixture {
    fn default() -> Self {
        Self {
            address: 1,
            channels: [0u8; DMX_CHANNELS],
        }
    }
}

impl DmxFixture {
    /// Create a fixture at the given start address (1-512)
    pub fn new(address: u16) -> Result<Self> {
        let mut fixture = Self::default();
        fixture.set_address(address)?;
        Ok(fixture)
    }

    /// Start address of this fixture
    pub fn address(&self) -> u16 {
        self.address
    }

    /// Configure the DMX start address
    pub fn set_address(&mut self, address: u16) -> Result<()> {
        if !(1..=DMX_CHANNELS as u16).contains(&address) {
            return Err(ControlError::AddressOutOfRange(address));
        }
        self.address = address;
        Ok(())
    }

    /// Set an absolute DMX channel (1-512)
    pub fn set_channel(&mut self, channel: u16, value: u8) -> Result<()> {
        let index = Self::index(u32::from(channel))?;
        self.channels[index] = value;
        Ok(())
    }

    /// Set several absolute channels. Every channel is validated before any
    /// value is written.
    pub fn set_channels(&mut self, values: &HashMap<u16, u8>) -> Result<()> {
        let resolved = values
            .iter()
            .map(|(&channel, &value)| Ok((Self::index(u32::from(channel))?, value)))
            .collect::<Result<Vec<_>>>()?;

        for (index, value) in resolved {
            self.channels[index] = value;
        }
        Ok(())
    }

    /// Read an absolute DMX channel (1-512)
    pub fn get_channel(&self, channel: u16) -> Result<u8> {
        let index = Self::index(u32::from(channel))?;
        Ok(self.channels[index])
    }

    /// Set a channel relative to the start address. Offset 0 is the start
    /// address itself.
    pub fn set_relative_channel(&mut self, offset: u16, value: u8) -> Result<()> {
        let index = Self::index(u32::from(self.address) + u32::from(offset))?;
        self.channels[index] = value;
        Ok(())
    }

    /// Set several relative channels, validating all offsets first.
    pub fn set_relative_channels(&mut self, values: &HashMap<u16, u8>) -> Result<()> {
        let base = u32::from(self.address);
        let resolved = values
            .iter()
            .map(|(&offset, &value)| Ok((Self::index(base + u32::from(offset))?, value)))
            .collect::<Result<Vec<_>>>()?;

        for (index, value) in resolved {
            self.channels[index] = value;
        }
        Ok(())
    }

    /// Raw channel values, index 0 = DMX channel 1
    pub fn channels(&self) -> &[u8; DMX_CHANNELS] {
        &self.channels
    }

    /// Wire-ready DMX512 frame: start code followed by all 512 channels
    pub fn get_frame(&self) -> Vec<u8> {
        let mut frame = Vec::with_capacity(DMX_FRAME_LEN);
        frame.push(START_CODE);
        frame.extend_from_slice(&self.channels);
        frame
    }

    /// Log the current frame (debug level)
    pub fn dump_frame(&self) {
        tracing::debug!(
            address = self.address,
            frame = ?self.get_frame(),
            "DMX frame"
        );
    }

    fn index(channel: u32) -> Result<usize> {
        if !(1..=DMX_CHANNELS as u32).contains(&channel) {
            return Err(ControlError::ChannelOutOfRange(channel));
        }
        Ok(channel as usize - 1)
    }
}
