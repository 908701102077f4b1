// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

use serde::Serialize;

use crate::lighting::types::LaserArray;

/// A DMX universe is 512 channels.
pub const UNIVERSE_SIZE: usize = 512;

/// Marks the start of a framed packet.
pub const START_BYTE: u8 = 0x7E;

/// Marks the end of a framed packet.
pub const END_BYTE: u8 = 0xE7;

/// A framed packet is the universe plus the start and end bytes.
pub const PACKET_SIZE: usize = UNIVERSE_SIZE + 2;

/// A DMX universe. Channels are addressed 1..512.
#[derive(Clone, PartialEq, Eq)]
pub struct Universe {
    data: [u8; UNIVERSE_SIZE],
}

impl Default for Universe {
    fn default() -> Self {
        Universe::new()
    }
}

impl std::fmt::Debug for Universe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Universe")
            .field("active_channels", &self.active_channels())
            .finish()
    }
}

impl Universe {
    /// Creates a new, dark universe.
    pub fn new() -> Universe {
        Universe {
            data: [0; UNIVERSE_SIZE],
        }
    }

    /// Writes a value to a channel, clamping it to 0..255. Addresses outside
    /// 1..512 are ignored. Returns true if the channel was written.
    pub fn update_channel(&mut self, address: u16, value: i32) -> bool {
        let address = usize::from(address);
        if !(1..=UNIVERSE_SIZE).contains(&address) {
            return false;
        }
        self.data[address - 1] = value.clamp(0, 255) as u8;
        true
    }

    /// Copies every laser's brightness to its address. Returns the number written.
    pub fn update_lasers(&mut self, lasers: &LaserArray) -> usize {
        lasers
            .iter()
            .filter(|laser| self.update_channel(laser.dmx_address, i32::from(laser.brightness)))
            .count()
    }

    /// Reads a channel.
    pub fn channel(&self, address: u16) -> Option<u8> {
        let address = usize::from(address);
        if !(1..=UNIVERSE_SIZE).contains(&address) {
            return None;
        }
        Some(self.data[address - 1])
    }

    /// Sets every channel to zero.
    pub fn clear(&mut self) {
        self.data = [0; UNIVERSE_SIZE];
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// The addresses of every non-zero channel.
    pub fn active_channels(&self) -> Vec<u16> {
        self.data
            .iter()
            .enumerate()
            .filter(|(_, value)| **value > 0)
            .map(|(index, _)| index as u16 + 1)
            .collect()
    }

    /// The universe framed as start byte, 512 channels, end byte.
    pub fn build_packet(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(PACKET_SIZE);
        packet.push(START_BYTE);
        packet.extend_from_slice(&self.data);
        packet.push(END_BYTE);
        packet
    }
}

/// A summary of channel usage for status reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelSummary {
    pub total_channels: usize,
    pub active_channels: usize,
    pub active_channel_list: Vec<u16>,
    pub universe: u32,
    pub start_address: u16,
    pub connected: bool,
}

impl ChannelSummary {
    pub fn new(universe: &Universe, number: u32, start_address: u16, connected: bool) -> Self {
        let active = universe.active_channels();
        ChannelSummary {
            total_channels: UNIVERSE_SIZE,
            active_channels: active.len(),
            active_channel_list: active,
            universe: number,
            start_address,
            connected,
        }
    }
}
