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

use std::error::Error;
use std::fs::{File, OpenOptions};
use std::io::Write;

use ola::client::StreamingClientConfig;
use ola::DmxBuffer;
use tracing::info;

use super::universe::Universe;
use crate::config::{self, DmxOutputKind};

/// Something that can carry a universe to hardware.
pub trait DmxOutput: Send {
    /// Sends the whole universe.
    fn send(&mut self, universe: &Universe) -> Result<(), Box<dyn Error>>;

    /// A short description for logs.
    fn describe(&self) -> String;
}

/// Writes framed packets to a serial DMX interface. Line settings such as the
/// baud rate are applied to the device outside of this process.
pub struct SerialOutput {
    port: String,
    file: File,
}

impl SerialOutput {
    pub fn open(port: &str, baudrate: u32) -> Result<SerialOutput, Box<dyn Error>> {
        let file = OpenOptions::new().write(true).open(port)?;
        info!(port, baudrate, "Opened serial DMX output");
        Ok(SerialOutput {
            port: port.to_string(),
            file,
        })
    }
}

impl DmxOutput for SerialOutput {
    fn send(&mut self, universe: &Universe) -> Result<(), Box<dyn Error>> {
        self.file.write_all(&universe.build_packet())?;
        self.file.flush()?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("serial {}", self.port)
    }
}

/// Sends the channel buffer to an OLA daemon.
pub struct OlaOutput {
    client: ola::StreamingClient<std::net::TcpStream>,
    universe: u32,
    buffer: DmxBuffer,
}

impl OlaOutput {
    pub fn connect(universe: u32, port: u16) -> Result<OlaOutput, Box<dyn Error>> {
        let client = ola::connect_with_config(StreamingClientConfig {
            server_port: port,
            ..Default::default()
        })?;
        info!(universe, port, "Connected to OLA");
        Ok(OlaOutput {
            client,
            universe,
            buffer: DmxBuffer::new(),
        })
    }
}

impl DmxOutput for OlaOutput {
    fn send(&mut self, universe: &Universe) -> Result<(), Box<dyn Error>> {
        for (channel, value) in universe.as_slice().iter().enumerate() {
            self.buffer.set_channel(channel, *value);
        }
        self.client.send_dmx(self.universe, &self.buffer)?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("ola universe {}", self.universe)
    }
}

/// Opens the output named by the configuration.
pub fn connect(config: &config::Dmx) -> Result<Box<dyn DmxOutput>, Box<dyn Error>> {
    Ok(match config.output() {
        DmxOutputKind::Serial => Box::new(SerialOutput::open(config.port(), config.baudrate())?),
        DmxOutputKind::Ola => Box::new(OlaOutput::connect(config.universe(), config.ola_port())?),
    })
}

#[cfg(test)]
pub use self::mock::MockOutput;
