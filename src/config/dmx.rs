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

use std::time::Duration;

use duration_string::DurationString;
use serde::Deserialize;

use super::error::ConfigError;
use crate::lighting::types::{LASER_COUNT, MAX_DMX_ADDRESS};

pub const DEFAULT_DMX_PORT: &str = "/dev/ttyUSB0";
pub const DEFAULT_DMX_UNIVERSE: u32 = 1;
pub const DEFAULT_DMX_START_ADDRESS: u16 = 1;
pub const DEFAULT_DMX_BAUDRATE: u32 = 115200;
pub const DEFAULT_DMX_TIMEOUT: Duration = Duration::from_secs(1);
pub const DEFAULT_OLA_PORT: u16 = 9010;

/// The highest universe number accepted.
pub const MAX_DMX_UNIVERSE: u32 = 63999;

/// Where DMX frames are sent.
#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DmxOutputKind {
    /// A serial DMX interface that accepts framed packets.
    #[default]
    Serial,
    /// An OLA daemon.
    Ola,
}

/// A YAML representation of the DMX configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Dmx {
    /// Whether DMX output is enabled at all.
    enabled: Option<bool>,

    /// The transport to use.
    output: Option<DmxOutputKind>,

    /// The serial device path.
    port: Option<String>,

    /// The DMX universe.
    universe: Option<u32>,

    /// The address of the first laser. The rest follow sequentially.
    start_address: Option<u16>,

    /// The serial baud rate.
    baudrate: Option<u32>,

    /// How long the output waits for a new frame before resending the last one.
    timeout: Option<String>,

    /// The port of the OLA daemon.
    ola_port: Option<u16>,
}

impl Dmx {
    /// Creates a new DMX configuration.
    pub fn new(
        enabled: Option<bool>,
        output: Option<DmxOutputKind>,
        port: Option<String>,
        universe: Option<u32>,
        start_address: Option<u16>,
    ) -> Dmx {
        Dmx {
            enabled,
            output,
            port,
            universe,
            start_address,
            baudrate: None,
            timeout: None,
            ola_port: None,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled.unwrap_or(false)
    }

    pub fn output(&self) -> DmxOutputKind {
        self.output.unwrap_or_default()
    }

    pub fn port(&self) -> &str {
        self.port.as_deref().unwrap_or(DEFAULT_DMX_PORT)
    }

    pub fn universe(&self) -> u32 {
        self.universe.unwrap_or(DEFAULT_DMX_UNIVERSE)
    }

    pub fn start_address(&self) -> u16 {
        self.start_address.unwrap_or(DEFAULT_DMX_START_ADDRESS)
    }

    pub fn baudrate(&self) -> u32 {
        self.baudrate.unwrap_or(DEFAULT_DMX_BAUDRATE)
    }

    pub fn ola_port(&self) -> u16 {
        self.ola_port.unwrap_or(DEFAULT_OLA_PORT)
    }

    /// Gets the frame refresh timeout.
    pub fn timeout(&self) -> Result<Duration, ConfigError> {
        self.timeout
            .as_ref()
            .map_or(Ok(DEFAULT_DMX_TIMEOUT), |duration| {
                Ok(DurationString::from_string(duration.clone())
                    .map_err(|e| ConfigError::Duration {
                        field: "dmx.timeout",
                        message: e.to_string(),
                    })?
                    .into())
            })
    }

    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        let universe = self.universe();
        if !(1..=MAX_DMX_UNIVERSE).contains(&universe) {
            return Err(ConfigError::OutOfRange {
                field: "dmx.universe",
                value: i64::from(universe),
                min: 1,
                max: i64::from(MAX_DMX_UNIVERSE),
            });
        }

        let start = self.start_address();
        if !(1..=MAX_DMX_ADDRESS).contains(&start) {
            return Err(ConfigError::OutOfRange {
                field: "dmx.start_address",
                value: i64::from(start),
                min: 1,
                max: i64::from(MAX_DMX_ADDRESS),
            });
        }
        if usize::from(start) + LASER_COUNT - 1 > usize::from(MAX_DMX_ADDRESS) {
            return Err(ConfigError::AddressSpace {
                start,
                count: LASER_COUNT,
            });
        }

        if self.baudrate() == 0 {
            return Err(ConfigError::OutOfRange {
                field: "dmx.baudrate",
                value: 0,
                min: 1,
                max: i64::from(u32::MAX),
            });
        }

        let timeout = self.timeout()?;
        if timeout.is_zero() {
            return Err(ConfigError::OutOfRange {
                field: "dmx.timeout",
                value: 0,
                min: 1,
                max: i64::MAX,
            });
        }
        Ok(())
    }
}
