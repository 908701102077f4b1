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

use serde::Deserialize;

use super::error::ConfigError;

pub const DEFAULT_OSC_LISTEN_PORT: u16 = 8000;
pub const DEFAULT_OSC_SEND_HOST: &str = "127.0.0.1";
pub const DEFAULT_OSC_SEND_PORT: u16 = 8001;
pub const DEFAULT_OSC_ADDRESS_PREFIX: &str = "/laser";

/// A YAML representation of the OSC configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Osc {
    /// Whether the OSC listener runs at all.
    enabled: Option<bool>,

    /// The UDP port to listen on.
    listen_port: Option<u16>,

    /// The host that status messages are sent to.
    send_host: Option<String>,

    /// The port that status messages are sent to.
    send_port: Option<u16>,

    /// The root of the OSC namespace.
    address_prefix: Option<String>,
}

impl Osc {
    /// Creates a new OSC configuration.
    pub fn new(
        enabled: Option<bool>,
        listen_port: Option<u16>,
        send_host: Option<String>,
        send_port: Option<u16>,
        address_prefix: Option<String>,
    ) -> Osc {
        Osc {
            enabled,
            listen_port,
            send_host,
            send_port,
            address_prefix,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled.unwrap_or(false)
    }

    pub fn listen_port(&self) -> u16 {
        self.listen_port.unwrap_or(DEFAULT_OSC_LISTEN_PORT)
    }

    pub fn send_host(&self) -> &str {
        self.send_host.as_deref().unwrap_or(DEFAULT_OSC_SEND_HOST)
    }

    pub fn send_port(&self) -> u16 {
        self.send_port.unwrap_or(DEFAULT_OSC_SEND_PORT)
    }

    /// The address prefix without a trailing slash.
    pub fn address_prefix(&self) -> &str {
        let prefix = self
            .address_prefix
            .as_deref()
            .unwrap_or(DEFAULT_OSC_ADDRESS_PREFIX);
        if prefix.len() > 1 {
            prefix.trim_end_matches('/')
        } else {
            prefix
        }
    }

    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        for (field, port) in [
            ("osc.listen_port", self.listen_port()),
            ("osc.send_port", self.send_port()),
        ] {
            if port == 0 {
                return Err(ConfigError::OutOfRange {
                    field,
                    value: 0,
                    min: 1,
                    max: i64::from(u16::MAX),
                });
            }
        }

        let prefix = self.address_prefix();
        if !prefix.starts_with('/') {
            return Err(ConfigError::AddressPrefix(prefix.to_string()));
        }

        Ok(())
    }
}
