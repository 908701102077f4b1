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

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use config::{Config, File, FileFormat};
use serde::Deserialize;

use crate::lighting::controls::ControlValue;

mod dmx;
mod error;
mod osc;

pub use self::dmx::{Dmx, DmxOutputKind};
pub use self::error::ConfigError;
pub use self::osc::Osc;

pub const DEFAULT_TICK_RATE: u32 = 30;
pub const MAX_TICK_RATE: u32 = 240;

/// The top level simulator configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Simulator {
    /// Pipeline evaluations per second.
    tick_rate: Option<u32>,

    /// Seeds the random source used by the spot effect.
    seed: Option<u64>,

    #[serde(default)]
    dmx: Dmx,

    #[serde(default)]
    osc: Osc,

    /// Control values applied at startup and on reset.
    #[serde(default)]
    controls: BTreeMap<String, ControlValue>,
}

impl Simulator {
    /// Creates a new simulator configuration.
    pub fn new(
        tick_rate: Option<u32>,
        seed: Option<u64>,
        dmx: Dmx,
        osc: Osc,
        controls: BTreeMap<String, ControlValue>,
    ) -> Simulator {
        Simulator {
            tick_rate,
            seed,
            dmx,
            osc,
            controls,
        }
    }

    /// Parse and validate a simulator configuration from a YAML file.
    pub fn deserialize(path: &Path) -> Result<Simulator, ConfigError> {
        let simulator = Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<Simulator>()?;
        simulator.validate()?;
        Ok(simulator)
    }

    /// Parse and validate a simulator configuration from YAML text.
    pub fn from_yaml(yaml: &str) -> Result<Simulator, ConfigError> {
        let simulator = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?
            .try_deserialize::<Simulator>()?;
        simulator.validate()?;
        Ok(simulator)
    }

    /// Checks the range rules that deserialization cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let tick_rate = self.tick_rate();
        if !(1..=MAX_TICK_RATE).contains(&tick_rate) {
            return Err(ConfigError::OutOfRange {
                field: "tick_rate",
                value: i64::from(tick_rate),
                min: 1,
                max: i64::from(MAX_TICK_RATE),
            });
        }

        self.dmx.validate()?;
        self.osc.validate()
    }

    pub fn tick_rate(&self) -> u32 {
        self.tick_rate.unwrap_or(DEFAULT_TICK_RATE)
    }

    /// The time between ticks.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.tick_rate().max(1)))
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    pub fn dmx(&self) -> &Dmx {
        &self.dmx
    }

    pub fn osc(&self) -> &Osc {
        &self.osc
    }

    pub fn controls(&self) -> &BTreeMap<String, ControlValue> {
        &self.controls
    }
}
