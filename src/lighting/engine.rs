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
use std::time::Instant;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::controls::{ControlRegistry, ControlValue, ControlsState};
use super::effects::{EffectContext, EffectPipeline, MovementState};
use super::error::{ControlError, EngineError};
use super::types::{Laser, LaserArray, BASE_BRIGHTNESS};
use crate::config;
use crate::dmx::universe::{ChannelSummary, Universe};

/// How many control changes a slow subscriber may fall behind by.
const CHANGE_CAPACITY: usize = 64;

/// A control write that was accepted, carrying the value as stored.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlChange {
    pub name: String,
    pub value: ControlValue,
}

/// Aggregate figures reported with every snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stats {
    pub total_lasers: usize,
    pub active_lasers: usize,
    pub max_brightness: u8,
    pub avg_brightness: f64,
    pub dmx_connected: bool,
    pub osc_running: bool,
    pub uptime: f64,
    pub ticks: u64,
}

/// A point in time copy of the engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct State {
    pub controls: BTreeMap<String, ControlValue>,
    pub lasers: Vec<Laser>,
    pub stats: Stats,
}

/// Owns the controls, the lasers and everything needed to render them.
pub struct Engine {
    registry: ControlRegistry,
    controls: ControlsState,
    initial_controls: BTreeMap<String, ControlValue>,
    lasers: LaserArray,
    pipeline: EffectPipeline,
    movement: MovementState,
    rng: StdRng,
    seed: Option<u64>,
    universe: Universe,
    universe_number: u32,
    start_address: u16,
    started: Instant,
    last_time: Option<f64>,
    ticks: u64,
    dmx_connected: bool,
    osc_running: bool,
    changes: broadcast::Sender<ControlChange>,
}

impl Engine {
    /// Creates an engine from the simulator configuration. Initial control values
    /// that fail validation are logged and skipped.
    pub fn new(config: &config::Simulator) -> Result<Engine, EngineError> {
        let start_address = config.dmx().start_address();
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        let mut engine = Engine {
            registry: ControlRegistry::standard()?,
            controls: ControlsState::default(),
            initial_controls: config.controls().clone(),
            lasers: LaserArray::new(start_address)?,
            pipeline: EffectPipeline::standard(),
            movement: MovementState::new(),
            rng: new_rng(config.seed()),
            seed: config.seed(),
            universe: Universe::new(),
            universe_number: config.dmx().universe(),
            start_address,
            started: Instant::now(),
            last_time: None,
            ticks: 0,
            dmx_connected: false,
            osc_running: false,
            changes,
        };
        engine.apply_initial_controls();

        info!(
            lasers = engine.lasers.len(),
            start_address,
            effects = ?engine.pipeline.names(),
            "Engine ready"
        );
        Ok(engine)
    }

    fn apply_initial_controls(&mut self) {
        for (name, value) in self.initial_controls.iter() {
            if let Err(e) = self.registry.set(&mut self.controls, name, value) {
                warn!(control = name.as_str(), err = e.to_string(), "Ignoring initial control");
            }
        }
    }

    /// Renders one frame. With no time given, the wall time since the engine was
    /// created (or last reset) is used.
    pub fn tick(&mut self, time: Option<f64>) {
        let time = time.unwrap_or_else(|| self.started.elapsed().as_secs_f64());
        let delta_time = self
            .last_time
            .map_or(0.0, |last| (time - last).max(0.0));
        self.last_time = Some(time);

        self.lasers.clear();
        let mut ctx = EffectContext {
            time,
            delta_time,
            base_brightness: BASE_BRIGHTNESS,
            movement: &mut self.movement,
            rng: &mut self.rng,
        };
        self.pipeline.apply(&mut self.lasers, &self.controls, &mut ctx);
        self.apply_dimmer();

        self.universe.clear();
        self.universe.update_lasers(&self.lasers);
        self.ticks += 1;
    }

    fn apply_dimmer(&mut self) {
        let dimmer = self.controls.dimmer;
        if dimmer >= 100 {
            return;
        }
        if dimmer <= 0 {
            self.lasers.clear();
            return;
        }

        let multiplier = dimmer as f64 / 100.0;
        for laser in self.lasers.iter_mut() {
            laser.scale(multiplier);
        }
    }

    /// Validates and writes a control. On error the current value is kept. Accepted
    /// writes are published to every change subscriber.
    pub fn set_control(&mut self, name: &str, value: &ControlValue) -> Result<(), ControlError> {
        self.registry.set(&mut self.controls, name, value)?;
        debug!(control = name, value = value.to_string(), "Control updated");

        if let Some(value) = self.registry.get(&self.controls, name) {
            // Having no subscribers is not an error.
            let _ = self.changes.send(ControlChange {
                name: name.to_string(),
                value,
            });
        }
        Ok(())
    }

    /// A receiver for every control write accepted from now on.
    pub fn subscribe_changes(&self) -> broadcast::Receiver<ControlChange> {
        self.changes.subscribe()
    }

    pub fn get_control(&self, name: &str) -> Option<ControlValue> {
        self.registry.get(&self.controls, name)
    }

    /// Applies every value in the map, returning the ones that were rejected.
    pub fn update_controls(
        &mut self,
        values: &BTreeMap<String, ControlValue>,
    ) -> Vec<(String, ControlError)> {
        values
            .iter()
            .filter_map(|(name, value)| {
                self.set_control(name, value)
                    .err()
                    .map(|e| (name.clone(), e))
            })
            .collect()
    }

    pub fn controls(&self) -> &ControlsState {
        &self.controls
    }

    pub fn lasers(&self) -> &LaserArray {
        &self.lasers
    }

    /// Brightness figures cover lit lasers only.
    pub fn stats(&self) -> Stats {
        let lit: Vec<u8> = self
            .lasers
            .values()
            .into_iter()
            .filter(|value| *value > 0)
            .collect();
        let total: u32 = lit.iter().map(|value| u32::from(*value)).sum();
        Stats {
            total_lasers: self.lasers.len(),
            active_lasers: lit.len(),
            max_brightness: lit.iter().copied().max().unwrap_or(0),
            avg_brightness: if lit.is_empty() {
                0.0
            } else {
                f64::from(total) / lit.len() as f64
            },
            dmx_connected: self.dmx_connected,
            osc_running: self.osc_running,
            uptime: self.started.elapsed().as_secs_f64(),
            ticks: self.ticks,
        }
    }

    pub fn snapshot(&self) -> State {
        State {
            controls: self.registry.to_map(&self.controls),
            lasers: self.lasers.as_slice().to_vec(),
            stats: self.stats(),
        }
    }

    /// The universe as of the last tick.
    pub fn universe(&self) -> &Universe {
        &self.universe
    }

    /// The framed packet for the last tick.
    pub fn dmx_packet(&self) -> Vec<u8> {
        self.universe.build_packet()
    }

    pub fn dmx_summary(&self) -> ChannelSummary {
        ChannelSummary::new(
            &self.universe,
            self.universe_number,
            self.start_address,
            self.dmx_connected,
        )
    }

    pub fn dmx_mapping(&self) -> BTreeMap<String, u16> {
        self.lasers.dmx_mapping()
    }

    /// Moves a laser to a new address. Takes effect on the next tick.
    pub fn set_dmx_address(&mut self, id: &str, address: u16) -> Result<(), EngineError> {
        self.lasers.set_dmx_address(id, address)?;
        info!(laser = id, address, "DMX address updated");
        Ok(())
    }

    /// Brightness per laser in flat order.
    pub fn dmx_values(&self) -> Vec<u8> {
        self.lasers.values()
    }

    /// Returns controls to their defaults (plus the configured initial values),
    /// darkens the array and restarts the clock.
    pub fn reset(&mut self) {
        self.controls = ControlsState::default();
        self.apply_initial_controls();
        self.lasers.clear();
        self.universe.clear();
        self.movement.reset();
        if let Some(seed) = self.seed {
            self.rng = StdRng::seed_from_u64(seed);
        }
        self.started = Instant::now();
        self.last_time = None;
        self.ticks = 0;
        info!("Engine reset");
    }

    /// Replaces the random source with a seeded one.
    pub fn reseed(&mut self, seed: u64) {
        self.seed = Some(seed);
        self.rng = StdRng::seed_from_u64(seed);
    }

    pub fn set_output_status(&mut self, dmx_connected: bool, osc_running: bool) {
        self.dmx_connected = dmx_connected;
        self.osc_running = osc_running;
    }
}

fn new_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}
