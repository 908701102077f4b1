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

use rand::RngCore;

use super::controls::ControlsState;
use super::types::LaserArray;

pub mod movement;
pub mod preset;
pub mod pulse;
pub mod strobe;

#[cfg(test)]
mod tests;

pub use movement::{MovementEffect, MovementState};
pub use preset::VisualPresetEffect;
pub use pulse::PulseEffect;
pub use strobe::StrobeEffect;

/// Everything an effect may need besides the lasers and controls.
pub struct EffectContext<'a> {
    /// Seconds since the engine clock started.
    pub time: f64,
    /// Seconds since the previous tick.
    pub delta_time: f64,
    /// The brightness that movement waves are computed against.
    pub base_brightness: u8,
    pub movement: &'a mut MovementState,
    pub rng: &'a mut dyn RngCore,
}

/// One stage of the pipeline. Effects only ever darken what earlier stages lit.
pub trait Effect: Send + Sync {
    fn name(&self) -> &'static str;

    fn is_active(&self, controls: &ControlsState) -> bool;

    fn apply(&self, lasers: &mut LaserArray, controls: &ControlsState, ctx: &mut EffectContext);

    /// Called instead of apply when the effect is inactive.
    fn idle(&self, _ctx: &mut EffectContext) {}
}

/// An ordered list of effects run once per tick.
pub struct EffectPipeline {
    effects: Vec<Box<dyn Effect>>,
}

impl EffectPipeline {
    /// Visual preset, then pulse, then strobe, then movement.
    pub fn standard() -> EffectPipeline {
        EffectPipeline {
            effects: vec![
                Box::new(VisualPresetEffect),
                Box::new(PulseEffect),
                Box::new(StrobeEffect),
                Box::new(MovementEffect),
            ],
        }
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.effects.iter().map(|effect| effect.name()).collect()
    }

    /// Names of the effects that would run with the given controls.
    pub fn active(&self, controls: &ControlsState) -> Vec<&'static str> {
        self.effects
            .iter()
            .filter(|effect| effect.is_active(controls))
            .map(|effect| effect.name())
            .collect()
    }

    pub fn apply(&self, lasers: &mut LaserArray, controls: &ControlsState, ctx: &mut EffectContext) {
        for effect in self.effects.iter() {
            if effect.is_active(controls) {
                effect.apply(lasers, controls, ctx);
            } else {
                effect.idle(ctx);
            }
        }
    }
}
