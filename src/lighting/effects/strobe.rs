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

use super::{Effect, EffectContext};
use crate::lighting::controls::{ControlsState, EffectApplication};
use crate::lighting::tempo::BeatSync;
use crate::lighting::types::{LaserArray, Orientation};

/// Strobe frequency at strobe = 100.
const MAX_STROBE_HZ: f64 = 20.0;

fn beat_sync(controls: &ControlsState) -> BeatSync {
    BeatSync::new(
        controls.beat_sync_enabled,
        controls.bpm,
        controls.beat_strobe_rate,
    )
}

/// Square wave state for the manual strobe: (on, cycle).
pub fn manual_state(time: f64, strobe: i64) -> (bool, i64) {
    let frequency = (strobe as f64 / 100.0) * MAX_STROBE_HZ;
    if frequency <= 0.0 {
        return (true, 0);
    }

    let period = 1.0 / frequency;
    let phase = time.rem_euclid(period) / period;
    (phase < 0.5, (time * frequency).floor() as i64)
}

/// Off blanks every laser. On with alternate keeps the side line on even cycles
/// and the top line on odd ones.
pub fn apply_state(lasers: &mut LaserArray, application: EffectApplication, on: bool, cycle: i64) {
    if !on {
        lasers.clear();
        return;
    }

    if application == EffectApplication::Alternate {
        let dark = if cycle.rem_euclid(2) == 0 {
            Orientation::Top
        } else {
            Orientation::Side
        };
        lasers
            .iter_mut()
            .filter(|laser| laser.orientation == dark)
            .for_each(|laser| laser.brightness = 0);
    }
}

/// Hard on/off flashing with a 50% duty cycle.
pub struct StrobeEffect;

impl Effect for StrobeEffect {
    fn name(&self) -> &'static str {
        "strobe"
    }

    fn is_active(&self, controls: &ControlsState) -> bool {
        controls.strobe > 0 || beat_sync(controls).is_active()
    }

    fn apply(&self, lasers: &mut LaserArray, controls: &ControlsState, ctx: &mut EffectContext) {
        let sync = beat_sync(controls);
        let (on, cycle) = if sync.is_active() {
            let (phase, cycle) = sync.phase(ctx.time);
            (phase < 0.5, cycle)
        } else if controls.strobe > 0 {
            manual_state(ctx.time, controls.strobe)
        } else {
            return;
        };

        apply_state(lasers, controls.effect_application, on, cycle);
    }
}
