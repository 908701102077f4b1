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

use std::f64::consts::PI;

use super::{Effect, EffectContext};
use crate::lighting::controls::{ControlsState, EffectApplication};
use crate::lighting::tempo::BeatSync;
use crate::lighting::types::{LaserArray, Orientation};

/// Pulse frequency at pulse = 100.
const MAX_PULSE_HZ: f64 = 6.0;

/// Brightness where the alternating top and side pulses cross.
const OVERLAP_OPACITY: f64 = 0.4;

/// Minimum brightness of the smooth pulse.
const PULSE_FLOOR: f64 = 0.2;

fn beat_sync(controls: &ControlsState) -> BeatSync {
    BeatSync::new(controls.beat_sync_enabled, controls.bpm, controls.beat_pulse_rate)
}

/// The beat pulse starts each cycle at its dimmest point.
pub fn beat_multiplier(phase: f64) -> f64 {
    let value = ((phase * 2.0 * PI - PI / 2.0).sin() + 1.0) / 2.0;
    PULSE_FLOOR + value * (1.0 - PULSE_FLOOR)
}

pub fn manual_all_multiplier(theta: f64) -> f64 {
    let value = (theta.sin() + 1.0) / 2.0;
    PULSE_FLOOR + value * (1.0 - PULSE_FLOOR)
}

/// Top and side multipliers for the alternating pulse. Each line gets a half sine,
/// with the side line starting as the top line fades through the overlap opacity.
pub fn alternate_multipliers(theta: f64) -> (f64, f64) {
    let phi = OVERLAP_OPACITY.asin();
    let pulse_duration = PI;
    let start_delay = pulse_duration - phi;
    let total = 2.0 * start_delay;

    let master = theta.rem_euclid(total);
    let top = if master < pulse_duration {
        master.sin()
    } else {
        0.0
    };

    let mut side_phase = master - start_delay;
    if side_phase < 0.0 {
        side_phase += total;
    }
    let side = if side_phase < pulse_duration {
        side_phase.sin()
    } else {
        0.0
    };

    (top, side)
}

/// Smooth brightness modulation, either manual or locked to the beat.
pub struct PulseEffect;

impl Effect for PulseEffect {
    fn name(&self) -> &'static str {
        "pulse"
    }

    fn is_active(&self, controls: &ControlsState) -> bool {
        controls.pulse > 0 || beat_sync(controls).is_active()
    }

    fn apply(&self, lasers: &mut LaserArray, controls: &ControlsState, ctx: &mut EffectContext) {
        let sync = beat_sync(controls);
        if sync.is_active() {
            let (phase, _) = sync.phase(ctx.time);
            let multiplier = beat_multiplier(phase);
            lasers.iter_mut().for_each(|laser| laser.scale(multiplier));
            return;
        }

        if controls.pulse <= 0 {
            return;
        }

        let frequency = (controls.pulse as f64 / 100.0) * MAX_PULSE_HZ;
        let theta = ctx.time * PI * 2.0 * frequency;

        match controls.effect_application {
            EffectApplication::All => {
                let multiplier = manual_all_multiplier(theta);
                lasers.iter_mut().for_each(|laser| laser.scale(multiplier));
            }
            EffectApplication::Alternate => {
                let (top, side) = alternate_multipliers(theta);
                for laser in lasers.iter_mut() {
                    match laser.orientation {
                        Orientation::Top => laser.scale(top),
                        Orientation::Side => laser.scale(side),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_beat_multiplier_range() {
        assert!((beat_multiplier(0.0) - 0.2).abs() < 1e-9);
        assert!((beat_multiplier(0.5) - 1.0).abs() < 1e-9);
        for step in 0..100 {
            let value = beat_multiplier(step as f64 / 100.0);
            assert!((0.2..=1.0 + 1e-9).contains(&value));
        }
    }

    #[test]
    fn test_alternate_multipliers() {
        // At the start the top line is rising while the side line fades out.
        let (top, side) = alternate_multipliers(0.0);
        assert_eq!(top, 0.0);
        assert!((side - OVERLAP_OPACITY).abs() < 1e-9);

        let (top, side) = alternate_multipliers(PI / 2.0);
        assert!((top - 1.0).abs() < 1e-9);
        assert_eq!(side, 0.0);

        // Where the top pulse has faded to the overlap opacity the side one begins.
        let start_delay = PI - OVERLAP_OPACITY.asin();
        let (top, side) = alternate_multipliers(start_delay);
        assert!((top - OVERLAP_OPACITY).abs() < 1e-9);
        assert!(side.abs() < 1e-9);

        let (top, side) = alternate_multipliers(start_delay + PI / 2.0);
        assert_eq!(top, 0.0);
        assert!((side - 1.0).abs() < 1e-9);
    }
}
