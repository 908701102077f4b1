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
use crate::lighting::controls::{ControlsState, VisualPreset};
use crate::lighting::types::{LaserArray, Orientation};

const FULL_LINE: &[usize] = &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13];

/// Lit indices per line for a preset, as (top, side).
pub fn lit_indices(preset: VisualPreset) -> (&'static [usize], &'static [usize]) {
    match preset {
        VisualPreset::Grid => (FULL_LINE, FULL_LINE),
        VisualPreset::Bracket => (&[0, 1, 2, 11, 12, 13], &[0, 1, 2, 11, 12, 13]),
        VisualPreset::LBracket => (
            &[0, 1, 2, 3, 4, 9, 10, 11, 12, 13],
            &[0, 1, 2, 3, 4, 9, 10, 11, 12, 13],
        ),
        VisualPreset::SCross => (&[6, 7], &[2, 3]),
        VisualPreset::Cross => (&[5, 6, 7, 8], &[2, 3, 4, 5]),
        VisualPreset::LCross => (&[4, 5, 6, 7, 8, 9], &[2, 3, 4, 5, 6, 7]),
        VisualPreset::SDoubleCross => (&[6, 7], &[2, 3, 10, 11]),
        VisualPreset::DoubleCross => (&[5, 6, 7, 8], &[2, 3, 4, 5, 8, 9, 10, 11]),
        VisualPreset::LDoubleCross => (
            &[4, 5, 6, 7, 8, 9],
            &[2, 3, 4, 5, 6, 7, 8, 9, 10, 11],
        ),
        VisualPreset::Cube => (&[0, 1, 12, 13], &[0, 1, 12, 13]),
        VisualPreset::FourCubes => (&[0, 1, 6, 7, 12, 13], &[0, 1, 6, 7, 12, 13]),
        VisualPreset::NineCubes => (
            &[0, 1, 4, 5, 8, 9, 12, 13],
            &[0, 1, 4, 5, 8, 9, 12, 13],
        ),
    }
}

/// Lights the static pattern every other effect works from.
pub struct VisualPresetEffect;

impl Effect for VisualPresetEffect {
    fn name(&self) -> &'static str {
        "visual_preset"
    }

    fn is_active(&self, _controls: &ControlsState) -> bool {
        true
    }

    fn apply(&self, lasers: &mut LaserArray, controls: &ControlsState, ctx: &mut EffectContext) {
        lasers.clear();

        let (top, side) = lit_indices(controls.visual_preset);
        for (orientation, indices) in [(Orientation::Top, top), (Orientation::Side, side)] {
            for index in indices {
                lasers[orientation.offset() + index].brightness = ctx.base_brightness;
            }
        }
    }
}
