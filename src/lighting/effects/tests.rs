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

use rand::rngs::StdRng;
use rand::SeedableRng;

use super::movement::{pinwheel_path, progress, ProgressKey};
use super::preset::lit_indices;
use super::pulse::{beat_multiplier, manual_all_multiplier};
use super::*;
use crate::lighting::controls::{BeatRate, EffectApplication, Labeled, ScrollDirection, VisualPreset};
use crate::lighting::tempo::BeatSync;
use crate::lighting::types::{Orientation, BASE_BRIGHTNESS, LASER_COUNT};

/// A pipeline with its own lasers, movement state and a seeded rng.
struct Rig {
    pipeline: EffectPipeline,
    lasers: LaserArray,
    movement: MovementState,
    rng: StdRng,
}

impl Rig {
    fn new() -> Rig {
        Rig {
            pipeline: EffectPipeline::standard(),
            lasers: LaserArray::new(1).unwrap(),
            movement: MovementState::new(),
            rng: StdRng::seed_from_u64(7),
        }
    }

    fn render(&mut self, controls: &ControlsState, time: f64, delta_time: f64) -> Vec<u8> {
        self.lasers.clear();
        let mut ctx = EffectContext {
            time,
            delta_time,
            base_brightness: BASE_BRIGHTNESS,
            movement: &mut self.movement,
            rng: &mut self.rng,
        };
        self.pipeline.apply(&mut self.lasers, controls, &mut ctx);
        self.lasers.values()
    }
}

fn lit(values: &[u8]) -> usize {
    values.iter().filter(|value| **value > 0).count()
}

fn lit_at(values: &[u8]) -> Vec<usize> {
    (0..values.len()).filter(|index| values[*index] > 0).collect()
}

fn preset_mask(preset: VisualPreset) -> Vec<bool> {
    let (top, side) = lit_indices(preset);
    (0..LASER_COUNT)
        .map(|index| {
            let orientation = Orientation::of_index(index);
            let local = index - orientation.offset();
            match orientation {
                Orientation::Top => top.contains(&local),
                Orientation::Side => side.contains(&local),
            }
        })
        .collect()
}

#[test]
fn test_pipeline_order() {
    let pipeline = EffectPipeline::standard();
    assert_eq!(
        pipeline.names(),
        vec!["visual_preset", "pulse", "strobe", "movement"]
    );
    assert_eq!(
        pipeline.active(&ControlsState::default()),
        vec!["visual_preset"]
    );
}

#[test]
fn test_grid_lights_everything() {
    let mut rig = Rig::new();
    let values = rig.render(&ControlsState::default(), 0.0, 0.0);
    assert!(values.iter().all(|value| *value == 255));
}

#[test]
fn test_preset_counts() {
    let expected = [
        (VisualPreset::Grid, 28),
        (VisualPreset::Bracket, 12),
        (VisualPreset::LBracket, 20),
        (VisualPreset::SCross, 4),
        (VisualPreset::Cross, 8),
        (VisualPreset::LCross, 12),
        (VisualPreset::SDoubleCross, 6),
        (VisualPreset::DoubleCross, 12),
        (VisualPreset::LDoubleCross, 16),
        (VisualPreset::Cube, 8),
        (VisualPreset::FourCubes, 12),
        (VisualPreset::NineCubes, 16),
    ];
    assert_eq!(expected.len(), VisualPreset::ALL.len());

    let mut rig = Rig::new();
    for (preset, count) in expected {
        let controls = ControlsState {
            visual_preset: preset,
            ..Default::default()
        };
        let values = rig.render(&controls, 1.0, 0.0);
        assert_eq!(lit(&values), count, "{}", preset);
    }
}

#[test]
fn test_cross_lights_center() {
    let mut rig = Rig::new();
    let controls = ControlsState {
        visual_preset: VisualPreset::SCross,
        ..Default::default()
    };
    let values = rig.render(&controls, 0.0, 0.0);
    let lit_ids: Vec<String> = rig
        .lasers
        .iter()
        .zip(values.iter())
        .filter(|(_, value)| **value > 0)
        .map(|(laser, _)| laser.id.clone())
        .collect();
    assert_eq!(lit_ids, vec!["top-6", "top-7", "side-2", "side-3"]);
}

#[test]
fn test_strobe_off_phase_blanks_everything() {
    let mut rig = Rig::new();
    let controls = ControlsState {
        strobe: 50,
        ..Default::default()
    };

    // 10 Hz: on for the first 50ms of each 100ms period.
    assert_eq!(lit(&rig.render(&controls, 0.02, 0.0)), 28);
    assert_eq!(lit(&rig.render(&controls, 0.07, 0.0)), 0);

    let alternate = ControlsState {
        strobe: 50,
        effect_application: EffectApplication::Alternate,
        ..Default::default()
    };
    // Off phase blanks both lines, even with alternate.
    assert_eq!(lit(&rig.render(&alternate, 0.07, 0.0)), 0);
    // Even cycles light only the side line, odd cycles only the top line.
    let values = rig.render(&alternate, 0.02, 0.0);
    assert_eq!(lit(&values[0..14]), 0);
    assert_eq!(lit(&values[14..28]), 14);
    let values = rig.render(&alternate, 0.12, 0.0);
    assert_eq!(lit(&values[0..14]), 14);
    assert_eq!(lit(&values[14..28]), 0);
}

#[test]
fn test_beat_strobe_follows_beat() {
    let mut rig = Rig::new();
    let controls = ControlsState {
        beat_sync_enabled: true,
        bpm: 120,
        beat_strobe_rate: BeatRate::One,
        ..Default::default()
    };
    assert_eq!(lit(&rig.render(&controls, 0.1, 0.0)), 28);
    assert_eq!(lit(&rig.render(&controls, 0.3, 0.0)), 0);
    assert_eq!(lit(&rig.render(&controls, 0.6, 0.0)), 28);
}

#[test]
fn test_loop_progress_is_continuous_and_periodic() {
    let controls = ControlsState {
        laser_move_speed: 30,
        loop_effect: true,
        ..Default::default()
    };
    // Period 22 with 8 lasers: bounce at 14, full cycle 28 at 10 lasers per second.
    let period = 22.0;
    let before = progress(period, 1.4 - 1e-6, &controls);
    let after = progress(period, 1.4 + 1e-6, &controls);
    assert!((before - 14.0).abs() < 1e-3);
    assert!((after - 14.0).abs() < 1e-3);

    for step in 0..50 {
        let time = step as f64 * 0.13;
        let first = progress(period, time, &controls);
        let second = progress(period, time + 2.8, &controls);
        assert!((first - second).abs() < 1e-6, "{} at {}", first, time);
        assert!((0.0..=14.0).contains(&first));
    }
}

#[test]
fn test_build_resets_once_on_wrap() {
    let controls = ControlsState {
        scroll_build_effect: true,
        ..Default::default()
    };
    let mut state = MovementState::new();
    let key = ProgressKey::Direction(ScrollDirection::Pinwheel);

    let resets: Vec<bool> = [5.0, 10.0, 15.0, 2.0]
        .into_iter()
        .map(|p| state.update_progress(key, p, &controls))
        .collect();
    assert_eq!(resets, vec![false, false, false, true]);

    // Bouncing waves never wrap.
    let looping = ControlsState {
        scroll_build_effect: true,
        loop_effect: true,
        ..Default::default()
    };
    let mut state = MovementState::new();
    let resets: Vec<bool> = [5.0, 10.0, 15.0, 2.0]
        .into_iter()
        .map(|p| state.update_progress(key, p, &looping))
        .collect();
    assert_eq!(resets, vec![false; 4]);
}

#[test]
fn test_build_trail_persists() {
    let mut rig = Rig::new();
    let controls = ControlsState {
        scroll_direction: ScrollDirection::LeftToRight,
        scroll_build_effect: true,
        laser_move_speed: 30,
        scroll_laser_count: 2,
        ..Default::default()
    };

    // The wave crosses top-0 early, then moves on.
    rig.render(&controls, 0.0, 0.0);
    let values = rig.render(&controls, 1.0, 0.1);
    assert!(values[0] > 0);
    assert_eq!(values[13], 0);

    // After wrapping the trail clears.
    let values = rig.render(&controls, 2.3, 0.1);
    assert_eq!(values[10], 0);
}

#[test]
fn test_axis_leaves_other_line_dark() {
    let mut rig = Rig::new();
    for direction in [ScrollDirection::LeftToRight, ScrollDirection::RightToLeft] {
        let controls = ControlsState {
            scroll_direction: direction,
            ..Default::default()
        };
        for step in 0..20 {
            let values = rig.render(&controls, step as f64 * 0.05, 0.05);
            assert_eq!(lit(&values[14..28]), 0);
        }
    }
    for direction in [ScrollDirection::TopToBottom, ScrollDirection::BottomToTop] {
        let controls = ControlsState {
            scroll_direction: direction,
            ..Default::default()
        };
        for step in 0..20 {
            let values = rig.render(&controls, step as f64 * 0.05, 0.05);
            assert_eq!(lit(&values[0..14]), 0);
        }
    }
}

#[test]
fn test_reversed_axis_mirrors() {
    let mut rig = Rig::new();
    let forward = ControlsState {
        scroll_direction: ScrollDirection::LeftToRight,
        laser_move_speed: 30,
        ..Default::default()
    };
    let backward = ControlsState {
        scroll_direction: ScrollDirection::RightToLeft,
        ..forward.clone()
    };

    // Progress 5: forward peaks at top-5, backward at top-9.
    let values = rig.render(&forward, 0.5, 0.0);
    assert_eq!(values[5], 255);
    let values = rig.render(&backward, 0.5, 0.0);
    assert_eq!(values[9], 255);
}

#[test]
fn test_masked_lasers_stay_dark() {
    let mut rig = Rig::new();
    let mask = preset_mask(VisualPreset::Cross);

    for direction in ScrollDirection::ALL {
        let controls = ControlsState {
            visual_preset: VisualPreset::Cross,
            scroll_direction: *direction,
            scroll_build_effect: true,
            scroll_phase: 35,
            pulse: 40,
            ..Default::default()
        };
        for step in 0..40 {
            let values = rig.render(&controls, step as f64 / 30.0, 1.0 / 30.0);
            for (index, value) in values.iter().enumerate() {
                if !mask[index] {
                    assert_eq!(*value, 0, "{} lit {}", direction, index);
                }
            }
        }
    }
}

#[test]
fn test_phase_adds_second_wave() {
    let mut rig = Rig::new();
    let single = ControlsState {
        scroll_direction: ScrollDirection::Pinwheel,
        scroll_laser_count: 4,
        laser_move_speed: 30,
        ..Default::default()
    };
    let doubled = ControlsState {
        scroll_phase: 50,
        ..single.clone()
    };

    let one = lit(&rig.render(&single, 1.0, 0.0));
    let two = lit(&rig.render(&doubled, 1.0, 0.0));
    assert!(two > one, "{} vs {}", two, one);
}

#[test]
fn test_diagonal_spreads_across_both_lines() {
    let mut rig = Rig::new();
    let controls = ControlsState {
        scroll_direction: ScrollDirection::ToBottomRight,
        ..Default::default()
    };

    // Progress 10: top-i sits at 2i and side-s at 2s+1, each slot half a laser.
    let values = rig.render(&controls, 0.5, 0.0);
    let mut expected: Vec<usize> = (2..=8).collect();
    expected.extend(15..=22);
    assert_eq!(lit_at(&values), expected);

    assert_eq!(values[5], 255);
    assert_eq!(values[4], values[6]);
    assert_eq!(values[18], values[19]);
    assert!(values[18] > values[4]);
    assert!(values[15] < values[16]);
}

#[test]
fn test_pinwheel_follows_path() {
    let mut rig = Rig::new();
    let controls = ControlsState {
        scroll_direction: ScrollDirection::Pinwheel,
        laser_move_speed: 30,
        ..Default::default()
    };
    let path = pinwheel_path();

    // Progress 5 straddles the top right spoke and the start of the side spoke.
    let values = rig.render(&controls, 0.5, 0.0);
    assert_eq!(lit_at(&values), vec![9, 10, 11, 12, 13, 21, 22]);
    assert_eq!(values[path[5]], 255);
    assert_eq!(values[path[4]], values[path[6]]);
    assert!(values[path[6]] > values[path[7]]);
    assert!(values[path[7]] > values[path[8]]);
}

#[test]
fn test_pinwheel_loop_with_phase() {
    let mut rig = Rig::new();
    let controls = ControlsState {
        scroll_direction: ScrollDirection::Pinwheel,
        laser_move_speed: 84,
        loop_effect: true,
        scroll_phase: 50,
        ..Default::default()
    };
    let path = pinwheel_path();

    // Bounce at 28 of a 56 unit cycle: 21 on the way out, 35 folds back to 21.
    // The second wave trails by half the period of 36, at 3.
    let outward = rig.render(&controls, 0.75, 0.0);
    let inward = rig.render(&controls, 1.25, 0.0);
    assert_eq!(outward, inward);

    let mut expected: Vec<usize> = vec![0, 1, 2];
    expected.extend(7..=13);
    expected.extend(17..=20);
    assert_eq!(lit_at(&outward), expected);
    assert_eq!(outward[path[21]], 255);
    assert_eq!(outward[path[3]], 255);

    let one_way = ControlsState {
        loop_effect: false,
        ..controls.clone()
    };
    assert_ne!(rig.render(&one_way, 1.25, 0.0), inward);
}

#[test]
fn test_center_is_symmetric() {
    let mut rig = Rig::new();
    for direction in [ScrollDirection::OutFromCenter, ScrollDirection::TowardsCenter] {
        let controls = ControlsState {
            scroll_direction: direction,
            ..Default::default()
        };
        for step in 0..15 {
            let values = rig.render(&controls, step as f64 * 0.07, 0.07);
            for i in 0..7 {
                assert_eq!(values[i], values[13 - i]);
                assert_eq!(values[14 + i], values[27 - i]);
                assert_eq!(values[i], values[14 + i]);
            }
        }
    }
}

#[test]
fn test_spot_relights_scroll_laser_count() {
    let mut rig = Rig::new();
    let controls = ControlsState {
        scroll_direction: ScrollDirection::Spot,
        laser_move_speed: 100,
        scroll_laser_count: 5,
        ..Default::default()
    };

    // Nothing is chosen until the first interval passes.
    assert_eq!(lit(&rig.render(&controls, 0.0, 0.0)), 0);

    let mut time = 0.0;
    let mut seen = Vec::new();
    for _ in 0..20 {
        time += 0.1;
        let values = rig.render(&controls, time, 0.1);
        assert_eq!(lit(&values), 5);
        assert_eq!(rig.movement.spot_mask().iter().filter(|lit| **lit).count(), 5);
        seen.push(values);
    }
    // Some refresh picked a different set.
    assert!(seen.windows(2).any(|pair| pair[0] != pair[1]));
}

#[test]
fn test_spot_waits_for_interval() {
    let mut rig = Rig::new();
    let controls = ControlsState {
        scroll_direction: ScrollDirection::Spot,
        laser_move_speed: 1,
        ..Default::default()
    };

    // Speed 1 refreshes every two seconds.
    let mut time = 0.0;
    for _ in 0..19 {
        time += 0.1;
        assert_eq!(lit(&rig.render(&controls, time, 0.1)), 0);
    }
    time += 0.15;
    assert_eq!(lit(&rig.render(&controls, time, 0.15)), 8);
}

#[test]
fn test_direction_none_clears_movement_state() {
    let mut rig = Rig::new();
    let moving = ControlsState {
        scroll_direction: ScrollDirection::LeftToRight,
        scroll_build_effect: true,
        ..Default::default()
    };
    rig.render(&moving, 0.5, 0.1);
    assert!(rig.movement.is_tracking());
    assert!(rig.movement.built().iter().any(|value| *value > 0));

    rig.render(&ControlsState::default(), 0.6, 0.1);
    assert!(!rig.movement.is_tracking());
    assert!(rig.movement.built().iter().all(|value| *value == 0));
}

#[test]
fn test_beat_pulse_matches_manual_pulse() {
    // 120 BPM at rate 1 is a 2 Hz pulse, starting a quarter period behind the manual one.
    let sync = BeatSync::new(true, 120, BeatRate::One);
    for step in 0..100 {
        let time = step as f64 * 0.013;
        let (phase, _) = sync.phase(time);
        let manual = manual_all_multiplier(time * 2.0 * PI * 2.0 - PI / 2.0);
        assert!((beat_multiplier(phase) - manual).abs() < 1e-9);
    }

    // Through the pipeline: pulse 50 is 3 Hz, the same as a 180 BPM beat.
    let mut rig = Rig::new();
    let manual = ControlsState {
        pulse: 50,
        ..Default::default()
    };
    let beat = ControlsState {
        beat_sync_enabled: true,
        bpm: 180,
        beat_pulse_rate: BeatRate::One,
        ..Default::default()
    };
    for step in 0..30 {
        let time = 0.1 + step as f64 * 0.021;
        let expected = rig.render(&manual, time - 1.0 / 12.0, 0.0)[0];
        let actual = rig.render(&beat, time, 0.0)[0];
        assert!((i32::from(expected) - i32::from(actual)).abs() <= 1);
    }
}

#[test]
fn test_alternate_pulse_splits_lines() {
    let mut rig = Rig::new();
    let controls = ControlsState {
        pulse: 50,
        effect_application: EffectApplication::Alternate,
        ..Default::default()
    };
    // 3 Hz: theta = pi / 2 at 1/12 s, the top line is at its peak and the side is dark.
    let values = rig.render(&controls, 1.0 / 12.0, 0.0);
    assert!(values[0] >= 254);
    assert_eq!(values[14], 0);
}
