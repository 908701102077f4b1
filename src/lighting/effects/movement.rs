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

use std::collections::HashMap;

use rand::seq::index;
use tracing::debug;

use super::{Effect, EffectContext};
use crate::lighting::controls::{ControlsState, ScrollDirection};
use crate::lighting::tempo::BeatSync;
use crate::lighting::types::{
    LaserArray, Orientation, LASER_COUNT, SIDE_LASER_COUNT, TOP_LASER_COUNT,
};

/// Identifies a sweep whose progress is tracked between ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgressKey {
    Axis {
        orientation: Orientation,
        reversed: bool,
    },
    Direction(ScrollDirection),
}

/// Movement state carried from one tick to the next.
#[derive(Debug, Clone)]
pub struct MovementState {
    last_progress: HashMap<ProgressKey, f64>,
    built: [u8; LASER_COUNT],
    spot_mask: [bool; LASER_COUNT],
    spot_accumulator: f64,
    last_key: Option<(ScrollDirection, bool)>,
}

impl Default for MovementState {
    fn default() -> Self {
        MovementState::new()
    }
}

impl MovementState {
    pub fn new() -> MovementState {
        MovementState {
            last_progress: HashMap::new(),
            built: [0; LASER_COUNT],
            spot_mask: [false; LASER_COUNT],
            spot_accumulator: 0.0,
            last_key: None,
        }
    }

    pub fn reset(&mut self) {
        *self = MovementState::new();
    }

    /// True while a direction and build setting are being tracked.
    pub fn is_tracking(&self) -> bool {
        self.last_key.is_some()
    }

    pub fn built(&self) -> &[u8; LASER_COUNT] {
        &self.built
    }

    pub fn spot_mask(&self) -> &[bool; LASER_COUNT] {
        &self.spot_mask
    }

    /// Starts over if the direction or build setting changed since the last tick.
    fn track(&mut self, direction: ScrollDirection, build: bool) {
        let key = Some((direction, build));
        if self.last_key != key {
            self.reset();
            self.last_key = key;
        }
    }

    /// Records the progress of a sweep. A build trail is cleared when the sweep wraps
    /// around, unless the wave bounces. Returns true if the trail was cleared.
    pub fn update_progress(
        &mut self,
        key: ProgressKey,
        progress: f64,
        controls: &ControlsState,
    ) -> bool {
        let last = self.last_progress.get(&key).copied().unwrap_or(0.0);
        let wrapped = progress < last && controls.scroll_build_effect && !controls.loop_effect;
        if wrapped {
            self.built = [0; LASER_COUNT];
        }
        self.last_progress.insert(key, progress);
        wrapped
    }

    fn accumulate(&mut self, mask: &[u8; LASER_COUNT]) {
        for (built, value) in self.built.iter_mut().zip(mask.iter()) {
            *built = (*built).max(*value);
        }
    }
}

/// How far along its sweep the wave is, in laser units.
pub fn progress(period: f64, time: f64, controls: &ControlsState) -> f64 {
    let sync = BeatSync::new(
        controls.beat_sync_enabled,
        controls.bpm,
        controls.beat_laser_move_speed_rate,
    );
    let stepped = sync.is_active()
        && !matches!(
            controls.scroll_direction,
            ScrollDirection::None | ScrollDirection::Spot
        );
    let time = if stepped { sync.quantize(time) } else { time };

    let rate = controls.laser_move_speed as f64 / 3.0;
    if controls.loop_effect {
        let bounce = (period - controls.scroll_laser_count as f64).max(period * 0.5);
        let full = bounce * 2.0;
        let phase = (time * rate).rem_euclid(full);
        if phase < bounce {
            phase
        } else {
            full - phase
        }
    } else {
        (time * rate).rem_euclid(period)
    }
}

/// Brightness of a laser at the given distance from the wave center.
pub fn falloff(distance: f64, controls: &ControlsState, base: u8) -> u8 {
    let half = controls.scroll_laser_count as f64 / 2.0;
    if distance >= half {
        return 0;
    }

    let fade = if controls.scroll_fade == 90 { 1.0 } else { 0.1 };
    let normalized = distance / half;
    (f64::from(base) * (1.0 - normalized.powf(fade * 2.0 + 1.0))).clamp(0.0, 255.0) as u8
}

/// Center to the ends of each line, alternating top and side spokes: top right,
/// side down, top left, side up.
pub fn pinwheel_path() -> Vec<usize> {
    let top_center = TOP_LASER_COUNT / 2;
    let side_center = SIDE_LASER_COUNT / 2;
    let side = Orientation::Side.offset();

    let mut path = Vec::with_capacity(LASER_COUNT);
    path.extend(top_center..TOP_LASER_COUNT);
    path.extend(side + side_center..side + SIDE_LASER_COUNT);
    path.extend((0..top_center).rev());
    path.extend((side..side + side_center).rev());
    path
}

/// The travelling wave strategies.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Wave {
    Axis {
        orientation: Orientation,
        reversed: bool,
    },
    Center {
        inward: bool,
    },
    Diagonal(ScrollDirection),
    Pinwheel,
}

impl Wave {
    fn for_direction(direction: ScrollDirection) -> Option<Wave> {
        match direction {
            ScrollDirection::LeftToRight | ScrollDirection::RightToLeft => Some(Wave::Axis {
                orientation: Orientation::Top,
                reversed: direction == ScrollDirection::RightToLeft,
            }),
            ScrollDirection::TopToBottom | ScrollDirection::BottomToTop => Some(Wave::Axis {
                orientation: Orientation::Side,
                reversed: direction == ScrollDirection::BottomToTop,
            }),
            ScrollDirection::OutFromCenter => Some(Wave::Center { inward: false }),
            ScrollDirection::TowardsCenter => Some(Wave::Center { inward: true }),
            ScrollDirection::ToTopLeft
            | ScrollDirection::ToTopRight
            | ScrollDirection::ToBottomLeft
            | ScrollDirection::ToBottomRight => Some(Wave::Diagonal(direction)),
            ScrollDirection::Pinwheel => Some(Wave::Pinwheel),
            ScrollDirection::None | ScrollDirection::Spot => None,
        }
    }

    fn key(&self) -> ProgressKey {
        match self {
            Wave::Axis {
                orientation,
                reversed,
            } => ProgressKey::Axis {
                orientation: *orientation,
                reversed: *reversed,
            },
            Wave::Center { inward: false } => ProgressKey::Direction(ScrollDirection::OutFromCenter),
            Wave::Center { inward: true } => ProgressKey::Direction(ScrollDirection::TowardsCenter),
            Wave::Diagonal(direction) => ProgressKey::Direction(*direction),
            Wave::Pinwheel => ProgressKey::Direction(ScrollDirection::Pinwheel),
        }
    }

    /// Distance travelled by one sweep, including the tail.
    fn period(&self, count: f64) -> f64 {
        let travel = match self {
            Wave::Axis { orientation, .. } => orientation.count() as f64,
            Wave::Center { .. } => line_center(TOP_LASER_COUNT)
                .max(line_center(SIDE_LASER_COUNT))
                .ceil(),
            Wave::Diagonal(_) => ((TOP_LASER_COUNT.max(SIDE_LASER_COUNT) - 1) * 2 + 1) as f64,
            Wave::Pinwheel => LASER_COUNT as f64,
        };
        travel + count
    }

    /// Each affected laser and its coordinate along the sweep.
    fn coordinates(&self) -> Vec<(usize, f64)> {
        match self {
            Wave::Axis { orientation, .. } => (0..orientation.count())
                .map(|i| (orientation.offset() + i, i as f64))
                .collect(),
            Wave::Center { .. } => (0..LASER_COUNT)
                .map(|index| {
                    let orientation = Orientation::of_index(index);
                    let local = (index - orientation.offset()) as f64;
                    (index, (local - line_center(orientation.count())).abs())
                })
                .collect(),
            Wave::Diagonal(direction) => (0..LASER_COUNT)
                .map(|index| (index, diagonal_coordinate(*direction, index)))
                .collect(),
            Wave::Pinwheel => pinwheel_path()
                .into_iter()
                .enumerate()
                .map(|(step, index)| (index, step as f64))
                .collect(),
        }
    }

    fn position(&self, progress: f64, period: f64) -> f64 {
        match self {
            Wave::Axis {
                orientation,
                reversed: true,
            } => orientation.count() as f64 - progress,
            Wave::Center { inward: true } => period - progress,
            _ => progress,
        }
    }

    /// Diagonal coordinates interleave both lines, so they advance twice as fast.
    fn spread(&self) -> f64 {
        match self {
            Wave::Diagonal(_) => 0.5,
            _ => 1.0,
        }
    }

    fn render(
        &self,
        progress: f64,
        period: f64,
        controls: &ControlsState,
        base: u8,
    ) -> [u8; LASER_COUNT] {
        let mut waves = vec![progress];
        if controls.scroll_phase > 0 {
            let offset = (controls.scroll_phase as f64 / 100.0) * period;
            waves.push((progress - offset + period).rem_euclid(period));
        }

        let mut mask = [0u8; LASER_COUNT];
        for (index, coordinate) in self.coordinates() {
            for wave in waves.iter() {
                let distance = (coordinate - self.position(*wave, period)).abs() * self.spread();
                mask[index] = mask[index].max(falloff(distance, controls, base));
            }
        }
        mask
    }
}

fn line_center(count: usize) -> f64 {
    (count - 1) as f64 / 2.0
}

/// Position of a laser along a corner to corner sweep. Top and side lasers take
/// alternating slots so the wave crosses both lines evenly.
fn diagonal_coordinate(direction: ScrollDirection, index: usize) -> f64 {
    let top_max = TOP_LASER_COUNT - 1;
    let side_max = SIDE_LASER_COUNT - 1;
    let coordinate = match Orientation::of_index(index) {
        Orientation::Top => {
            let i = index;
            match direction {
                ScrollDirection::ToBottomRight => i * 2,
                ScrollDirection::ToTopRight => i * 2 + 1,
                ScrollDirection::ToTopLeft | ScrollDirection::ToBottomLeft => (top_max - i) * 2,
                _ => 0,
            }
        }
        Orientation::Side => {
            let s = index - TOP_LASER_COUNT;
            match direction {
                ScrollDirection::ToBottomRight | ScrollDirection::ToBottomLeft => s * 2 + 1,
                ScrollDirection::ToTopLeft => (side_max - s) * 2 + 1,
                ScrollDirection::ToTopRight => (side_max - s) * 2,
                _ => 0,
            }
        }
    };
    coordinate as f64
}

/// Scales lit lasers by the wave, or by the build trail where it is brighter.
fn apply_mask(
    lasers: &mut LaserArray,
    mask: &[u8; LASER_COUNT],
    built: &[u8; LASER_COUNT],
    build: bool,
    base: u8,
) {
    for (index, laser) in lasers.iter_mut().enumerate() {
        if !laser.is_active() {
            continue;
        }

        let mut multiplier = if base > 0 {
            f64::from(mask[index]) / f64::from(base)
        } else {
            0.0
        };
        if build && base > 0 {
            multiplier = multiplier.max(f64::from(built[index]) / f64::from(base));
        }
        laser.scale(multiplier);
    }
}

/// Spot refresh rate in Hz for a move speed of 1..100.
pub fn spot_frequency(speed: i64) -> f64 {
    0.5 * (1.0 + 29.0 * (speed as f64 - 1.0) / 99.0)
}

/// Scrolling, bouncing, building and random spot movement.
pub struct MovementEffect;

impl MovementEffect {
    fn apply_spot(&self, lasers: &mut LaserArray, controls: &ControlsState, ctx: &mut EffectContext) {
        let interval = 1.0 / spot_frequency(controls.laser_move_speed);
        let state = &mut *ctx.movement;

        state.spot_accumulator += ctx.delta_time;
        if state.spot_accumulator >= interval {
            state.spot_accumulator = state.spot_accumulator.rem_euclid(interval);

            let amount = usize::try_from(controls.scroll_laser_count)
                .unwrap_or(0)
                .min(LASER_COUNT);
            state.spot_mask = [false; LASER_COUNT];
            for index in index::sample(&mut *ctx.rng, LASER_COUNT, amount) {
                state.spot_mask[index] = true;
            }
        }

        for (laser, lit) in lasers.iter_mut().zip(state.spot_mask.iter()) {
            if !lit {
                laser.brightness = 0;
            }
        }
    }

    fn apply_wave(
        &self,
        wave: Wave,
        lasers: &mut LaserArray,
        controls: &ControlsState,
        ctx: &mut EffectContext,
    ) {
        let period = wave.period(controls.scroll_laser_count as f64);
        let progress = progress(period, ctx.time, controls);
        if ctx.movement.update_progress(wave.key(), progress, controls) {
            debug!(direction = %controls.scroll_direction, "Build trail cleared");
        }

        let mask = wave.render(progress, period, controls, ctx.base_brightness);
        if controls.scroll_build_effect {
            ctx.movement.accumulate(&mask);
        }

        apply_mask(
            lasers,
            &mask,
            ctx.movement.built(),
            controls.scroll_build_effect,
            ctx.base_brightness,
        );
    }
}

impl Effect for MovementEffect {
    fn name(&self) -> &'static str {
        "movement"
    }

    fn is_active(&self, controls: &ControlsState) -> bool {
        controls.scroll_direction != ScrollDirection::None
    }

    fn apply(&self, lasers: &mut LaserArray, controls: &ControlsState, ctx: &mut EffectContext) {
        let direction = controls.scroll_direction;
        ctx.movement.track(direction, controls.scroll_build_effect);

        match Wave::for_direction(direction) {
            Some(wave) => self.apply_wave(wave, lasers, controls, ctx),
            None if direction == ScrollDirection::Spot => self.apply_spot(lasers, controls, ctx),
            None => ctx.movement.reset(),
        }
    }

    fn idle(&self, ctx: &mut EffectContext) {
        if ctx.movement.is_tracking() {
            debug!("Movement stopped, clearing state");
            ctx.movement.reset();
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_pinwheel_path() {
        let path = pinwheel_path();
        assert_eq!(path.len(), LASER_COUNT);
        assert_eq!(&path[0..7], &[7, 8, 9, 10, 11, 12, 13]);
        assert_eq!(&path[7..14], &[21, 22, 23, 24, 25, 26, 27]);
        assert_eq!(&path[14..21], &[6, 5, 4, 3, 2, 1, 0]);
        assert_eq!(&path[21..28], &[20, 19, 18, 17, 16, 15, 14]);

        let mut sorted = path.clone();
        sorted.sort();
        assert_eq!(sorted, (0..LASER_COUNT).collect::<Vec<_>>());
    }

    #[test]
    fn test_diagonal_coordinates() {
        use ScrollDirection::{ToBottomLeft, ToBottomRight, ToTopLeft, ToTopRight};

        // top-3 and side-3
        assert_eq!(diagonal_coordinate(ToBottomRight, 3), 6.0);
        assert_eq!(diagonal_coordinate(ToBottomRight, 17), 7.0);
        assert_eq!(diagonal_coordinate(ToTopLeft, 3), 20.0);
        assert_eq!(diagonal_coordinate(ToTopLeft, 17), 21.0);
        assert_eq!(diagonal_coordinate(ToTopRight, 3), 7.0);
        assert_eq!(diagonal_coordinate(ToTopRight, 17), 20.0);
        assert_eq!(diagonal_coordinate(ToBottomLeft, 3), 20.0);
        assert_eq!(diagonal_coordinate(ToBottomLeft, 17), 7.0);
    }

    #[test]
    fn test_periods() {
        let count = 8.0;
        assert_eq!(
            Wave::for_direction(ScrollDirection::LeftToRight)
                .unwrap()
                .period(count),
            22.0
        );
        assert_eq!(
            Wave::for_direction(ScrollDirection::OutFromCenter)
                .unwrap()
                .period(count),
            15.0
        );
        assert_eq!(
            Wave::for_direction(ScrollDirection::ToBottomRight)
                .unwrap()
                .period(count),
            35.0
        );
        assert_eq!(
            Wave::for_direction(ScrollDirection::Pinwheel)
                .unwrap()
                .period(count),
            36.0
        );
        assert!(Wave::for_direction(ScrollDirection::Spot).is_none());
    }

    #[test]
    fn test_falloff() {
        let controls = ControlsState::default();

        // Eight lasers wide, so the wave reaches four lasers either side.
        assert_eq!(falloff(0.0, &controls, 255), 255);
        assert_eq!(falloff(2.0, &controls, 255), 223);
        assert_eq!(falloff(4.0, &controls, 255), 0);
        assert_eq!(falloff(10.0, &controls, 255), 0);

        let sharp = ControlsState {
            scroll_fade: 20,
            ..Default::default()
        };
        // 1 - 0.5^1.2
        assert_eq!(falloff(2.0, &sharp, 255), 144);
    }

    #[test]
    fn test_progress_wraps() {
        let controls = ControlsState {
            laser_move_speed: 30,
            ..Default::default()
        };
        // Ten lasers per second over a period of 22.
        assert!((progress(22.0, 1.0, &controls) - 10.0).abs() < 1e-9);
        assert!((progress(22.0, 2.5, &controls) - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_progress_stepped_by_beat() {
        let controls = ControlsState {
            laser_move_speed: 30,
            beat_sync_enabled: true,
            bpm: 120,
            beat_laser_move_speed_rate: crate::lighting::controls::BeatRate::One,
            scroll_direction: ScrollDirection::LeftToRight,
            ..Default::default()
        };
        // Quantized to the half second beat.
        assert!((progress(22.0, 0.7, &controls) - 5.0).abs() < 1e-9);
        assert!((progress(22.0, 0.99, &controls) - 5.0).abs() < 1e-9);
        assert!((progress(22.0, 1.01, &controls) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_track_resets_on_key_change() {
        let mut state = MovementState::new();
        state.track(ScrollDirection::LeftToRight, true);
        state.built[3] = 200;

        state.track(ScrollDirection::LeftToRight, true);
        assert_eq!(state.built()[3], 200);

        state.track(ScrollDirection::LeftToRight, false);
        assert_eq!(state.built()[3], 0);
        assert!(state.is_tracking());
    }

    #[test]
    fn test_spot_frequency() {
        assert!((spot_frequency(1) - 0.5).abs() < 1e-9);
        assert!((spot_frequency(100) - 15.0).abs() < 1e-9);
    }
}
