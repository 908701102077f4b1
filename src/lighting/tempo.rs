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

use super::controls::BeatRate;

impl BeatRate {
    /// How many effect cycles fit in one beat.
    pub fn multiplier(&self) -> f64 {
        match self {
            BeatRate::Off => 0.0,
            BeatRate::OneThird => 3.0,
            BeatRate::OneHalf => 2.0,
            BeatRate::One => 1.0,
            BeatRate::Four => 0.25,
        }
    }
}

/// Seconds per beat, or zero for a non-positive tempo.
pub fn beat_interval(bpm: i64) -> f64 {
    if bpm <= 0 {
        return 0.0;
    }
    60.0 / bpm as f64
}

/// Beat synchronization for a single effect.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeatSync {
    enabled: bool,
    bpm: i64,
    rate: BeatRate,
}

impl BeatSync {
    pub fn new(enabled: bool, bpm: i64, rate: BeatRate) -> BeatSync {
        BeatSync { enabled, bpm, rate }
    }

    /// True if the effect should follow the beat instead of its manual speed.
    pub fn is_active(&self) -> bool {
        self.enabled && self.bpm > 0 && self.rate.multiplier() > 0.0
    }

    /// Length of one effect cycle in seconds, if the tempo and rate allow one.
    fn duration(&self) -> Option<f64> {
        let interval = beat_interval(self.bpm);
        let multiplier = self.rate.multiplier();
        if interval <= 0.0 || multiplier <= 0.0 {
            return None;
        }
        Some(interval / multiplier)
    }

    /// Position within the current cycle in [0, 1) and the cycle number.
    ///
    /// The enabled flag is not consulted here, callers check [BeatSync::is_active].
    pub fn phase(&self, time: f64) -> (f64, i64) {
        match self.duration() {
            Some(duration) => (
                time.rem_euclid(duration) / duration,
                (time / duration).floor() as i64,
            ),
            None => (0.0, 0),
        }
    }

    /// The start time of the current cycle, used for stepped movement.
    pub fn quantize(&self, time: f64) -> f64 {
        match self.duration() {
            Some(duration) => (time / duration).floor() * duration,
            None => time,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_beat_interval() {
        assert_eq!(beat_interval(120), 0.5);
        assert_eq!(beat_interval(60), 1.0);
        assert_eq!(beat_interval(0), 0.0);
        assert_eq!(beat_interval(-5), 0.0);
    }

    #[test]
    fn test_is_active() {
        assert!(BeatSync::new(true, 120, BeatRate::One).is_active());
        assert!(!BeatSync::new(false, 120, BeatRate::One).is_active());
        assert!(!BeatSync::new(true, 0, BeatRate::One).is_active());
        assert!(!BeatSync::new(true, 120, BeatRate::Off).is_active());
    }

    #[test]
    fn test_phase() {
        let sync = BeatSync::new(true, 120, BeatRate::One);
        let (phase, cycle) = sync.phase(0.25);
        assert!((phase - 0.5).abs() < 1e-9);
        assert_eq!(cycle, 0);

        let (phase, cycle) = sync.phase(1.125);
        assert!((phase - 0.25).abs() < 1e-9);
        assert_eq!(cycle, 2);

        // 1/2 rate doubles the cycle count.
        let sync = BeatSync::new(true, 120, BeatRate::OneHalf);
        assert_eq!(sync.phase(1.125).1, 4);

        // 4 stretches a cycle over four beats.
        let sync = BeatSync::new(true, 120, BeatRate::Four);
        let (phase, cycle) = sync.phase(1.0);
        assert!((phase - 0.5).abs() < 1e-9);
        assert_eq!(cycle, 0);

        assert_eq!(BeatSync::new(true, 120, BeatRate::Off).phase(3.3), (0.0, 0));
    }

    #[test]
    fn test_quantize() {
        let sync = BeatSync::new(true, 120, BeatRate::One);
        assert!((sync.quantize(1.3) - 1.0).abs() < 1e-9);
        assert!((sync.quantize(1.6) - 1.5).abs() < 1e-9);
        assert_eq!(sync.quantize(0.0), 0.0);

        let off = BeatSync::new(true, 120, BeatRate::Off);
        assert_eq!(off.quantize(1.3), 1.3);
    }
}
