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

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::ControlError;

/// A closed set of options with one display label each.
pub trait Labeled: Sized + Copy + Default + PartialEq + 'static {
    /// Every option, in display order.
    const ALL: &'static [Self];

    fn label(&self) -> &'static str;

    /// Exact, case-sensitive label lookup.
    fn from_label(label: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|value| value.label() == label)
    }

    fn labels() -> Vec<&'static str> {
        Self::ALL.iter().map(|value| value.label()).collect()
    }
}

macro_rules! labeled {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $label:literal),+ $(,)? } default $default:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl Default for $name {
            fn default() -> Self {
                $name::$default
            }
        }

        impl Labeled for $name {
            const ALL: &'static [Self] = &[$($name::$variant),+];

            fn label(&self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }
    };
}

labeled! {
    /// Whether pulse and strobe treat both lines together or alternate between them.
    EffectApplication {
        All => "All",
        Alternate => "Alternate",
    } default All
}

labeled! {
    /// The static pattern that decides which lasers may light at all.
    VisualPreset {
        Grid => "Grid",
        Bracket => "Bracket",
        LBracket => "L Bracket",
        SCross => "S Cross",
        Cross => "Cross",
        LCross => "L Cross",
        SDoubleCross => "S Dbl Cross",
        DoubleCross => "Dbl Cross",
        LDoubleCross => "L Dbl Cross",
        Cube => "Cube",
        FourCubes => "4 Cubes",
        NineCubes => "9 Cubes",
    } default Grid
}

labeled! {
    /// How the movement wave travels across the array.
    ScrollDirection {
        None => "None",
        LeftToRight => "L to R",
        RightToLeft => "R to L",
        TopToBottom => "T to B",
        BottomToTop => "B to T",
        ToTopLeft => "To TL",
        ToTopRight => "To TR",
        ToBottomLeft => "To BL",
        ToBottomRight => "To BR",
        OutFromCenter => "Out from Center",
        TowardsCenter => "Towards Center",
        Pinwheel => "Pinwheel",
        Spot => "Spot",
    } default None
}

labeled! {
    /// Beat subdivision for beat synced effects.
    BeatRate {
        Off => "Off",
        OneThird => "1/3",
        OneHalf => "1/2",
        One => "1",
        Four => "4",
    } default Off
}

/// Every control the engine understands.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlsState {
    pub dimmer: i64,
    pub strobe: i64,
    pub pulse: i64,
    pub effect_application: EffectApplication,
    pub visual_preset: VisualPreset,
    pub scroll_direction: ScrollDirection,
    pub laser_move_speed: i64,
    pub scroll_laser_count: i64,
    pub scroll_fade: i64,
    pub scroll_phase: i64,
    pub loop_effect: bool,
    pub scroll_build_effect: bool,
    pub beat_sync_enabled: bool,
    pub bpm: i64,
    pub beat_pulse_rate: BeatRate,
    pub beat_strobe_rate: BeatRate,
    pub beat_laser_move_speed_rate: BeatRate,

    // Stored and reported, not rendered.
    pub shocker_speed: i64,
    pub saber_speed: i64,
    pub beat_shocker_speed_rate: BeatRate,
    pub beat_saber_speed_rate: BeatRate,
    pub show_laser_origins: bool,
}

impl Default for ControlsState {
    fn default() -> Self {
        ControlsState {
            dimmer: 100,
            strobe: 0,
            pulse: 0,
            effect_application: EffectApplication::default(),
            visual_preset: VisualPreset::default(),
            scroll_direction: ScrollDirection::default(),
            laser_move_speed: 60,
            scroll_laser_count: 8,
            scroll_fade: 90,
            scroll_phase: 0,
            loop_effect: false,
            scroll_build_effect: false,
            beat_sync_enabled: false,
            bpm: 140,
            beat_pulse_rate: BeatRate::default(),
            beat_strobe_rate: BeatRate::default(),
            beat_laser_move_speed_rate: BeatRate::default(),
            shocker_speed: 50,
            saber_speed: 50,
            beat_shocker_speed_rate: BeatRate::default(),
            beat_saber_speed_rate: BeatRate::default(),
            show_laser_origins: false,
        }
    }
}

/// A loosely typed control value as it arrives from the outside world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ControlValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl ControlValue {
    /// Parses command line text into the narrowest matching value.
    pub fn infer(raw: &str) -> ControlValue {
        let trimmed = raw.trim();
        match trimmed {
            "true" => ControlValue::Bool(true),
            "false" => ControlValue::Bool(false),
            _ => {
                if let Ok(value) = trimmed.parse::<i64>() {
                    ControlValue::Int(value)
                } else if let Ok(value) = trimmed.parse::<f64>() {
                    ControlValue::Float(value)
                } else {
                    ControlValue::Text(raw.to_string())
                }
            }
        }
    }

    fn as_int(&self) -> Option<i64> {
        match self {
            ControlValue::Int(value) => Some(*value),
            ControlValue::Float(value) if value.is_finite() => Some(value.trunc() as i64),
            ControlValue::Text(text) => match ControlValue::infer(text) {
                ControlValue::Int(value) => Some(value),
                ControlValue::Float(value) if value.is_finite() => Some(value.trunc() as i64),
                _ => None,
            },
            _ => None,
        }
    }

    fn as_bool(&self) -> Option<bool> {
        match self {
            ControlValue::Bool(value) => Some(*value),
            ControlValue::Int(value) => Some(*value != 0),
            ControlValue::Float(value) => Some(*value > 0.5),
            ControlValue::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
        }
    }
}

impl fmt::Display for ControlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlValue::Bool(value) => write!(f, "{}", value),
            ControlValue::Int(value) => write!(f, "{}", value),
            ControlValue::Float(value) => write!(f, "{}", value),
            ControlValue::Text(value) => write!(f, "{}", value),
        }
    }
}

impl From<bool> for ControlValue {
    fn from(value: bool) -> Self {
        ControlValue::Bool(value)
    }
}

impl From<i64> for ControlValue {
    fn from(value: i64) -> Self {
        ControlValue::Int(value)
    }
}

impl From<i32> for ControlValue {
    fn from(value: i32) -> Self {
        ControlValue::Int(i64::from(value))
    }
}

impl From<f64> for ControlValue {
    fn from(value: f64) -> Self {
        ControlValue::Float(value)
    }
}

impl From<&str> for ControlValue {
    fn from(value: &str) -> Self {
        ControlValue::Text(value.to_string())
    }
}

impl From<String> for ControlValue {
    fn from(value: String) -> Self {
        ControlValue::Text(value)
    }
}

/// How a control is stored and validated.
enum Field {
    Int {
        min: i64,
        max: i64,
        get: fn(&ControlsState) -> i64,
        put: fn(&mut ControlsState, i64),
    },
    Bool {
        get: fn(&ControlsState) -> bool,
        put: fn(&mut ControlsState, bool),
    },
    Choice {
        labels: fn() -> Vec<&'static str>,
        get: fn(&ControlsState) -> &'static str,
        put: fn(&mut ControlsState, &str) -> bool,
    },
}

/// A single named control.
pub struct ControlSpec {
    name: &'static str,
    field: Field,
}

impl ControlSpec {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// A human readable description of accepted values.
    pub fn describe(&self) -> String {
        match &self.field {
            Field::Int { min, max, .. } => format!("int {}..{}", min, max),
            Field::Bool { .. } => "bool".to_string(),
            Field::Choice { labels, .. } => format!("one of: {}", labels().join(", ")),
        }
    }

    fn get(&self, controls: &ControlsState) -> ControlValue {
        match &self.field {
            Field::Int { get, .. } => ControlValue::Int(get(controls)),
            Field::Bool { get, .. } => ControlValue::Bool(get(controls)),
            Field::Choice { get, .. } => ControlValue::Text(get(controls).to_string()),
        }
    }

    fn set(&self, controls: &mut ControlsState, value: &ControlValue) -> Result<(), ControlError> {
        let invalid = |expected: &'static str| ControlError::InvalidType {
            name: self.name.to_string(),
            expected,
            value: value.to_string(),
        };

        match &self.field {
            Field::Int { min, max, put, .. } => {
                let number = value.as_int().ok_or_else(|| invalid("an integer"))?;
                if number < *min || number > *max {
                    return Err(ControlError::OutOfRange {
                        name: self.name.to_string(),
                        value: number,
                        min: *min,
                        max: *max,
                    });
                }
                put(controls, number);
            }
            Field::Bool { put, .. } => {
                let flag = value.as_bool().ok_or_else(|| invalid("a boolean"))?;
                put(controls, flag);
            }
            Field::Choice { put, .. } => {
                let ControlValue::Text(label) = value else {
                    return Err(invalid("a label"));
                };
                if !put(controls, label) {
                    return Err(ControlError::InvalidLabel {
                        name: self.name.to_string(),
                        label: label.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}

macro_rules! int {
    ($field:ident, $min:expr, $max:expr) => {
        ControlSpec {
            name: stringify!($field),
            field: Field::Int {
                min: $min,
                max: $max,
                get: |controls: &ControlsState| controls.$field,
                put: |controls: &mut ControlsState, value: i64| controls.$field = value,
            },
        }
    };
}

macro_rules! flag {
    ($field:ident) => {
        ControlSpec {
            name: stringify!($field),
            field: Field::Bool {
                get: |controls: &ControlsState| controls.$field,
                put: |controls: &mut ControlsState, value: bool| controls.$field = value,
            },
        }
    };
}

macro_rules! choice {
    ($field:ident, $ty:ty) => {
        ControlSpec {
            name: stringify!($field),
            field: Field::Choice {
                labels: <$ty>::labels,
                get: |controls: &ControlsState| -> &'static str { controls.$field.label() },
                put: |controls: &mut ControlsState, label: &str| -> bool {
                    match <$ty>::from_label(label) {
                        Some(value) => {
                            controls.$field = value;
                            true
                        }
                        None => false,
                    }
                },
            },
        }
    };
}

/// Name based access to [ControlsState].
pub struct ControlRegistry {
    specs: Vec<ControlSpec>,
    index: HashMap<&'static str, usize>,
}

impl ControlRegistry {
    /// Creates a registry from the given specs. Names must be unique.
    fn new(specs: Vec<ControlSpec>) -> Result<ControlRegistry, ControlError> {
        let mut index = HashMap::with_capacity(specs.len());
        for (position, spec) in specs.iter().enumerate() {
            if index.insert(spec.name, position).is_some() {
                return Err(ControlError::Duplicate(spec.name.to_string()));
            }
        }

        Ok(ControlRegistry { specs, index })
    }

    /// The registry of every control in [ControlsState].
    pub fn standard() -> Result<ControlRegistry, ControlError> {
        ControlRegistry::new(vec![
            int!(dimmer, 0, 100),
            int!(strobe, 0, 100),
            int!(pulse, 0, 100),
            choice!(effect_application, EffectApplication),
            choice!(visual_preset, VisualPreset),
            choice!(scroll_direction, ScrollDirection),
            int!(laser_move_speed, 1, 100),
            int!(scroll_laser_count, 1, 14),
            int!(scroll_fade, 0, 100),
            int!(scroll_phase, 0, 100),
            flag!(loop_effect),
            flag!(scroll_build_effect),
            flag!(beat_sync_enabled),
            int!(bpm, 1, 300),
            choice!(beat_pulse_rate, BeatRate),
            choice!(beat_strobe_rate, BeatRate),
            choice!(beat_laser_move_speed_rate, BeatRate),
            int!(shocker_speed, 1, 100),
            int!(saber_speed, 1, 100),
            choice!(beat_shocker_speed_rate, BeatRate),
            choice!(beat_saber_speed_rate, BeatRate),
            flag!(show_laser_origins),
        ])
    }

    pub fn specs(&self) -> &[ControlSpec] {
        &self.specs
    }

    fn spec(&self, name: &str) -> Result<&ControlSpec, ControlError> {
        self.index
            .get(name)
            .map(|position| &self.specs[*position])
            .ok_or_else(|| ControlError::Unknown(name.to_string()))
    }

    /// Reads a control by name.
    pub fn get(&self, controls: &ControlsState, name: &str) -> Option<ControlValue> {
        self.spec(name).ok().map(|spec| spec.get(controls))
    }

    /// Validates and writes a control by name. On error the state is untouched.
    pub fn set(
        &self,
        controls: &mut ControlsState,
        name: &str,
        value: &ControlValue,
    ) -> Result<(), ControlError> {
        self.spec(name)?.set(controls, value)
    }

    /// Every control as a name to value map.
    pub fn to_map(&self, controls: &ControlsState) -> BTreeMap<String, ControlValue> {
        self.specs
            .iter()
            .map(|spec| (spec.name.to_string(), spec.get(controls)))
            .collect()
    }
}
