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

pub mod controls;
pub mod effects;
pub mod engine;
pub mod error;
pub mod tempo;
pub mod types;

pub use controls::{ControlRegistry, ControlValue, ControlsState, Labeled};
pub use engine::{ControlChange, Engine, State, Stats};
pub use error::{ControlError, EngineError};
pub use types::{Laser, LaserArray, Orientation};
