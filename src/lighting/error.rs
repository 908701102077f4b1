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

/// Errors raised when reading or writing a named control.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ControlError {
    #[error("Unknown control: {0}")]
    Unknown(String),

    #[error("Control {0} is registered more than once")]
    Duplicate(String),

    #[error("{name} must be between {min} and {max}, got {value}")]
    OutOfRange {
        name: String,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("{name} expects {expected}, got {value}")]
    InvalidType {
        name: String,
        expected: &'static str,
        value: String,
    },

    #[error("{name} has no option named '{label}'")]
    InvalidLabel { name: String, label: String },
}

/// Errors raised by the engine outside of control validation.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Control(#[from] ControlError),

    #[error("DMX address {address} for {id} must be between 1 and 512")]
    AddressOutOfRange { id: String, address: u16 },

    #[error("DMX address {address} is already assigned to {owner}")]
    AddressInUse { address: u16, owner: String },

    #[error("Unknown laser: {0}")]
    UnknownLaser(String),

    #[error("Start address {start} cannot fit {count} lasers below channel 512")]
    StartAddress { start: u16, count: usize },
}
