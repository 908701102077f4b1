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

use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Index, IndexMut};

use serde::Serialize;

use super::error::EngineError;

/// Number of lasers on the top line.
pub const TOP_LASER_COUNT: usize = 14;

/// Number of lasers on the side line.
pub const SIDE_LASER_COUNT: usize = 14;

/// Total number of lasers in the array. Top lasers come first in flat order.
pub const LASER_COUNT: usize = TOP_LASER_COUNT + SIDE_LASER_COUNT;

/// The brightness every effect treats as "fully on".
pub const BASE_BRIGHTNESS: u8 = 255;

/// The highest addressable DMX channel.
pub const MAX_DMX_ADDRESS: u16 = 512;

/// Which line of the array a laser belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Top,
    Side,
}

impl Orientation {
    /// The orientation of the laser at the given flat index.
    pub fn of_index(index: usize) -> Orientation {
        if index < TOP_LASER_COUNT {
            Orientation::Top
        } else {
            Orientation::Side
        }
    }

    /// Number of lasers on this line.
    pub fn count(&self) -> usize {
        match self {
            Orientation::Top => TOP_LASER_COUNT,
            Orientation::Side => SIDE_LASER_COUNT,
        }
    }

    /// The flat index of the first laser on this line.
    pub fn offset(&self) -> usize {
        match self {
            Orientation::Top => 0,
            Orientation::Side => TOP_LASER_COUNT,
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Orientation::Top => write!(f, "top"),
            Orientation::Side => write!(f, "side"),
        }
    }
}

/// A single beam in the array.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Laser {
    pub id: String,
    pub orientation: Orientation,
    pub brightness: u8,
    pub dmx_address: u16,
}

impl Laser {
    /// Returns true if the laser is emitting anything.
    pub fn is_active(&self) -> bool {
        self.brightness > 0
    }

    /// Multiplies the brightness, truncating toward zero.
    pub fn scale(&mut self, multiplier: f64) {
        if self.brightness > 0 {
            self.brightness = (f64::from(self.brightness) * multiplier).clamp(0.0, 255.0) as u8;
        }
    }
}

/// The 28 lasers of the array in flat order: top-0..top-13 then side-0..side-13.
#[derive(Debug, Clone)]
pub struct LaserArray {
    lasers: Vec<Laser>,
}

impl LaserArray {
    /// Creates the array, assigning DMX addresses sequentially from the start address.
    pub fn new(start_address: u16) -> Result<LaserArray, EngineError> {
        let last = usize::from(start_address) + LASER_COUNT - 1;
        if start_address == 0 || last > usize::from(MAX_DMX_ADDRESS) {
            return Err(EngineError::StartAddress {
                start: start_address,
                count: LASER_COUNT,
            });
        }

        let lasers = (0..LASER_COUNT)
            .map(|index| {
                let orientation = Orientation::of_index(index);
                Laser {
                    id: format!("{}-{}", orientation, index - orientation.offset()),
                    orientation,
                    brightness: 0,
                    dmx_address: start_address + index as u16,
                }
            })
            .collect();

        Ok(LaserArray { lasers })
    }

    pub fn len(&self) -> usize {
        self.lasers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lasers.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Laser> {
        self.lasers.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Laser> {
        self.lasers.iter_mut()
    }

    pub fn as_slice(&self) -> &[Laser] {
        &self.lasers
    }

    /// The lasers of one line.
    pub fn line(&self, orientation: Orientation) -> &[Laser] {
        let start = orientation.offset();
        &self.lasers[start..start + orientation.count()]
    }

    /// Sets every laser to zero.
    pub fn clear(&mut self) {
        self.lasers.iter_mut().for_each(|laser| laser.brightness = 0);
    }

    /// Brightness values in flat order.
    pub fn values(&self) -> Vec<u8> {
        self.lasers.iter().map(|laser| laser.brightness).collect()
    }

    /// Number of lasers with a non-zero brightness.
    pub fn active_count(&self) -> usize {
        self.lasers.iter().filter(|laser| laser.is_active()).count()
    }

    /// Laser id to DMX address.
    pub fn dmx_mapping(&self) -> BTreeMap<String, u16> {
        self.lasers
            .iter()
            .map(|laser| (laser.id.clone(), laser.dmx_address))
            .collect()
    }

    /// Moves a laser to a new DMX address. Addresses must stay unique and within 1..512.
    pub fn set_dmx_address(&mut self, id: &str, address: u16) -> Result<(), EngineError> {
        if address == 0 || address > MAX_DMX_ADDRESS {
            return Err(EngineError::AddressOutOfRange {
                id: id.to_string(),
                address,
            });
        }

        if let Some(owner) = self
            .lasers
            .iter()
            .find(|laser| laser.dmx_address == address && laser.id != id)
        {
            return Err(EngineError::AddressInUse {
                address,
                owner: owner.id.clone(),
            });
        }

        match self.lasers.iter_mut().find(|laser| laser.id == id) {
            Some(laser) => {
                laser.dmx_address = address;
                Ok(())
            }
            None => Err(EngineError::UnknownLaser(id.to_string())),
        }
    }
}

impl Index<usize> for LaserArray {
    type Output = Laser;

    fn index(&self, index: usize) -> &Laser {
        &self.lasers[index]
    }
}

impl IndexMut<usize> for LaserArray {
    fn index_mut(&mut self, index: usize) -> &mut Laser {
        &mut self.lasers[index]
    }
}

impl<'a> IntoIterator for &'a LaserArray {
    type Item = &'a Laser;
    type IntoIter = std::slice::Iter<'a, Laser>;

    fn into_iter(self) -> Self::IntoIter {
        self.lasers.iter()
    }
}
