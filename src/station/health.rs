// Copyright (C) 2025 Paul Hampson
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License version 3 as  published by the
// Free Software Foundation.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE.  See the GNU General Public License for more
// details.
//
// You should have received a copy of the GNU General Public License along with
// this program.  If not, see <https://www.gnu.org/licenses/>.

use core::fmt;
use strum::{EnumIter, IntoEnumIterator, IntoStaticStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, IntoStaticStr)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Sensor {
    #[strum(serialize = "HC-SR04P")]
    Ultrasonic,
    #[strum(serialize = "HX711")]
    LoadCell,
    #[strum(serialize = "VL53L0X")]
    Ranging,
}

impl Sensor {
    pub fn bit(&self) -> u8 {
        match self {
            Sensor::Ultrasonic => HealthMask::ULTRASONIC,
            Sensor::LoadCell => HealthMask::LOAD_CELL,
            Sensor::Ranging => HealthMask::RANGING,
        }
    }

    pub fn part_name(&self) -> &'static str {
        self.into()
    }
}

/// Per-sensor health of one sample.
///
/// | bit | sensor          |
/// |-----|-----------------|
/// | 0   | ultrasonic      |
/// | 1   | load cell       |
/// | 2   | laser ranging   |
///
/// Bits 3..=7 are always clear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HealthMask(u8);

impl HealthMask {
    pub const ULTRASONIC: u8 = 1 << 0;
    pub const LOAD_CELL: u8 = 1 << 1;
    pub const RANGING: u8 = 1 << 2;
    const ALL: u8 = Self::ULTRASONIC | Self::LOAD_CELL | Self::RANGING;

    pub const NONE: HealthMask = HealthMask(0);

    pub fn from_bits(bits: u8) -> Self {
        Self(bits & Self::ALL)
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn with(self, sensor: Sensor, healthy: bool) -> Self {
        if healthy {
            Self(self.0 | sensor.bit())
        } else {
            Self(self.0 & !sensor.bit())
        }
    }

    pub fn is_ok(&self, sensor: Sensor) -> bool {
        self.0 & sensor.bit() != 0
    }

    pub fn all_ok(&self) -> bool {
        self.0 == Self::ALL
    }
}

fn status_label(ok: bool) -> &'static str {
    if ok { "OK" } else { "FAIL" }
}

/// `HC-SR04P:OK HX711:FAIL VL53L0X:OK`
impl fmt::Display for HealthMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, sensor) in Sensor::iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}:{}", sensor.part_name(), status_label(self.is_ok(sensor)))?;
        }
        Ok(())
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for HealthMask {
    fn format(&self, f: defmt::Formatter) {
        for sensor in Sensor::iter() {
            defmt::write!(
                f,
                "{=str}:{=str} ",
                sensor.part_name(),
                status_label(self.is_ok(sensor))
            );
        }
    }
}
