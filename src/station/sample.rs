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

use crate::station::health::{HealthMask, Sensor};
use chrono::{DateTime, NaiveDateTime};

/// Reported when the ultrasonic echo timed out
pub const ULTRASONIC_FAILED_CM: f32 = -1.0;
/// Reported when the load cell produced no reading
pub const WEIGHT_FAILED_G: f32 = f32::NAN;
/// Reported when the laser ranger produced no reading
pub const LASER_FAILED_MM: u16 = 0;
/// Beyond the rated range of the laser ranger
pub const LASER_MAX_VALID_MM: u16 = 8000;

/// Raw outcome of one pass over the three sensors, failures already replaced
/// by their sentinels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReadings {
    pub ultrasonic_distance_cm: f32,
    pub laser_distance_mm: u16,
    pub weight_g: f32,
}

impl SensorReadings {
    pub fn health(&self) -> HealthMask {
        HealthMask::NONE
            .with(Sensor::Ultrasonic, self.ultrasonic_distance_cm >= 0.0)
            .with(Sensor::LoadCell, self.weight_g.is_finite())
            .with(
                Sensor::Ranging,
                self.laser_distance_mm > LASER_FAILED_MM
                    && self.laser_distance_mm < LASER_MAX_VALID_MM,
            )
    }
}

/// One complete station measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnifiedSample {
    readings: SensorReadings,
    timestamp: NaiveDateTime,
    health: HealthMask,
    battery_voltage: f32,
    temperature_c: i8,
}

impl UnifiedSample {
    /// Stored size of a sample, see [`UnifiedSample::to_bytes`].
    pub const ENCODED_LEN: usize = 24;

    pub fn new(
        readings: SensorReadings,
        timestamp: NaiveDateTime,
        battery_voltage: f32,
        temperature_c: i8,
    ) -> Self {
        Self {
            readings,
            timestamp,
            health: readings.health(),
            battery_voltage,
            temperature_c,
        }
    }

    pub fn ultrasonic_distance_cm(&self) -> f32 {
        self.readings.ultrasonic_distance_cm
    }

    pub fn laser_distance_mm(&self) -> u16 {
        self.readings.laser_distance_mm
    }

    pub fn weight_g(&self) -> f32 {
        self.readings.weight_g
    }

    pub fn readings(&self) -> SensorReadings {
        self.readings
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    pub fn health(&self) -> HealthMask {
        self.health
    }

    pub fn battery_voltage(&self) -> f32 {
        self.battery_voltage
    }

    pub fn temperature_c(&self) -> i8 {
        self.temperature_c
    }

    /// Little endian, fixed layout:
    ///
    /// | offset | size | field                                  |
    /// |--------|------|----------------------------------------|
    /// | 0      | 4    | ultrasonic distance, cm (f32)          |
    /// | 4      | 2    | laser distance, mm (u16)               |
    /// | 6      | 4    | weight, g (f32)                        |
    /// | 10     | 8    | timestamp, ms since Unix epoch (i64)   |
    /// | 18     | 1    | health bits                            |
    /// | 19     | 4    | battery voltage (f32)                  |
    /// | 23     | 1    | temperature, °C (i8)                   |
    pub fn to_bytes(&self) -> [u8; Self::ENCODED_LEN] {
        let mut bytes = [0u8; Self::ENCODED_LEN];
        bytes[0..4].copy_from_slice(&self.readings.ultrasonic_distance_cm.to_le_bytes());
        bytes[4..6].copy_from_slice(&self.readings.laser_distance_mm.to_le_bytes());
        bytes[6..10].copy_from_slice(&self.readings.weight_g.to_le_bytes());
        bytes[10..18].copy_from_slice(&self.timestamp.and_utc().timestamp_millis().to_le_bytes());
        bytes[18] = self.health.bits();
        bytes[19..23].copy_from_slice(&self.battery_voltage.to_le_bytes());
        bytes[23] = self.temperature_c as u8;
        bytes
    }

    /// `None` if the timestamp is out of range.
    pub fn from_bytes(bytes: &[u8; Self::ENCODED_LEN]) -> Option<Self> {
        let f32_at = |at: usize| f32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
        let mut millis = [0u8; 8];
        millis.copy_from_slice(&bytes[10..18]);
        let timestamp = DateTime::from_timestamp_millis(i64::from_le_bytes(millis))?.naive_utc();

        Some(Self {
            readings: SensorReadings {
                ultrasonic_distance_cm: f32_at(0),
                laser_distance_mm: u16::from_le_bytes([bytes[4], bytes[5]]),
                weight_g: f32_at(6),
            },
            timestamp,
            health: HealthMask::from_bits(bytes[18]),
            battery_voltage: f32_at(19),
            temperature_c: bytes[23] as i8,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn timestamp() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 14)
            .and_then(|d| d.and_hms_milli_opt(6, 30, 5, 250))
            .unwrap()
    }

    fn readings() -> SensorReadings {
        SensorReadings {
            ultrasonic_distance_cm: 150.0,
            laser_distance_mm: 2000,
            weight_g: 1234.5,
        }
    }

    #[test]
    fn healthy_cycle_sets_all_bits() {
        let sample = UnifiedSample::new(readings(), timestamp(), 3.7, 20);
        assert_eq!(sample.health().bits(), 0b111);
    }

    #[test]
    fn each_sentinel_clears_only_its_bit() {
        let cases = [
            (
                SensorReadings { ultrasonic_distance_cm: ULTRASONIC_FAILED_CM, ..readings() },
                HealthMask::LOAD_CELL | HealthMask::RANGING,
            ),
            (
                SensorReadings { weight_g: WEIGHT_FAILED_G, ..readings() },
                HealthMask::ULTRASONIC | HealthMask::RANGING,
            ),
            (
                SensorReadings { laser_distance_mm: LASER_FAILED_MM, ..readings() },
                HealthMask::ULTRASONIC | HealthMask::LOAD_CELL,
            ),
        ];
        for (readings, expected) in cases {
            assert_eq!(readings.health().bits(), expected);
        }
    }

    #[test]
    fn zero_distance_is_a_valid_echo() {
        let readings = SensorReadings { ultrasonic_distance_cm: 0.0, ..readings() };
        assert!(readings.health().is_ok(Sensor::Ultrasonic));
    }

    #[test]
    fn laser_out_of_range_is_unhealthy() {
        let readings = SensorReadings { laser_distance_mm: LASER_MAX_VALID_MM, ..readings() };
        assert!(!readings.health().is_ok(Sensor::Ranging));
    }

    #[test]
    fn encoded_sample_decodes_identically() {
        let sample = UnifiedSample::new(
            SensorReadings { weight_g: -12.25, ..readings() },
            timestamp(),
            3.71,
            -14,
        );
        let decoded = UnifiedSample::from_bytes(&sample.to_bytes()).unwrap();
        assert_eq!(decoded, sample);
    }
}
