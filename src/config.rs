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

use crate::laser::vl53l0x::{Accuracy, RangingMode, DEFAULT_ADDRESS};
use crate::weight::interface::hx711::Hx711Gain;

/// A calibration input was refused. The previous value is still in force.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConfigurationRejected;

/// Calibration factors must be finite and strictly positive.
pub(crate) fn check_calibration_factor(factor: f32) -> Result<f32, ConfigurationRejected> {
    if factor.is_finite() && factor > 0.0 {
        Ok(factor)
    } else {
        Err(ConfigurationRejected)
    }
}

/// Everything the aggregator needs to bring the sensors up after a wake.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StationConfig {
    pub ultrasonic_calibration: f32,
    pub load_cell_gain: Hx711Gain,
    /// Reference mass used by [`crate::station::SensorAggregator::calibrate_scale`]
    pub known_weight_g: f32,
    /// Raw samples averaged per tare/calibration
    pub averaging_samples: usize,
    pub tare_on_boot: bool,
    pub laser_address: u8,
    pub laser_accuracy: Accuracy,
    pub laser_mode: RangingMode,
    pub laser_calibration: f32,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            ultrasonic_calibration: 1.02,
            load_cell_gain: Hx711Gain::Gain128,
            known_weight_g: 500.0,
            averaging_samples: 10,
            tare_on_boot: true,
            laser_address: DEFAULT_ADDRESS,
            laser_accuracy: Accuracy::Better,
            laser_mode: RangingMode::Single,
            laser_calibration: 1.05,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calibration_factor_must_be_positive_and_finite() {
        assert_eq!(check_calibration_factor(1.5), Ok(1.5));
        assert_eq!(check_calibration_factor(0.0), Err(ConfigurationRejected));
        assert_eq!(check_calibration_factor(-2.0), Err(ConfigurationRejected));
        assert_eq!(check_calibration_factor(f32::NAN), Err(ConfigurationRejected));
        assert_eq!(check_calibration_factor(f32::INFINITY), Err(ConfigurationRejected));
    }
}
