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

pub mod aggregator;
pub mod health;
pub mod sample;

pub use aggregator::{InitError, SensorAggregator};
pub use health::{HealthMask, Sensor};
pub use sample::{SensorReadings, UnifiedSample};

use chrono::NaiveDateTime;

/// Board supply and temperature, sampled alongside every measurement.
pub trait Housekeeping {
    async fn battery_voltage(&mut self) -> f32;

    async fn temperature_c(&mut self) -> i8;
}

/// Wall clock used to timestamp samples (UTC).
pub trait TimeSource {
    fn now(&mut self) -> NaiveDateTime;
}
