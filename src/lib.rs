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

#![cfg_attr(not(test), no_std)]
#![allow(async_fn_in_trait)]

//! Sensor acquisition core for a battery powered snow depth station.
//!
//! Three ranging/weighing drivers feed a [`station::SensorAggregator`], whose
//! samples flow through the [`pipeline`] to storage and the uplink before the
//! station powers itself down until the next wake.

#[macro_use]
mod fmt;

pub mod config;
pub mod laser;
pub mod pipeline;
pub mod poll;
pub mod station;
pub mod storage;
pub mod telemetry;
pub mod ultrasonic;
pub mod weight;

#[cfg(test)]
mod sim;

pub use config::{ConfigurationRejected, StationConfig};
