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

pub mod vl53l0x;

use crate::config::ConfigurationRejected;
use vl53l0x::{Accuracy, RangingMode};

pub trait LaserRanger {
    type Error;

    async fn initialize(&mut self) -> Result<(), Self::Error>;

    async fn read_distance_mm(&mut self) -> Result<u16, Self::Error>;

    async fn set_mode(&mut self, mode: RangingMode) -> Result<(), Self::Error>;

    async fn set_accuracy(&mut self, accuracy: Accuracy) -> Result<(), Self::Error>;

    fn set_calibration(&mut self, factor: f32) -> Result<(), ConfigurationRejected>;

    /// Stop ranging. The device keeps its configuration.
    async fn sleep(&mut self) -> Result<(), Self::Error>;

    async fn wake(&mut self) -> Result<(), Self::Error>;
}
