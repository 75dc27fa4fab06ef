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

pub mod hcsr04p;

use crate::config::ConfigurationRejected;

pub trait UltrasonicRanger {
    type Error;

    /// Puts the trigger line into its idle state.
    async fn initialize(&mut self) -> Result<(), Self::Error>;

    /// Fires one ping and converts the echo width to centimetres.
    async fn read_distance_cm(&mut self) -> Result<f32, Self::Error>;

    fn set_calibration(&mut self, factor: f32) -> Result<(), ConfigurationRejected>;
}
