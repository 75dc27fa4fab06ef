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

pub mod interface;
#[allow(clippy::module_inception)]
pub mod weight;

use interface::hx711::Hx711Gain;

pub trait WeighingSystem {
    type Error;

    async fn initialize(&mut self, gain: Hx711Gain) -> Result<(), Self::Error>;

    /// Average `samples` readings with nothing on the scale and use them as the
    /// zero point.
    async fn tare(&mut self, samples: usize) -> Result<(), Self::Error>;

    async fn calibrate(&mut self, calibration_mass: f32, samples: usize) -> Result<(), Self::Error>;

    async fn get_instantaneous_weight_grams(&mut self) -> Result<f32, Self::Error>;

    async fn power_down(&mut self) -> Result<(), Self::Error>;

    async fn power_up(&mut self) -> Result<(), Self::Error>;
}
