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

pub mod hx711;

use hx711::Hx711Gain;

/// Sign bit of a 24-bit conversion word
const RAW24_SIGN_BIT: u32 = 1 << 23;
const RAW24_MASK: u32 = (1 << 24) - 1;

/// One 24-bit two's-complement conversion as shifted out MSB first.
///
/// Bits 0..=23 carry the sample, bit 23 is the sign. Bits 24..=31 are always
/// zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Raw24(u32);

impl Raw24 {
    pub const MAX: i32 = (1 << 23) - 1;
    pub const MIN: i32 = -(1 << 23);

    pub fn from_word(word: u32) -> Self {
        Self(word & RAW24_MASK)
    }

    pub fn word(self) -> u32 {
        self.0
    }

    pub fn value(self) -> i32 {
        if self.0 & RAW24_SIGN_BIT != 0 {
            self.0 as i32 - (1 << 24)
        } else {
            self.0 as i32
        }
    }
}

pub trait StrainGaugeInterface {
    type Error;

    /// Power the gauge up and wait for it to produce its first conversion.
    async fn initialize(&mut self) -> Result<(), Self::Error>;

    /// Shift out the pending conversion. `Ok(None)` means nothing is ready yet
    /// and the device has not been clocked.
    fn read_raw(&mut self) -> Result<Option<Raw24>, Self::Error>;

    /// Wait, within the device's bounded ready window, for a conversion to be
    /// pending.
    async fn wait_ready(&mut self) -> Result<(), Self::Error>;

    /// Change gain/channel. One conversion is discarded so the next reading
    /// uses the new setting.
    async fn set_gain(&mut self, gain: Hx711Gain) -> Result<(), Self::Error>;

    async fn power_down(&mut self) -> Result<(), Self::Error>;

    async fn power_up(&mut self) -> Result<(), Self::Error>;
}
