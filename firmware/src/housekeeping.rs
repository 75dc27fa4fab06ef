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

use defmt::warn;
use embassy_rp::adc::{self, Adc};
use snowgauge::station::Housekeeping;

const ADC_REFERENCE_V: f32 = 3.3;
const ADC_FULL_SCALE: f32 = 4096.0;
/// VSYS is measured through a 3:1 divider on the Pico
const VSYS_DIVIDER: f32 = 3.0;

/// Reported when the ADC read fails
pub const TEMPERATURE_FAILED_C: i8 = i8::MIN;

pub struct AdcHousekeeping {
    adc: Adc<'static, adc::Async>,
    vsys: adc::Channel<'static>,
    temperature: adc::Channel<'static>,
}

impl AdcHousekeeping {
    pub fn new(
        adc: Adc<'static, adc::Async>,
        vsys: adc::Channel<'static>,
        temperature: adc::Channel<'static>,
    ) -> Self {
        Self {
            adc,
            vsys,
            temperature,
        }
    }
}

fn counts_to_volts(counts: u16) -> f32 {
    counts as f32 * ADC_REFERENCE_V / ADC_FULL_SCALE
}

/// RP2040 die sensor, datasheet section 4.9.5
fn die_temperature_c(volts: f32) -> f32 {
    27.0 - (volts - 0.706) / 0.001721
}

impl Housekeeping for AdcHousekeeping {
    async fn battery_voltage(&mut self) -> f32 {
        match self.adc.read(&mut self.vsys).await {
            Ok(counts) => counts_to_volts(counts) * VSYS_DIVIDER,
            Err(e) => {
                warn!("Battery voltage read failed: {}", e);
                f32::NAN
            }
        }
    }

    async fn temperature_c(&mut self) -> i8 {
        match self.adc.read(&mut self.temperature).await {
            // float to int casts saturate
            Ok(counts) => die_temperature_c(counts_to_volts(counts)) as i8,
            Err(e) => {
                warn!("Temperature read failed: {}", e);
                TEMPERATURE_FAILED_C
            }
        }
    }
}
