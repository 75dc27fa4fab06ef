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

use crate::config::ConfigurationRejected;
use crate::weight::interface::hx711::Hx711Gain;
use crate::weight::interface::StrainGaugeInterface;
use crate::weight::WeighingSystem;
use embedded_hal_async::delay::DelayNs;
use heapless::Vec;
use micromath::statistics::StdDev;

pub const MAX_AVERAGING_SAMPLES: usize = 32;
const SAMPLE_SETTLE_DELAY_MS: u32 = 10;

/// Zero offset (raw counts) and scale (raw counts per unit). The two only
/// ever change together, and the scale is always finite and non-zero.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Calibration {
    offset: i32,
    scale: f32,
}

impl Calibration {
    pub const UNITY: Calibration = Calibration {
        offset: 0,
        scale: 1.0,
    };

    pub fn new(offset: i32, scale: f32) -> Result<Self, ConfigurationRejected> {
        if scale.is_finite() && scale != 0.0 {
            Ok(Self { offset, scale })
        } else {
            Err(ConfigurationRejected)
        }
    }

    pub fn offset(&self) -> i32 {
        self.offset
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn to_units(&self, raw: i32) -> f32 {
        (raw as i64 - self.offset as i64) as f32 / self.scale
    }
}

impl Default for Calibration {
    fn default() -> Self {
        Self::UNITY
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Error<StrainGaugeE> {
    StrainGauge(StrainGaugeE),
    NotReady,
    Rejected(ConfigurationRejected),
}

pub struct WeightScale<StrainGauge, D> {
    strain_gauge: StrainGauge,
    delay: D,
    calibration: Calibration,
}

impl<StrainGauge, StrainGaugeE, D> WeightScale<StrainGauge, D>
where
    StrainGauge: StrainGaugeInterface<Error = StrainGaugeE>,
    D: DelayNs,
{
    pub fn new(strain_gauge: StrainGauge, delay: D) -> Self {
        Self {
            strain_gauge,
            delay,
            calibration: Calibration::UNITY,
        }
    }

    pub fn calibration(&self) -> Calibration {
        self.calibration
    }

    pub fn set_calibration(&mut self, calibration: Calibration) {
        debug!(
            "Calibration set: offset = {}, scale = {}",
            calibration.offset, calibration.scale
        );
        self.calibration = calibration;
    }

    /// Takes the pending conversion without waiting for one.
    pub fn read_raw(&mut self) -> Result<i32, Error<StrainGaugeE>> {
        match self
            .strain_gauge
            .read_raw()
            .map_err(Error::StrainGauge)?
        {
            Some(raw) => Ok(raw.value()),
            None => Err(Error::NotReady),
        }
    }

    pub fn read_units(&mut self) -> Result<f32, Error<StrainGaugeE>> {
        let raw = self.read_raw()?;
        Ok(self.calibration.to_units(raw))
    }

    async fn next_raw(&mut self) -> Result<i32, Error<StrainGaugeE>> {
        self.strain_gauge
            .wait_ready()
            .await
            .map_err(Error::StrainGauge)?;
        self.read_raw()
    }

    async fn average_raw(&mut self, samples: usize) -> Result<i32, Error<StrainGaugeE>> {
        if samples == 0 || samples > MAX_AVERAGING_SAMPLES {
            warn!("Cannot average {} samples", samples);
            return Err(Error::Rejected(ConfigurationRejected));
        }

        let mut measurement_buffer = Vec::<f32, MAX_AVERAGING_SAMPLES>::new();
        let mut sum: i64 = 0;
        for i in 0..samples {
            if i > 0 {
                self.delay.delay_ms(SAMPLE_SETTLE_DELAY_MS).await;
            }
            let reading = self.next_raw().await?;
            sum += reading as i64;
            // capacity checked above
            let _ = measurement_buffer.push(reading as f32);
        }

        let mean = (sum / samples as i64) as i32;
        if samples > 1 {
            trace!(
                "Mean of {} readings = {}, std dev = {}",
                samples,
                mean,
                measurement_buffer.as_slice().stddev()
            );
        }
        Ok(mean)
    }
}

impl<StrainGauge, StrainGaugeE, D> WeighingSystem for WeightScale<StrainGauge, D>
where
    StrainGauge: StrainGaugeInterface<Error = StrainGaugeE>,
    D: DelayNs,
{
    type Error = Error<StrainGaugeE>;

    async fn initialize(&mut self, gain: Hx711Gain) -> Result<(), Self::Error> {
        self.strain_gauge
            .initialize()
            .await
            .map_err(Error::StrainGauge)?;
        self.strain_gauge
            .set_gain(gain)
            .await
            .map_err(Error::StrainGauge)
    }

    async fn tare(&mut self, samples: usize) -> Result<(), Self::Error> {
        let offset = self.average_raw(samples).await?;
        self.calibration = Calibration {
            offset,
            scale: self.calibration.scale,
        };
        debug!("Tare offset = {}", offset);
        Ok(())
    }

    async fn calibrate(&mut self, calibration_mass: f32, samples: usize) -> Result<(), Self::Error> {
        if !(calibration_mass.is_finite() && calibration_mass > 0.0) {
            warn!("Refusing calibration against mass {}", calibration_mass);
            return Err(Error::Rejected(ConfigurationRejected));
        }

        let offset = self.average_raw(samples).await?;
        self.delay.delay_ms(SAMPLE_SETTLE_DELAY_MS).await;
        let loaded = self.average_raw(samples).await?;

        let scale = (loaded as i64 - offset as i64) as f32 / calibration_mass;
        let calibration = Calibration::new(offset, scale).map_err(|e| {
            warn!("Calibration produced unusable scale {}", scale);
            Error::Rejected(e)
        })?;
        self.set_calibration(calibration);
        Ok(())
    }

    async fn get_instantaneous_weight_grams(&mut self) -> Result<f32, Self::Error> {
        let reading = self.next_raw().await?;
        trace!("Reading = {}", reading);
        Ok(self.calibration.to_units(reading))
    }

    async fn power_down(&mut self) -> Result<(), Self::Error> {
        self.strain_gauge
            .power_down()
            .await
            .map_err(Error::StrainGauge)
    }

    async fn power_up(&mut self) -> Result<(), Self::Error> {
        self.strain_gauge
            .power_up()
            .await
            .map_err(Error::StrainGauge)
    }
}
