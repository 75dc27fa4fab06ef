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

use crate::config::StationConfig;
use crate::fmt::Dbg;
use crate::laser::LaserRanger;
use crate::pipeline::SampleSource;
use crate::station::sample::{
    SensorReadings, UnifiedSample, LASER_FAILED_MM, ULTRASONIC_FAILED_CM, WEIGHT_FAILED_G,
};
use crate::station::{Housekeeping, TimeSource};
use crate::ultrasonic::UltrasonicRanger;
use crate::weight::WeighingSystem;
use core::fmt::Debug;

/// Which sensor stopped the station from coming up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitError<UltrasonicE, LoadCellE, RangingE> {
    Ultrasonic(UltrasonicE),
    LoadCell(LoadCellE),
    Ranging(RangingE),
}

/// Owns the three sensors and turns one pass over them into a
/// [`UnifiedSample`].
pub struct SensorAggregator<U, W, L, H, T> {
    ultrasonic: U,
    scale: W,
    laser: L,
    housekeeping: H,
    time: T,
    config: StationConfig,
}

impl<U, W, L, H, T> SensorAggregator<U, W, L, H, T>
where
    U: UltrasonicRanger,
    U::Error: Debug,
    W: WeighingSystem,
    W::Error: Debug,
    L: LaserRanger,
    L::Error: Debug,
    H: Housekeeping,
    T: TimeSource,
{
    /// Brings every sensor up and applies `config`. Any sensor failing to
    /// initialise fails the whole station.
    pub async fn init(
        mut ultrasonic: U,
        mut scale: W,
        mut laser: L,
        housekeeping: H,
        time: T,
        config: StationConfig,
    ) -> Result<Self, InitError<U::Error, W::Error, L::Error>> {
        ultrasonic.initialize().await.map_err(|e| {
            error!("Ultrasonic ranger init failed: {:?}", Dbg(&e));
            InitError::Ultrasonic(e)
        })?;
        // rejected factors leave the driver default in place
        let _ = ultrasonic.set_calibration(config.ultrasonic_calibration);

        scale
            .initialize(config.load_cell_gain)
            .await
            .map_err(|e| {
                error!("Load cell init failed: {:?}", Dbg(&e));
                InitError::LoadCell(e)
            })?;

        laser.initialize().await.map_err(|e| {
            error!("Laser ranger init failed: {:?}", Dbg(&e));
            InitError::Ranging(e)
        })?;
        laser
            .set_accuracy(config.laser_accuracy)
            .await
            .map_err(InitError::Ranging)?;
        laser
            .set_mode(config.laser_mode)
            .await
            .map_err(InitError::Ranging)?;
        let _ = laser.set_calibration(config.laser_calibration);

        let mut aggregator = Self {
            ultrasonic,
            scale,
            laser,
            housekeeping,
            time,
            config,
        };

        if config.tare_on_boot {
            if let Err(e) = aggregator.tare_scale().await {
                warn!("Boot tare failed: {:?}", Dbg(&e));
            }
        }

        info!("Station sensors ready");
        Ok(aggregator)
    }

    pub fn config(&self) -> &StationConfig {
        &self.config
    }

    /// Reads every sensor once. A failed sensor reports its sentinel value
    /// and a cleared health bit, it never fails the cycle.
    pub async fn read_all(&mut self) -> UnifiedSample {
        let ultrasonic_distance_cm = match self.ultrasonic.read_distance_cm().await {
            Ok(cm) => cm,
            Err(e) => {
                warn!("Ultrasonic read failed: {:?}", Dbg(&e));
                ULTRASONIC_FAILED_CM
            }
        };

        let weight_g = match self.scale.get_instantaneous_weight_grams().await {
            Ok(g) => g,
            Err(e) => {
                warn!("Load cell read failed: {:?}", Dbg(&e));
                WEIGHT_FAILED_G
            }
        };

        let laser_distance_mm = match self.laser.read_distance_mm().await {
            Ok(mm) => mm,
            Err(e) => {
                warn!("Laser read failed: {:?}", Dbg(&e));
                LASER_FAILED_MM
            }
        };

        let readings = SensorReadings {
            ultrasonic_distance_cm,
            laser_distance_mm,
            weight_g,
        };
        let battery_voltage = self.housekeeping.battery_voltage().await;
        let temperature_c = self.housekeeping.temperature_c().await;
        let sample = UnifiedSample::new(readings, self.time.now(), battery_voltage, temperature_c);

        debug!(
            "Sample: {} cm, {} mm, {} g, {}",
            ultrasonic_distance_cm,
            laser_distance_mm,
            weight_g,
            sample.health()
        );
        sample
    }

    pub async fn calibrate_scale(&mut self, known_weight_g: f32) -> Result<(), W::Error> {
        self.scale
            .calibrate(known_weight_g, self.config.averaging_samples)
            .await
    }

    pub async fn tare_scale(&mut self) -> Result<(), W::Error> {
        self.scale.tare(self.config.averaging_samples).await
    }

    pub async fn power_down(&mut self) {
        if let Err(e) = self.scale.power_down().await {
            warn!("Load cell power down failed: {:?}", Dbg(&e));
        }
        if let Err(e) = self.laser.sleep().await {
            debug!("Laser sleep failed: {:?}", Dbg(&e));
        }
    }

    pub async fn power_up(&mut self) {
        if let Err(e) = self.scale.power_up().await {
            warn!("Load cell power up failed: {:?}", Dbg(&e));
        }
        if let Err(e) = self.laser.wake().await {
            debug!("Laser wake failed: {:?}", Dbg(&e));
        }
    }
}

impl<U, W, L, H, T> SampleSource for SensorAggregator<U, W, L, H, T>
where
    U: UltrasonicRanger,
    U::Error: Debug,
    W: WeighingSystem,
    W::Error: Debug,
    L: LaserRanger,
    L::Error: Debug,
    H: Housekeeping,
    T: TimeSource,
{
    async fn read_all(&mut self) -> UnifiedSample {
        SensorAggregator::read_all(self).await
    }
}
