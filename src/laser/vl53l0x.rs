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

//! VL53L0X time-of-flight laser ranger over async I2C.
//!
//! Only the register subset needed for single shot and free running ranging is
//! driven here. Every bus transfer is raced against a timeout.

use crate::config::{check_calibration_factor, ConfigurationRejected};
use crate::laser::LaserRanger;
use crate::poll::{PollBound, Poller};
use embassy_futures::select::{select, Either};
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::I2c;

pub const DEFAULT_ADDRESS: u8 = 0x29;
pub const EXPECTED_DEVICE_ID: u8 = 0xEE;
const BUS_TIMEOUT_MS: u32 = 100;
const STATUS_POLL_INTERVAL_US: u32 = 10_000;

mod reg {
    pub const SYSRANGE_START: u8 = 0x00;
    pub const SYSTEM_INTERRUPT_CLEAR: u8 = 0x0B;
    pub const RESULT_INTERRUPT_STATUS: u8 = 0x13;
    pub const RESULT_RANGE_STATUS: u8 = 0x14;
    /// Range in mm, big endian, inside the range status block
    pub const RESULT_RANGE_MM: u8 = RESULT_RANGE_STATUS + 10;
    pub const FINAL_RANGE_CONFIG_MIN_COUNT_RATE_RTN_LIMIT: u8 = 0x44;
    pub const FINAL_RANGE_CONFIG_VALID_PHASE_LOW: u8 = 0x47;
    pub const FINAL_RANGE_CONFIG_VALID_PHASE_HIGH: u8 = 0x48;
    pub const MSRC_CONFIG_CONTROL: u8 = 0x60;
    pub const VHV_CONFIG_PAD_SCL_SDA_EXTSUP_HV: u8 = 0x89;
    pub const IDENTIFICATION_MODEL_ID: u8 = 0xC0;
}

const SYSRANGE_STOP: u8 = 0x00;
const SYSRANGE_SINGLE_SHOT: u8 = 0x01;
const SYSRANGE_BACK_TO_BACK: u8 = 0x02;
const SYSRANGE_TIMED: u8 = 0x03;
const INTERRUPT_CLEAR_RANGE: u8 = 0x01;
const INTERRUPT_STATUS_MASK: u8 = 0x07;
/// 2V8 I/O mode
const VHV_PAD_2V8: u8 = 0x01;
const VALID_PHASE_LOW: u8 = 0x08;
const VALID_PHASE_HIGH: u8 = 0x78;
const LONG_BUDGET_THRESHOLD_US: u32 = 50_000;
const RETURN_RATE_LIMIT_LONG_BUDGET: u16 = 0x0A00;
const RETURN_RATE_LIMIT_SHORT_BUDGET: u16 = 0x1400;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RangingMode {
    /// One measurement per read, started by the read itself
    Single,
    /// Back-to-back measurements, reads return the latest result
    Continuous,
    Timed,
}

impl RangingMode {
    fn start_command(&self) -> Option<u8> {
        match self {
            RangingMode::Single => None,
            RangingMode::Continuous => Some(SYSRANGE_BACK_TO_BACK),
            RangingMode::Timed => Some(SYSRANGE_TIMED),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Accuracy {
    Good,
    Better,
    Best,
    Fast,
    Faster,
}

impl Accuracy {
    pub fn timing_budget_us(&self) -> u32 {
        match self {
            Accuracy::Good => 30_000,
            Accuracy::Better => 70_000,
            Accuracy::Best => 200_000,
            Accuracy::Fast => 20_000,
            Accuracy::Faster => 10_000,
        }
    }

    fn msrc_control(&self) -> u8 {
        match self {
            Accuracy::Good => 0x1D,
            Accuracy::Better => 0x1E,
            Accuracy::Best => 0x1F,
            Accuracy::Fast => 0x1C,
            Accuracy::Faster => 0x18,
        }
    }

    fn return_rate_limit(&self) -> u16 {
        if self.timing_budget_us() > LONG_BUDGET_THRESHOLD_US {
            RETURN_RATE_LIMIT_LONG_BUDGET
        } else {
            RETURN_RATE_LIMIT_SHORT_BUDGET
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error<BusE> {
    Bus(BusE),
    BusTimeout,
    /// Measurement did not complete within the poll bound
    MeasurementExpired,
    UnexpectedDeviceId(u8),
    NotInitialized,
}

pub struct Vl53l0x<I2C, D> {
    i2c: I2C,
    delay: D,
    address: u8,
    timeout_ms: u32,
    calibration_factor: f32,
    mode: RangingMode,
    accuracy: Accuracy,
    initialized: bool,
}

impl<I2C, D, BusE> Vl53l0x<I2C, D>
where
    I2C: I2c<Error = BusE>,
    D: DelayNs,
{
    pub fn new(i2c: I2C, delay: D, address: u8) -> Self {
        Self {
            i2c,
            delay,
            address,
            timeout_ms: BUS_TIMEOUT_MS,
            calibration_factor: 1.0,
            mode: RangingMode::Single,
            accuracy: Accuracy::Better,
            initialized: false,
        }
    }

    pub fn mode(&self) -> RangingMode {
        self.mode
    }

    pub fn accuracy(&self) -> Accuracy {
        self.accuracy
    }

    pub fn calibration_factor(&self) -> f32 {
        self.calibration_factor
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Checks the device identity and applies the default configuration. A
    /// failure leaves the driver refusing to range until this succeeds.
    pub async fn init(&mut self) -> Result<(), Error<BusE>> {
        self.initialized = false;

        let device_id = self.read_reg(reg::IDENTIFICATION_MODEL_ID).await?;
        if device_id != EXPECTED_DEVICE_ID {
            error!(
                "VL53L0X at {:#x} reports id {:#x}",
                self.address, device_id
            );
            return Err(Error::UnexpectedDeviceId(device_id));
        }

        let pad = self.read_reg(reg::VHV_CONFIG_PAD_SCL_SDA_EXTSUP_HV).await?;
        self.write_reg(reg::VHV_CONFIG_PAD_SCL_SDA_EXTSUP_HV, pad | VHV_PAD_2V8)
            .await?;

        self.apply_accuracy(self.accuracy).await?;
        self.apply_mode(self.mode).await?;
        self.initialized = true;
        info!("VL53L0X ready");
        Ok(())
    }

    pub async fn read_distance(&mut self) -> Result<u16, Error<BusE>> {
        self.ensure_initialized()?;
        let raw_mm = match self.mode {
            RangingMode::Single => self.single_shot().await?,
            RangingMode::Continuous | RangingMode::Timed => {
                self.read_reg16(reg::RESULT_RANGE_MM).await?
            }
        };
        let distance_mm = (raw_mm as f32 * self.calibration_factor) as u16;
        trace!("Range {} mm, calibrated {} mm", raw_mm, distance_mm);
        Ok(distance_mm)
    }

    pub async fn set_mode(&mut self, mode: RangingMode) -> Result<(), Error<BusE>> {
        self.ensure_initialized()?;
        if let Err(e) = self.apply_mode(mode).await {
            warn!("Ranging mode change to {:?} failed", mode);
            if self.apply_mode(self.mode).await.is_err() {
                warn!("Ranging mode {:?} not restored", self.mode);
            }
            return Err(e);
        }
        self.mode = mode;
        debug!("Ranging mode {:?}", mode);
        Ok(())
    }

    pub async fn set_accuracy(&mut self, accuracy: Accuracy) -> Result<(), Error<BusE>> {
        self.ensure_initialized()?;
        if let Err(e) = self.apply_accuracy(accuracy).await {
            warn!("Ranging accuracy change to {:?} failed", accuracy);
            if self.apply_accuracy(self.accuracy).await.is_err() {
                warn!("Ranging accuracy {:?} not restored", self.accuracy);
            }
            return Err(e);
        }
        self.accuracy = accuracy;
        debug!(
            "Ranging accuracy {:?}, budget {} us",
            accuracy,
            accuracy.timing_budget_us()
        );
        Ok(())
    }

    pub fn set_calibration_factor(&mut self, factor: f32) -> Result<(), ConfigurationRejected> {
        self.calibration_factor = check_calibration_factor(factor).inspect_err(|_| {
            warn!("Ignoring ranging calibration factor {}", factor);
        })?;
        Ok(())
    }

    /// There is no low power register, so sleeping just stops ranging.
    pub async fn sleep(&mut self) -> Result<(), Error<BusE>> {
        self.ensure_initialized()?;
        self.write_reg(reg::SYSRANGE_START, SYSRANGE_STOP).await
    }

    pub async fn wake(&mut self) -> Result<(), Error<BusE>> {
        self.ensure_initialized()?;
        self.apply_mode(self.mode).await
    }

    fn ensure_initialized(&self) -> Result<(), Error<BusE>> {
        if self.initialized {
            Ok(())
        } else {
            Err(Error::NotInitialized)
        }
    }

    async fn single_shot(&mut self) -> Result<u16, Error<BusE>> {
        self.write_reg(reg::SYSRANGE_START, SYSRANGE_SINGLE_SHOT)
            .await?;

        // no timeout on measurement completion
        let mut poller = Poller::new(STATUS_POLL_INTERVAL_US, PollBound::Unbounded);
        while self.read_reg(reg::RESULT_INTERRUPT_STATUS).await? & INTERRUPT_STATUS_MASK == 0 {
            poller
                .tick(&mut self.delay)
                .await
                .map_err(|_| Error::MeasurementExpired)?;
        }

        let range = self.read_reg16(reg::RESULT_RANGE_MM).await?;
        self.write_reg(reg::SYSTEM_INTERRUPT_CLEAR, INTERRUPT_CLEAR_RANGE)
            .await?;
        Ok(range)
    }

    async fn apply_mode(&mut self, mode: RangingMode) -> Result<(), Error<BusE>> {
        self.write_reg(reg::SYSRANGE_START, SYSRANGE_STOP).await?;
        if let Some(start) = mode.start_command() {
            self.write_reg(reg::SYSRANGE_START, start).await?;
        }
        Ok(())
    }

    async fn apply_accuracy(&mut self, accuracy: Accuracy) -> Result<(), Error<BusE>> {
        self.write_reg(reg::MSRC_CONFIG_CONTROL, accuracy.msrc_control())
            .await?;
        self.write_reg16(
            reg::FINAL_RANGE_CONFIG_MIN_COUNT_RATE_RTN_LIMIT,
            accuracy.return_rate_limit(),
        )
        .await?;
        self.write_reg(reg::FINAL_RANGE_CONFIG_VALID_PHASE_LOW, VALID_PHASE_LOW)
            .await?;
        self.write_reg(reg::FINAL_RANGE_CONFIG_VALID_PHASE_HIGH, VALID_PHASE_HIGH)
            .await
    }

    async fn write(&mut self, bytes: &[u8]) -> Result<(), Error<BusE>> {
        match select(
            self.i2c.write(self.address, bytes),
            self.delay.delay_ms(self.timeout_ms),
        )
        .await
        {
            Either::First(result) => result.map_err(Error::Bus),
            Either::Second(()) => Err(Error::BusTimeout),
        }
    }

    async fn read(&mut self, register: u8, buffer: &mut [u8]) -> Result<(), Error<BusE>> {
        match select(
            self.i2c.write_read(self.address, &[register], buffer),
            self.delay.delay_ms(self.timeout_ms),
        )
        .await
        {
            Either::First(result) => result.map_err(Error::Bus),
            Either::Second(()) => Err(Error::BusTimeout),
        }
    }

    async fn write_reg(&mut self, register: u8, value: u8) -> Result<(), Error<BusE>> {
        self.write(&[register, value]).await
    }

    async fn write_reg16(&mut self, register: u8, value: u16) -> Result<(), Error<BusE>> {
        let [high, low] = value.to_be_bytes();
        self.write(&[register, high, low]).await
    }

    async fn read_reg(&mut self, register: u8) -> Result<u8, Error<BusE>> {
        let mut buffer = [0u8; 1];
        self.read(register, &mut buffer).await?;
        Ok(buffer[0])
    }

    async fn read_reg16(&mut self, register: u8) -> Result<u16, Error<BusE>> {
        let mut buffer = [0u8; 2];
        self.read(register, &mut buffer).await?;
        Ok(u16::from_be_bytes(buffer))
    }
}

impl<I2C, D, BusE> LaserRanger for Vl53l0x<I2C, D>
where
    I2C: I2c<Error = BusE>,
    D: DelayNs,
{
    type Error = Error<BusE>;

    async fn initialize(&mut self) -> Result<(), Self::Error> {
        self.init().await
    }

    async fn read_distance_mm(&mut self) -> Result<u16, Self::Error> {
        self.read_distance().await
    }

    async fn set_mode(&mut self, mode: RangingMode) -> Result<(), Self::Error> {
        Vl53l0x::set_mode(self, mode).await
    }

    async fn set_accuracy(&mut self, accuracy: Accuracy) -> Result<(), Self::Error> {
        Vl53l0x::set_accuracy(self, accuracy).await
    }

    fn set_calibration(&mut self, factor: f32) -> Result<(), ConfigurationRejected> {
        self.set_calibration_factor(factor)
    }

    async fn sleep(&mut self) -> Result<(), Self::Error> {
        Vl53l0x::sleep(self).await
    }

    async fn wake(&mut self) -> Result<(), Self::Error> {
        Vl53l0x::wake(self).await
    }
}
