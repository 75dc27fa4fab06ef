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

use crate::poll::{PollBound, Poller};
use crate::weight::interface::{Raw24, StrainGaugeInterface};
use embedded_hal::delay::DelayNs as BlockingDelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal_async::delay::DelayNs;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Hx711Gain {
    Gain128,
    Gain64,
    Gain32ChannelB,
}

impl Hx711Gain {
    /// Clock pulses after the data bits. They select gain and channel for the
    /// following conversion.
    pub fn extra_pulses(&self) -> u32 {
        match self {
            Hx711Gain::Gain128 => 1,
            Hx711Gain::Gain64 => 3,
            Hx711Gain::Gain32ChannelB => 2,
        }
    }
}

const POWER_MODE_CHANGE_DELAY_US: u32 = 60;
const CLK_HALF_PERIOD_US: u32 = 1;
const VALID_DATA_BITS: usize = 24;
const READY_POLL_INTERVAL_US: u32 = 1_000;
const POWER_UP_READY_TIMEOUT_US: u64 = 100_000;
/// Slowest output rate is 10 SPS, so allow two conversion periods
const CONVERSION_READY_TIMEOUT_US: u64 = 200_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error<ClkE, DataE> {
    ClockPin(ClkE),
    DataPin(DataE),
    NotResponding,
}

pub struct Hx711<CLK, DATA, D> {
    clock_pin: CLK,
    data_pin: DATA,
    delay: D,
    gain: Hx711Gain,
    powered_up: bool,
}

impl<CLK, DATA, D, ClkE, DataE> Hx711<CLK, DATA, D>
where
    CLK: OutputPin<Error = ClkE>,
    DATA: InputPin<Error = DataE>,
    D: DelayNs + BlockingDelayNs,
{
    pub fn new(clock_pin: CLK, data_pin: DATA, delay: D, gain: Hx711Gain) -> Self {
        Self {
            clock_pin,
            data_pin,
            delay,
            gain,
            powered_up: false,
        }
    }

    pub fn gain(&self) -> Hx711Gain {
        self.gain
    }

    pub fn is_powered_up(&self) -> bool {
        self.powered_up
    }

    /// DOUT goes low when a conversion is ready
    fn conversion_pending(&mut self) -> Result<bool, Error<ClkE, DataE>> {
        self.data_pin.is_low().map_err(Error::DataPin)
    }

    async fn wait_ready_within(&mut self, bound_us: u64) -> Result<(), Error<ClkE, DataE>> {
        let mut poller = Poller::new(READY_POLL_INTERVAL_US, PollBound::WithinMicros(bound_us));
        while !self.conversion_pending()? {
            poller
                .tick(&mut self.delay)
                .await
                .map_err(|_| Error::NotResponding)?;
        }
        Ok(())
    }

    fn clock_pulse(&mut self) -> Result<(), Error<ClkE, DataE>> {
        self.clock_pin.set_high().map_err(Error::ClockPin)?;
        BlockingDelayNs::delay_us(&mut self.delay, CLK_HALF_PERIOD_US);
        self.clock_pin.set_low().map_err(Error::ClockPin)?;
        BlockingDelayNs::delay_us(&mut self.delay, CLK_HALF_PERIOD_US);
        Ok(())
    }

    /// Clocks out the 24 data bits MSB first, then the gain selection pulses.
    /// Holding the clock high for more than 60 µs powers the device down, so
    /// this must not be interrupted.
    fn shift_conversion(&mut self) -> Result<u32, Error<ClkE, DataE>> {
        let mut word: u32 = 0;
        for _ in 0..VALID_DATA_BITS {
            self.clock_pin.set_high().map_err(Error::ClockPin)?;
            BlockingDelayNs::delay_us(&mut self.delay, CLK_HALF_PERIOD_US);
            word <<= 1;
            if self.data_pin.is_high().map_err(Error::DataPin)? {
                word |= 0x1;
            }
            self.clock_pin.set_low().map_err(Error::ClockPin)?;
            BlockingDelayNs::delay_us(&mut self.delay, CLK_HALF_PERIOD_US);
        }

        for _ in 0..self.gain.extra_pulses() {
            self.clock_pulse()?;
        }
        Ok(word)
    }

    fn discard_conversion(&mut self) -> Result<(), Error<ClkE, DataE>> {
        if let Some(raw) = self.read_raw()? {
            trace!("Discarded conversion {}", raw.value());
        }
        Ok(())
    }
}

impl<CLK, DATA, D, ClkE, DataE> StrainGaugeInterface for Hx711<CLK, DATA, D>
where
    CLK: OutputPin<Error = ClkE>,
    DATA: InputPin<Error = DataE>,
    D: DelayNs + BlockingDelayNs,
{
    type Error = Error<ClkE, DataE>;

    async fn initialize(&mut self) -> Result<(), Self::Error> {
        self.power_up().await?;
        self.wait_ready_within(POWER_UP_READY_TIMEOUT_US)
            .await
            .inspect_err(|_| error!("HX711 produced no conversion after power up"))?;
        // the first conversion after power up uses the default gain
        self.discard_conversion()
    }

    fn read_raw(&mut self) -> Result<Option<Raw24>, Self::Error> {
        if !self.conversion_pending()? {
            return Ok(None);
        }
        let word = critical_section::with(|_| self.shift_conversion())?;
        Ok(Some(Raw24::from_word(word)))
    }

    async fn wait_ready(&mut self) -> Result<(), Self::Error> {
        self.wait_ready_within(CONVERSION_READY_TIMEOUT_US).await
    }

    /// The new gain takes effect on the pulses that follow a conversion, so it
    /// is only kept once that conversion has been clocked out.
    async fn set_gain(&mut self, gain: Hx711Gain) -> Result<(), Self::Error> {
        self.wait_ready().await?;
        let previous = core::mem::replace(&mut self.gain, gain);
        if let Err(e) = self.discard_conversion() {
            self.gain = previous;
            return Err(e);
        }
        debug!("HX711 gain set to {:?}", gain);
        Ok(())
    }

    async fn power_down(&mut self) -> Result<(), Self::Error> {
        self.clock_pin.set_low().map_err(Error::ClockPin)?;
        self.clock_pin.set_high().map_err(Error::ClockPin)?;
        DelayNs::delay_us(&mut self.delay, POWER_MODE_CHANGE_DELAY_US).await;
        self.powered_up = false;
        Ok(())
    }

    async fn power_up(&mut self) -> Result<(), Self::Error> {
        self.clock_pin.set_low().map_err(Error::ClockPin)?;
        DelayNs::delay_us(&mut self.delay, POWER_MODE_CHANGE_DELAY_US).await;
        self.powered_up = true;
        Ok(())
    }
}
