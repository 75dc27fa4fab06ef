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

use crate::config::{check_calibration_factor, ConfigurationRejected};
use crate::poll::{wait_for_level, Clock, PollBound, PollError};
use crate::ultrasonic::UltrasonicRanger;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin, PinState};

/// Speed of sound at roughly 20 °C, in cm/µs
pub const SPEED_OF_SOUND_CM_PER_US: f32 = 0.0343;

const TRIGGER_SETTLE_US: u32 = 2;
const TRIGGER_PULSE_US: u32 = 10;
/// Ceiling on each of the echo rise and echo fall waits
const ECHO_TIMEOUT_US: u64 = 25_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EchoEdge {
    Rise,
    Fall,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error<TrigE, EchoE> {
    TriggerPin(TrigE),
    EchoPin(EchoE),
    Timeout(EchoEdge),
}

/// HC-SR04P (3.3 V variant) ultrasonic ranger on a trigger/echo pin pair.
pub struct Hcsr04p<TRIG, ECHO, CLK, D> {
    trigger_pin: TRIG,
    echo_pin: ECHO,
    clock: CLK,
    delay: D,
    last_distance_cm: Option<f32>,
    calibration_factor: f32,
}

impl<TRIG, ECHO, CLK, D, TrigE, EchoE> Hcsr04p<TRIG, ECHO, CLK, D>
where
    TRIG: OutputPin<Error = TrigE>,
    ECHO: InputPin<Error = EchoE>,
    CLK: Clock,
    D: DelayNs,
{
    pub fn new(trigger_pin: TRIG, echo_pin: ECHO, clock: CLK, delay: D) -> Self {
        Self {
            trigger_pin,
            echo_pin,
            clock,
            delay,
            last_distance_cm: None,
            calibration_factor: 1.0,
        }
    }

    pub fn init(&mut self) -> Result<(), Error<TrigE, EchoE>> {
        self.trigger_pin.set_low().map_err(Error::TriggerPin)
    }

    pub fn read(&mut self) -> Result<f32, Error<TrigE, EchoE>> {
        self.fire_trigger()?;

        let echo_start = self.wait_for_echo(PinState::High, EchoEdge::Rise)?;
        let echo_end = self.wait_for_echo(PinState::Low, EchoEdge::Fall)?;
        let echo_width_us = echo_end.saturating_sub(echo_start);

        let distance_cm =
            echo_width_us as f32 * SPEED_OF_SOUND_CM_PER_US / 2.0 * self.calibration_factor;
        trace!("Echo width {} us, distance {} cm", echo_width_us, distance_cm);
        self.last_distance_cm = Some(distance_cm);
        Ok(distance_cm)
    }

    /// Last successfully measured distance, if any.
    pub fn last_distance_cm(&self) -> Option<f32> {
        self.last_distance_cm
    }

    pub fn calibration_factor(&self) -> f32 {
        self.calibration_factor
    }

    pub fn set_calibration_factor(&mut self, factor: f32) -> Result<(), ConfigurationRejected> {
        self.calibration_factor = check_calibration_factor(factor).inspect_err(|_| {
            warn!("Ignoring ultrasonic calibration factor {}", factor);
        })?;
        Ok(())
    }

    fn fire_trigger(&mut self) -> Result<(), Error<TrigE, EchoE>> {
        self.trigger_pin.set_low().map_err(Error::TriggerPin)?;
        self.delay.delay_us(TRIGGER_SETTLE_US);
        self.trigger_pin.set_high().map_err(Error::TriggerPin)?;
        self.delay.delay_us(TRIGGER_PULSE_US);
        self.trigger_pin.set_low().map_err(Error::TriggerPin)
    }

    fn wait_for_echo(&mut self, level: PinState, edge: EchoEdge) -> Result<u64, Error<TrigE, EchoE>> {
        wait_for_level(
            &mut self.echo_pin,
            level,
            &self.clock,
            PollBound::WithinMicros(ECHO_TIMEOUT_US),
        )
        .map_err(|e| match e {
            PollError::Expired => {
                debug!("Echo {:?} timed out", edge);
                Error::Timeout(edge)
            }
            PollError::Pin(e) => Error::EchoPin(e),
        })
    }
}

impl<TRIG, ECHO, CLK, D, TrigE, EchoE> UltrasonicRanger for Hcsr04p<TRIG, ECHO, CLK, D>
where
    TRIG: OutputPin<Error = TrigE>,
    ECHO: InputPin<Error = EchoE>,
    CLK: Clock,
    D: DelayNs,
{
    type Error = Error<TrigE, EchoE>;

    async fn initialize(&mut self) -> Result<(), Self::Error> {
        self.init()
    }

    async fn read_distance_cm(&mut self) -> Result<f32, Self::Error> {
        self.read()
    }

    fn set_calibration(&mut self, factor: f32) -> Result<(), ConfigurationRejected> {
        self.set_calibration_factor(factor)
    }
}
