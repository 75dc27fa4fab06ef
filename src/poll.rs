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

//! Polling helpers shared by the drivers.
//!
//! Pulse timing busy-waits against a [`Clock`]; slower readiness checks sleep
//! between polls through an async `DelayNs`, so both can be driven by fakes.

use embedded_hal::digital::{InputPin, PinState};
use embedded_hal_async::delay::DelayNs;

/// Free running microsecond time base.
pub trait Clock {
    fn now_micros(&self) -> u64;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PollBound {
    /// Poll until the condition holds, however long that takes
    Unbounded,
    WithinMicros(u64),
}

impl PollBound {
    fn is_exceeded(&self, elapsed_us: u64) -> bool {
        match self {
            PollBound::Unbounded => false,
            PollBound::WithinMicros(limit) => elapsed_us > *limit,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PollError<E> {
    Expired,
    Pin(E),
}

/// Spins on `pin` until it reads `level`, returning the clock reading taken
/// when the level was seen.
pub fn wait_for_level<P, C>(
    pin: &mut P,
    level: PinState,
    clock: &C,
    bound: PollBound,
) -> Result<u64, PollError<P::Error>>
where
    P: InputPin,
    C: Clock,
{
    let want_high = level == PinState::High;
    let start = clock.now_micros();
    loop {
        let is_high = pin.is_high().map_err(PollError::Pin)?;
        let now = clock.now_micros();
        if is_high == want_high {
            return Ok(now);
        }
        if bound.is_exceeded(now.saturating_sub(start)) {
            return Err(PollError::Expired);
        }
    }
}

/// Sleeps a fixed interval per call and keeps track of the total time spent
/// against its bound.
pub struct Poller {
    interval_us: u32,
    bound: PollBound,
    waited_us: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Expired;

impl Poller {
    pub fn new(interval_us: u32, bound: PollBound) -> Self {
        Self {
            interval_us,
            bound,
            waited_us: 0,
        }
    }

    /// Sleeps one interval, or reports expiry once the bound has been used up.
    pub async fn tick<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), Expired> {
        if self.bound.is_exceeded(self.waited_us + self.interval_us as u64) {
            return Err(Expired);
        }
        delay.delay_us(self.interval_us).await;
        self.waited_us += self.interval_us as u64;
        Ok(())
    }

    pub fn waited_us(&self) -> u64 {
        self.waited_us
    }
}
