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

pub mod accessor;
mod signal;

use crate::rtc::signal::{RTC_ARM_WAKE, RTC_TIME_UPDATE, RTC_WAKE_ARMED};
use defmt::{debug, error, info, trace, warn, Debug2Format};
use ds323x::interface::I2cInterface;
use ds323x::{ic, DateTimeAccess, Ds323x, NaiveDateTime};
use embassy_futures::select::{select, Either};
use embassy_rp::i2c::{Async, I2c};
use embassy_rp::peripherals::I2C1;
use embassy_time::{Duration, Ticker};

pub type SystemRtc = Ds323x<I2cInterface<I2c<'static, I2C1, Async>>, ic::DS3231>;

/// Owns the DS3231. Publishes the time every second and programs the wake
/// alarm on request.
pub struct RtcControl {
    rtc: SystemRtc,
}

impl RtcControl {
    pub fn new(mut rtc: SystemRtc) -> Self {
        rtc.use_int_sqw_output_as_interrupt()
            .unwrap_or_else(|e| error!("unable to set RTC interrupt signal: {}", Debug2Format(&e)));

        match rtc.has_alarm1_matched() {
            Ok(true) => info!("Woken by RTC alarm"),
            Ok(false) => info!("Cold start"),
            Err(e) => warn!("unable to read RTC alarm flag: {}", Debug2Format(&e)),
        }
        rtc.clear_alarm1_matched_flag()
            .unwrap_or_else(|e| error!("unable to clear RTC alarm flag: {}", Debug2Format(&e)));

        Self { rtc }
    }

    fn publish_time(&mut self) {
        if let Ok(dt) = self.rtc.datetime() {
            trace!("New RTC time: {:?}", Debug2Format(&dt));
            RTC_TIME_UPDATE.sender().send(dt);
        }
    }

    /// Alarm 1 matches on hours, minutes and seconds, so the wake must be
    /// less than a day away.
    fn arm_wake_alarm(&mut self, at: NaiveDateTime) -> bool {
        let result = self
            .rtc
            .clear_alarm1_matched_flag()
            .and_then(|_| self.rtc.set_alarm1_hms(at.time()))
            .and_then(|_| self.rtc.enable_alarm1_interrupts());
        match result {
            Ok(()) => {
                debug!("Wake alarm set for {}", Debug2Format(&at));
                true
            }
            Err(e) => {
                error!("unable to set wake alarm: {}", Debug2Format(&e));
                false
            }
        }
    }

    pub async fn run(&mut self) -> ! {
        self.publish_time();
        let mut one_second_ticker = Ticker::every(Duration::from_secs(1));
        loop {
            match select(one_second_ticker.next(), RTC_ARM_WAKE.wait()).await {
                Either::First(()) => self.publish_time(),
                Either::Second(at) => {
                    let armed = self.arm_wake_alarm(at);
                    RTC_WAKE_ARMED.signal(armed);
                }
            }
        }
    }
}
