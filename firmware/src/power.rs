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

use crate::rtc::accessor::RtcAccessor;
use chrono::TimeDelta;
use core::convert::Infallible;
use defmt::{info, warn, Debug2Format};
use embassy_rp::gpio::Output;
use embassy_time::Timer;
use snowgauge::pipeline::PowerCycle;

/// Cuts board power through the hold line and lets the DS3231 alarm bring it
/// back. If the board is still running once the sleep is over (alarm not armed
/// or supply held up externally) the core is reset instead.
pub struct RtcPowerCycle {
    rtc: RtcAccessor,
    power_hold: Output<'static>,
    sleep_secs: u32,
}

impl RtcPowerCycle {
    pub fn new(rtc: RtcAccessor, power_hold: Output<'static>, sleep_secs: u32) -> Self {
        Self {
            rtc,
            power_hold,
            sleep_secs,
        }
    }
}

impl PowerCycle for RtcPowerCycle {
    async fn enter_deep_sleep(&mut self) -> Infallible {
        let now = self.rtc.get_date_time();
        let wake_at = TimeDelta::try_seconds(self.sleep_secs as i64)
            .and_then(|sleep| now.checked_add_signed(sleep));

        match wake_at {
            Some(wake_at) if self.rtc.arm_wake_alarm(wake_at).await => {
                info!("Powering down until {}", Debug2Format(&wake_at));
                self.power_hold.set_low();
            }
            _ => warn!("Wake alarm not armed, sleeping in place"),
        }

        Timer::after_secs(self.sleep_secs as u64).await;
        warn!("Still powered after sleep, resetting");
        cortex_m::peripheral::SCB::sys_reset()
    }
}
