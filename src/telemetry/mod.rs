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

//! Published telemetry: one message per channel per sample.

pub mod modem;

pub use modem::ModemUplink;

use crate::station::UnifiedSample;
use chrono::{Datelike, NaiveDateTime, Timelike};
use core::fmt::Write;
use strum::{EnumIter, IntoStaticStr};

pub const PAYLOAD_CAPACITY: usize = 96;

pub type Payload = heapless::String<PAYLOAD_CAPACITY>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, IntoStaticStr)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TelemetryChannel {
    #[strum(serialize = "sensors/ultrasonic")]
    Ultrasonic,
    #[strum(serialize = "sensors/weight")]
    Weight,
    #[strum(serialize = "sensors/laser")]
    Laser,
}

impl TelemetryChannel {
    pub fn topic(self) -> &'static str {
        self.into()
    }

    /// Value published on this channel, failure sentinels included.
    pub fn value(self, sample: &UnifiedSample) -> f32 {
        match self {
            TelemetryChannel::Ultrasonic => sample.ultrasonic_distance_cm(),
            TelemetryChannel::Weight => sample.weight_g(),
            TelemetryChannel::Laser => sample.laser_distance_mm() as f32,
        }
    }
}

/// `{"value": 150.00, "timestamp": "2025-01-14T06:30:05Z"}`. Values that are
/// not finite are sent as `null`.
pub fn format_payload(value: f32, timestamp: NaiveDateTime) -> Result<Payload, core::fmt::Error> {
    let mut payload = Payload::new();
    if value.is_finite() {
        write!(payload, "{{\"value\": {:.2}, ", value)?;
    } else {
        payload.push_str("{\"value\": null, ").map_err(|_| core::fmt::Error)?;
    }
    write!(
        payload,
        "\"timestamp\": \"{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z\"}}",
        timestamp.year(),
        timestamp.month(),
        timestamp.day(),
        timestamp.hour(),
        timestamp.minute(),
        timestamp.second()
    )?;
    Ok(payload)
}
