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

//! Line oriented publish link to a cellular/radio modem.
//!
//! The modem raises a link-ready line once it can accept traffic and takes one
//! `PUB <topic> <payload>\n` line per message.

use crate::fmt::Dbg;
use crate::pipeline::Uplink;
use crate::station::UnifiedSample;
use crate::telemetry::{format_payload, TelemetryChannel};
use embedded_hal_async::digital::Wait;
use embedded_io_async::Write;
use strum::IntoEnumIterator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<WE> {
    Write(WE),
    /// Payload did not fit its buffer
    Format,
}

pub struct ModemUplink<W, R> {
    writer: W,
    link_ready: R,
}

impl<W: Write, R: Wait> ModemUplink<W, R> {
    pub fn new(writer: W, link_ready: R) -> Self {
        Self { writer, link_ready }
    }

    async fn send_line(&mut self, topic: &str, payload: &str) -> Result<(), Error<W::Error>> {
        for part in [
            b"PUB ".as_slice(),
            topic.as_bytes(),
            b" ".as_slice(),
            payload.as_bytes(),
            b"\n".as_slice(),
        ] {
            self.writer.write_all(part).await.map_err(Error::Write)?;
        }
        Ok(())
    }
}

impl<W: Write, R: Wait> Uplink for ModemUplink<W, R> {
    type Error = Error<W::Error>;

    async fn wait_for_connection(&mut self) {
        loop {
            match self.link_ready.wait_for_high().await {
                Ok(()) => return,
                Err(e) => warn!("Link-ready line error: {:?}", Dbg(&e)),
            }
        }
    }

    async fn publish(&mut self, sample: &UnifiedSample) -> Result<(), Self::Error> {
        for channel in TelemetryChannel::iter() {
            let payload =
                format_payload(channel.value(sample), sample.timestamp()).map_err(|_| Error::Format)?;
            debug!("Publishing {}: {}", channel.topic(), payload.as_str());
            self.send_line(channel.topic(), &payload).await?;
        }
        self.writer.flush().await.map_err(Error::Write)
    }
}
