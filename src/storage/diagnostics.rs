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

//! Error counter, last error and recent events, kept in a flash map so they
//! survive power cycles.

use crate::fmt::Dbg;
use crate::pipeline::FaultLog;
use crate::storage::StorageError;
use core::fmt::{Debug, Write};
use core::ops::Range;
use embedded_storage_async::nor_flash::NorFlash;
use sequential_storage::cache::NoCache;
use sequential_storage::map;

const DATA_BUFFER_SIZE: usize = 64;

pub const TEXT_CAPACITY: usize = 48;
/// Number of most recent events that are held
pub const EVENT_SLOTS: u32 = 8;

pub type DiagnosticText = heapless::String<TEXT_CAPACITY>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum DiagnosticKey {
    ErrorCount = 0,
    LastError = 1,
    EventCount = 2,
    /// First of [`EVENT_SLOTS`] event name slots
    EventSlots = 16,
}

impl DiagnosticKey {
    fn id(self) -> u8 {
        self as u8
    }

    fn event_slot(index: u32) -> u8 {
        DiagnosticKey::EventSlots.id() + (index % EVENT_SLOTS) as u8
    }
}

/// Keeps whatever fits and drops the rest, never splitting a character.
struct Truncating(DiagnosticText);

impl Write for Truncating {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        self.push_part(s);
        Ok(())
    }
}

fn truncated(parts: &[&str]) -> DiagnosticText {
    let mut text = Truncating(DiagnosticText::new());
    for part in parts {
        text.push_part(part);
    }
    text.0
}

impl Truncating {
    fn push_part(&mut self, part: &str) {
        for c in part.chars() {
            if self.0.push(c).is_err() {
                return;
            }
        }
    }
}

/// `Debug` rendering of `value`, cut to fit a diagnostic entry.
pub fn describe<T: Debug>(value: &T) -> DiagnosticText {
    let mut text = Truncating(DiagnosticText::new());
    match write!(text, "{:?}", value) {
        Ok(()) => text.0,
        Err(_) => truncated(&["<unprintable>"]),
    }
}

pub struct DiagnosticsLog<F> {
    flash: F,
    range: Range<u32>,
    cache: NoCache,
    error_count: u32,
    event_count: u32,
}

impl<F: NorFlash> DiagnosticsLog<F> {
    pub async fn open(flash: F, range: Range<u32>) -> Result<Self, StorageError> {
        let mut log = Self {
            flash,
            range,
            cache: NoCache::new(),
            error_count: 0,
            event_count: 0,
        };
        log.error_count = log.fetch_count(DiagnosticKey::ErrorCount).await?;
        log.event_count = log.fetch_count(DiagnosticKey::EventCount).await?;
        info!(
            "Diagnostics: {} errors, {} events recorded",
            log.error_count, log.event_count
        );
        Ok(log)
    }

    pub fn error_count(&self) -> u32 {
        self.error_count
    }

    pub fn event_count(&self) -> u32 {
        self.event_count
    }

    /// Logs the error, bumps the counter and keeps `<subsystem>: <message>` as
    /// the last error.
    pub async fn record_error(&mut self, subsystem: &str, message: &str) -> Result<(), StorageError> {
        error!("{}: {}", subsystem, message);
        let count = self.error_count.saturating_add(1);
        self.store(DiagnosticKey::ErrorCount.id(), &count).await?;
        self.error_count = count;

        let text = truncated(&[subsystem, ": ", message]);
        self.store(DiagnosticKey::LastError.id(), &text.as_bytes())
            .await
    }

    pub async fn last_error(&mut self) -> Result<Option<DiagnosticText>, StorageError> {
        self.fetch_text(DiagnosticKey::LastError.id()).await
    }

    pub async fn record_event(&mut self, name: &str) -> Result<(), StorageError> {
        info!("Event {}", name);
        let index = self.event_count;
        let text = truncated(&[name]);
        self.store(DiagnosticKey::event_slot(index), &text.as_bytes())
            .await?;
        let count = index.saturating_add(1);
        self.store(DiagnosticKey::EventCount.id(), &count).await?;
        self.event_count = count;
        Ok(())
    }

    /// Name of event `index`, while it is still one of the most recent
    /// [`EVENT_SLOTS`].
    pub async fn event(&mut self, index: u32) -> Result<Option<DiagnosticText>, StorageError> {
        if index >= self.event_count || self.event_count - index > EVENT_SLOTS {
            return Ok(None);
        }
        self.fetch_text(DiagnosticKey::event_slot(index)).await
    }

    pub async fn clear(&mut self) -> Result<(), StorageError> {
        sequential_storage::erase_all(&mut self.flash, self.range.clone())
            .await
            .map_err(|e| {
                warn!("Unable to erase diagnostics. Error: {:?}", Dbg(&e));
                StorageError::EraseError
            })?;
        self.error_count = 0;
        self.event_count = 0;
        Ok(())
    }

    async fn fetch_count(&mut self, key: DiagnosticKey) -> Result<u32, StorageError> {
        let mut data_buffer = [0u8; DATA_BUFFER_SIZE];
        let count: Option<u32> = map::fetch_item(
            &mut self.flash,
            self.range.clone(),
            &mut self.cache,
            &mut data_buffer,
            &key.id(),
        )
        .await
        .map_err(|e| {
            warn!("Unable to read diagnostic {}. Error: {:?}", key.id(), Dbg(&e));
            StorageError::RetrieveError
        })?;
        Ok(count.unwrap_or(0))
    }

    async fn fetch_text(&mut self, key: u8) -> Result<Option<DiagnosticText>, StorageError> {
        let mut data_buffer = [0u8; DATA_BUFFER_SIZE];
        let bytes: Option<&[u8]> = map::fetch_item(
            &mut self.flash,
            self.range.clone(),
            &mut self.cache,
            &mut data_buffer,
            &key,
        )
        .await
        .map_err(|e| {
            warn!("Unable to read diagnostic {}. Error: {:?}", key, Dbg(&e));
            StorageError::RetrieveError
        })?;

        match bytes {
            None => Ok(None),
            Some(bytes) => core::str::from_utf8(bytes)
                .map(|text| Some(truncated(&[text])))
                .map_err(|_| StorageError::CorruptRecord),
        }
    }

    async fn store<'v, V>(&mut self, key: u8, value: &V) -> Result<(), StorageError>
    where
        V: map::Value<'v>,
    {
        let mut data_buffer = [0u8; DATA_BUFFER_SIZE];
        map::store_item(
            &mut self.flash,
            self.range.clone(),
            &mut self.cache,
            &mut data_buffer,
            &key,
            value,
        )
        .await
        .map_err(|e| {
            warn!("Unable to store diagnostic {}. Error: {:?}", key, Dbg(&e));
            StorageError::SaveError
        })
    }
}

impl<F: NorFlash> FaultLog for DiagnosticsLog<F> {
    async fn record_error(&mut self, subsystem: &str, message: &str) {
        if DiagnosticsLog::record_error(self, subsystem, message)
            .await
            .is_err()
        {
            warn!("Error was not persisted");
        }
    }
}
