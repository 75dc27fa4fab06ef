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

use crate::fmt::Dbg;
use crate::pipeline::SampleStore;
use crate::station::UnifiedSample;
use crate::storage::StorageError;
use core::ops::Range;
use embedded_storage_async::nor_flash::{MultiwriteNorFlash, NorFlash};
use sequential_storage::cache::NoCache;
use sequential_storage::{map, queue};

const SEQUENCE_KEY: u8 = 0;

// Must hold the largest item rounded up to the flash word size.
const DATA_BUFFER_SIZE: usize = 64;

/// A sample as it sits in flash, tagged with its sequence id.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleRecord {
    pub sequence: u32,
    pub sample: UnifiedSample,
}

impl SampleRecord {
    pub const ENCODED_LEN: usize = 4 + UnifiedSample::ENCODED_LEN;

    /// Sequence id (u32, little endian) followed by [`UnifiedSample::to_bytes`].
    pub fn to_bytes(&self) -> [u8; Self::ENCODED_LEN] {
        let mut bytes = [0u8; Self::ENCODED_LEN];
        bytes[..4].copy_from_slice(&self.sequence.to_le_bytes());
        bytes[4..].copy_from_slice(&self.sample.to_bytes());
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != Self::ENCODED_LEN {
            return None;
        }
        let sequence = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let mut sample = [0u8; UnifiedSample::ENCODED_LEN];
        sample.copy_from_slice(&bytes[4..]);
        Some(Self {
            sequence,
            sample: UnifiedSample::from_bytes(&sample)?,
        })
    }
}

/// Ring of sample records in one flash region, with the last issued sequence
/// id kept in a second region so numbering carries on across power cycles.
/// Once the record region is full the oldest records are overwritten.
///
/// Ids are never reissued: a record in flash always counts as issued, even
/// when saving the id to the metadata region failed.
pub struct SampleLog<F> {
    flash: F,
    records: Range<u32>,
    metadata: Range<u32>,
    record_cache: NoCache,
    metadata_cache: NoCache,
    next_sequence: u32,
}

impl<F: NorFlash> SampleLog<F> {
    pub async fn open(
        mut flash: F,
        records: Range<u32>,
        metadata: Range<u32>,
    ) -> Result<Self, StorageError> {
        debug!(
            "Sample log: records 0x{:x}..0x{:x}, metadata 0x{:x}..0x{:x}",
            records.start,
            records.end,
            metadata.start,
            metadata.end
        );

        let mut metadata_cache = NoCache::new();
        let mut data_buffer = [0u8; DATA_BUFFER_SIZE];
        let last_sequence: Option<u32> = map::fetch_item(
            &mut flash,
            metadata.clone(),
            &mut metadata_cache,
            &mut data_buffer,
            &SEQUENCE_KEY,
        )
        .await
        .map_err(|e| {
            warn!("Unable to read last sequence id. Error: {:?}", Dbg(&e));
            StorageError::RetrieveError
        })?;

        let mut record_cache = NoCache::new();
        let newest_record =
            Self::newest_record_sequence(&mut flash, records.clone(), &mut record_cache).await?;
        if newest_record > last_sequence {
            warn!(
                "Sequence id {:?} in metadata is behind newest record {:?}",
                last_sequence, newest_record
            );
        }

        let next_sequence = last_sequence
            .max(newest_record)
            .map_or(0, |s| s.wrapping_add(1));
        info!("Sample log open, next sequence id {}", next_sequence);

        Ok(Self {
            flash,
            records,
            metadata,
            record_cache,
            metadata_cache,
            next_sequence,
        })
    }

    /// Sequence id of the last record in the queue, if any.
    async fn newest_record_sequence(
        flash: &mut F,
        records: Range<u32>,
        cache: &mut NoCache,
    ) -> Result<Option<u32>, StorageError> {
        let mut iter = queue::iter(flash, records, cache).await.map_err(|e| {
            warn!("Unable to scan sample records. Error: {:?}", Dbg(&e));
            StorageError::RetrieveError
        })?;

        let mut newest = None;
        let mut data_buffer = [0u8; DATA_BUFFER_SIZE];
        loop {
            let entry = iter.next(&mut data_buffer).await.map_err(|e| {
                warn!("Unable to read sample record. Error: {:?}", Dbg(&e));
                StorageError::RetrieveError
            })?;
            let Some(entry) = entry else {
                break;
            };
            match SampleRecord::from_bytes(&entry) {
                Some(record) => newest = Some(record.sequence),
                None => warn!("Skipping malformed sample record"),
            }
        }
        Ok(newest)
    }

    pub fn next_sequence(&self) -> u32 {
        self.next_sequence
    }

    /// Appends a record and returns the sequence id it was given.
    pub async fn append(&mut self, sample: &UnifiedSample) -> Result<u32, StorageError> {
        let sequence = self.next_sequence;
        let record = SampleRecord {
            sequence,
            sample: *sample,
        };

        queue::push(
            &mut self.flash,
            self.records.clone(),
            &mut self.record_cache,
            &record.to_bytes(),
            true,
        )
        .await
        .map_err(|e| {
            warn!("Unable to store sample record. Error: {:?}", Dbg(&e));
            StorageError::SaveError
        })?;
        self.next_sequence = sequence.wrapping_add(1);

        // The record is stored at this point. A stale id in the metadata is
        // caught up from the records on the next open.
        let mut data_buffer = [0u8; DATA_BUFFER_SIZE];
        if let Err(e) = map::store_item(
            &mut self.flash,
            self.metadata.clone(),
            &mut self.metadata_cache,
            &mut data_buffer,
            &SEQUENCE_KEY,
            &sequence,
        )
        .await
        {
            warn!("Unable to store sequence id {}. Error: {:?}", sequence, Dbg(&e));
        }

        trace!("Stored sample record {}", sequence);
        Ok(sequence)
    }

    /// The oldest record still held, left in place.
    pub async fn oldest(&mut self) -> Result<Option<SampleRecord>, StorageError> {
        let mut data_buffer = [0u8; DATA_BUFFER_SIZE];
        let bytes = queue::peek(
            &mut self.flash,
            self.records.clone(),
            &mut self.record_cache,
            &mut data_buffer,
        )
        .await
        .map_err(|e| {
            warn!("Unable to read sample record. Error: {:?}", Dbg(&e));
            StorageError::RetrieveError
        })?;

        match bytes {
            None => Ok(None),
            Some(bytes) => SampleRecord::from_bytes(bytes)
                .map(Some)
                .ok_or(StorageError::CorruptRecord),
        }
    }

    /// Erases both regions. Numbering restarts from zero.
    pub async fn clear(&mut self) -> Result<(), StorageError> {
        for range in [self.records.clone(), self.metadata.clone()] {
            sequential_storage::erase_all(&mut self.flash, range)
                .await
                .map_err(|e| {
                    warn!("Unable to erase sample log. Error: {:?}", Dbg(&e));
                    StorageError::EraseError
                })?;
        }
        self.next_sequence = 0;
        Ok(())
    }
}

impl<F: MultiwriteNorFlash> SampleLog<F> {
    /// Removes and returns the oldest record.
    pub async fn pop_oldest(&mut self) -> Result<Option<SampleRecord>, StorageError> {
        let mut data_buffer = [0u8; DATA_BUFFER_SIZE];
        let bytes = queue::pop(
            &mut self.flash,
            self.records.clone(),
            &mut self.record_cache,
            &mut data_buffer,
        )
        .await
        .map_err(|e| {
            warn!("Unable to pop sample record. Error: {:?}", Dbg(&e));
            StorageError::RetrieveError
        })?;

        match bytes {
            None => Ok(None),
            Some(bytes) => SampleRecord::from_bytes(bytes)
                .map(Some)
                .ok_or(StorageError::CorruptRecord),
        }
    }
}

impl<F: NorFlash> SampleStore for SampleLog<F> {
    type Error = StorageError;

    async fn buffer(&mut self, sample: &UnifiedSample) -> Result<(), StorageError> {
        self.append(sample).await.map(|_| ())
    }
}
