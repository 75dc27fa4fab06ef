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

use core::cell::RefCell;
use core::ops::Range;
use embassy_embedded_hal::adapter::BlockingAsync;
use embassy_embedded_hal::flash::partition::BlockingPartition;
use embassy_rp::flash::{self, Flash};
use embassy_rp::peripherals::FLASH;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;

pub const FLASH_SIZE: usize = 2 * 1024 * 1024;

/// Top 256K of flash. Must stay clear of the program image in memory.x.
pub const SAMPLE_LOG_PARTITION: Range<u32> = 0x1C_0000..0x1F_8000;
pub const DIAGNOSTICS_PARTITION: Range<u32> = 0x1F_8000..0x20_0000;

// Ranges below are relative to their partition
pub const SAMPLE_RECORD_RANGE: Range<u32> = 0x0_0000..0x3_4000;
/// Last issued sequence id
pub const SAMPLE_METADATA_RANGE: Range<u32> = 0x3_4000..0x3_8000;
pub const DIAGNOSTICS_RANGE: Range<u32> = 0x0_0000..0x0_8000;

pub type BlockingFlash = Flash<'static, FLASH, flash::Blocking, FLASH_SIZE>;
pub type FlashMutex = Mutex<CriticalSectionRawMutex, RefCell<BlockingFlash>>;
pub type BlockingAsyncPartition =
    BlockingAsync<BlockingPartition<'static, CriticalSectionRawMutex, BlockingFlash>>;

pub fn partition(flash: &'static FlashMutex, range: Range<u32>) -> BlockingAsyncPartition {
    BlockingAsync::new(BlockingPartition::new(flash, range.start, range.len() as u32))
}
