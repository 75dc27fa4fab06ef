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

use crate::station::UnifiedSample;
use embassy_sync::channel::{Channel, Receiver, Sender};

pub const SAMPLE_QUEUE_DEPTH: usize = 5;

pub type SampleQueue<M> = Channel<M, UnifiedSample, SAMPLE_QUEUE_DEPTH>;
pub type SampleQueueSender<'a, M> = Sender<'a, M, UnifiedSample, SAMPLE_QUEUE_DEPTH>;
pub type SampleQueueReceiver<'a, M> = Receiver<'a, M, UnifiedSample, SAMPLE_QUEUE_DEPTH>;
