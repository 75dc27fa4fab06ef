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

//! Acquisition to publish pipeline.
//!
//! The [`producer::SampleProducer`] samples the station on a fixed period into
//! a bounded [`messaging::SampleQueue`]; the [`consumer::SampleConsumer`]
//! stores, publishes and then puts the station to sleep.

pub mod consumer;
pub mod messaging;
pub mod producer;

use crate::station::UnifiedSample;
use core::convert::Infallible;

pub trait SampleSource {
    async fn read_all(&mut self) -> UnifiedSample;
}

/// Durable storage for samples awaiting upload.
pub trait SampleStore {
    type Error;

    async fn buffer(&mut self, sample: &UnifiedSample) -> Result<(), Self::Error>;
}

pub trait Uplink {
    type Error;

    /// Resolves once the network can accept a publish. No timeout.
    async fn wait_for_connection(&mut self);

    async fn publish(&mut self, sample: &UnifiedSample) -> Result<(), Self::Error>;
}

/// Persistent record of failures, kept across power cycles.
pub trait FaultLog {
    async fn record_error(&mut self, subsystem: &str, message: &str);
}

pub trait PowerCycle {
    /// Powers the station down until the next wake. Never returns.
    async fn enter_deep_sleep(&mut self) -> Infallible;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DutyCycle {
    /// Publish one sample per wake, then sleep
    SleepAfterPublish,
    /// Keep consuming samples without sleeping
    StayAwake,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    pub sample_period_ms: u32,
    /// Lets the uplink drain before power is removed
    pub publish_settle_ms: u32,
    pub duty_cycle: DutyCycle,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample_period_ms: 1_000,
            publish_settle_ms: 200,
            duty_cycle: DutyCycle::SleepAfterPublish,
        }
    }
}
