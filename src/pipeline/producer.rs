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

use crate::pipeline::messaging::SampleQueueSender;
use crate::pipeline::{PipelineConfig, SampleSource};
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::TrySendError;
use embedded_hal_async::delay::DelayNs;

pub struct SampleProducer<'a, M: RawMutex, S, D> {
    source: S,
    queue: SampleQueueSender<'a, M>,
    delay: D,
    sample_period_ms: u32,
    dropped_samples: u32,
}

impl<'a, M, S, D> SampleProducer<'a, M, S, D>
where
    M: RawMutex,
    S: SampleSource,
    D: DelayNs,
{
    pub fn new(source: S, queue: SampleQueueSender<'a, M>, delay: D, config: &PipelineConfig) -> Self {
        Self {
            source,
            queue,
            delay,
            sample_period_ms: config.sample_period_ms,
            dropped_samples: 0,
        }
    }

    pub fn dropped_samples(&self) -> u32 {
        self.dropped_samples
    }

    /// Takes one sample and offers it to the queue without waiting. Returns
    /// whether the sample was queued.
    pub async fn sample_once(&mut self) -> bool {
        let sample = self.source.read_all().await;
        match self.queue.try_send(sample) {
            Ok(()) => {
                trace!("Sample queued");
                true
            }
            Err(TrySendError::Full(_)) => {
                self.dropped_samples = self.dropped_samples.saturating_add(1);
                warn!(
                    "Sample queue full, dropping sample ({} dropped)",
                    self.dropped_samples
                );
                false
            }
        }
    }

    pub async fn run(&mut self) -> ! {
        loop {
            self.sample_once().await;
            self.delay.delay_ms(self.sample_period_ms).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::messaging::{SampleQueue, SAMPLE_QUEUE_DEPTH};
    use crate::sim::{SimClock, SimDelay};
    use crate::station::{SensorReadings, UnifiedSample};
    use chrono::NaiveDateTime;
    use embassy_futures::block_on;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;

    struct CountingSource {
        taken: u32,
    }

    impl SampleSource for CountingSource {
        async fn read_all(&mut self) -> UnifiedSample {
            self.taken += 1;
            UnifiedSample::new(
                SensorReadings {
                    ultrasonic_distance_cm: self.taken as f32,
                    laser_distance_mm: 1000,
                    weight_g: 0.0,
                },
                NaiveDateTime::default(),
                3.7,
                20,
            )
        }
    }

    #[test]
    fn full_queue_drops_without_blocking() {
        let queue = SampleQueue::<NoopRawMutex>::new();
        let clock = SimClock::new();
        let mut producer = SampleProducer::new(
            CountingSource { taken: 0 },
            queue.sender(),
            SimDelay::new(&clock),
            &PipelineConfig::default(),
        );

        for _ in 0..SAMPLE_QUEUE_DEPTH {
            assert!(block_on(producer.sample_once()));
        }
        assert_eq!(producer.dropped_samples(), 0);

        assert!(!block_on(producer.sample_once()));
        assert!(!block_on(producer.sample_once()));
        assert_eq!(producer.dropped_samples(), 2);
        assert_eq!(queue.len(), SAMPLE_QUEUE_DEPTH);

        // oldest samples are the ones kept
        assert_eq!(queue.try_receive().unwrap().ultrasonic_distance_cm(), 1.0);
    }
}
