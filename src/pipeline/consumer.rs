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
use crate::pipeline::messaging::SampleQueueReceiver;
use crate::pipeline::{DutyCycle, FaultLog, PipelineConfig, PowerCycle, SampleStore, Uplink};
use crate::storage::diagnostics::describe;
use core::fmt::Debug;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embedded_hal_async::delay::DelayNs;

pub struct SampleConsumer<'a, M: RawMutex, St, Up, G, P, D> {
    queue: SampleQueueReceiver<'a, M>,
    storage: St,
    uplink: Up,
    faults: G,
    power: P,
    delay: D,
    config: PipelineConfig,
    published: u32,
}

impl<'a, M, St, Up, G, P, D> SampleConsumer<'a, M, St, Up, G, P, D>
where
    M: RawMutex,
    St: SampleStore,
    St::Error: Debug,
    Up: Uplink,
    Up::Error: Debug,
    G: FaultLog,
    P: PowerCycle,
    D: DelayNs,
{
    pub fn new(
        queue: SampleQueueReceiver<'a, M>,
        storage: St,
        uplink: Up,
        faults: G,
        power: P,
        delay: D,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            queue,
            storage,
            uplink,
            faults,
            power,
            delay,
            config: *config,
            published: 0,
        }
    }

    pub fn published(&self) -> u32 {
        self.published
    }

    /// Waits for the next sample, stores it and publishes it once the network
    /// is up. Storage or publish failures are logged, recorded as faults and
    /// the sample moves on.
    pub async fn process_next(&mut self) {
        let sample = self.queue.receive().await;

        if let Err(e) = self.storage.buffer(&sample).await {
            warn!("Failed to store sample: {:?}", Dbg(&e));
            self.faults.record_error("storage", &describe(&e)).await;
        }

        self.uplink.wait_for_connection().await;
        match self.uplink.publish(&sample).await {
            Ok(()) => {
                self.published += 1;
                info!("Sample published ({})", sample.health());
            }
            Err(e) => {
                warn!("Failed to publish sample: {:?}", Dbg(&e));
                self.faults.record_error("uplink", &describe(&e)).await;
            }
        }
    }

    /// One pass of the consumer loop. With [`DutyCycle::SleepAfterPublish`]
    /// this does not return.
    pub async fn run_cycle(&mut self) {
        self.process_next().await;
        if self.config.duty_cycle == DutyCycle::SleepAfterPublish {
            self.delay.delay_ms(self.config.publish_settle_ms).await;
            info!("Entering deep sleep");
            match self.power.enter_deep_sleep().await {}
        }
    }

    pub async fn run(&mut self) -> ! {
        loop {
            self.run_cycle().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::messaging::SampleQueue;
    use crate::sim::{SimClock, SimDelay};
    use crate::station::{SensorReadings, UnifiedSample};
    use chrono::NaiveDateTime;
    use core::cell::RefCell;
    use core::convert::Infallible;
    use embassy_futures::block_on;
    use embassy_futures::select::{select, Either};
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;
    use std::rc::Rc;
    use std::vec::Vec;

    type Events = Rc<RefCell<Vec<std::string::String>>>;

    #[derive(Debug)]
    struct Unavailable;

    struct FakeStore {
        events: Events,
        fail: bool,
    }

    impl SampleStore for FakeStore {
        type Error = Unavailable;

        async fn buffer(&mut self, sample: &UnifiedSample) -> Result<(), Unavailable> {
            if self.fail {
                return Err(Unavailable);
            }
            self.events
                .borrow_mut()
                .push(std::format!("store {}", sample.laser_distance_mm()));
            Ok(())
        }
    }

    struct FakeUplink {
        events: Events,
        fail: bool,
    }

    impl Uplink for FakeUplink {
        type Error = Unavailable;

        async fn wait_for_connection(&mut self) {
            self.events.borrow_mut().push("connected".into());
        }

        async fn publish(&mut self, sample: &UnifiedSample) -> Result<(), Unavailable> {
            if self.fail {
                return Err(Unavailable);
            }
            self.events
                .borrow_mut()
                .push(std::format!("publish {}", sample.laser_distance_mm()));
            Ok(())
        }
    }

    struct FakeFaults {
        events: Events,
    }

    impl FaultLog for FakeFaults {
        async fn record_error(&mut self, subsystem: &str, message: &str) {
            self.events
                .borrow_mut()
                .push(std::format!("fault {}: {}", subsystem, message));
        }
    }

    struct FakePower {
        events: Events,
    }

    impl PowerCycle for FakePower {
        async fn enter_deep_sleep(&mut self) -> Infallible {
            self.events.borrow_mut().push("sleep".into());
            core::future::pending().await
        }
    }

    fn sample(laser_distance_mm: u16) -> UnifiedSample {
        UnifiedSample::new(
            SensorReadings {
                ultrasonic_distance_cm: 100.0,
                laser_distance_mm,
                weight_g: 10.0,
            },
            NaiveDateTime::default(),
            3.7,
            20,
        )
    }

    type TestConsumer<'a> =
        SampleConsumer<'a, NoopRawMutex, FakeStore, FakeUplink, FakeFaults, FakePower, SimDelay>;

    fn consumer<'a>(
        queue: &'a SampleQueue<NoopRawMutex>,
        events: &Events,
        delay: SimDelay,
        config: PipelineConfig,
        store_fails: bool,
        publish_fails: bool,
    ) -> TestConsumer<'a> {
        SampleConsumer::new(
            queue.receiver(),
            FakeStore {
                events: events.clone(),
                fail: store_fails,
            },
            FakeUplink {
                events: events.clone(),
                fail: publish_fails,
            },
            FakeFaults {
                events: events.clone(),
            },
            FakePower {
                events: events.clone(),
            },
            delay,
            &config,
        )
    }

    #[test]
    fn samples_are_stored_then_published_in_order() {
        let queue = SampleQueue::<NoopRawMutex>::new();
        let events = Events::default();
        let delay = SimDelay::new(&SimClock::new());
        let config = PipelineConfig {
            duty_cycle: DutyCycle::StayAwake,
            ..PipelineConfig::default()
        };
        let mut consumer = consumer(&queue, &events, delay, config, false, false);

        queue.try_send(sample(1001)).unwrap();
        queue.try_send(sample(1002)).unwrap();
        block_on(consumer.run_cycle());
        block_on(consumer.run_cycle());

        assert_eq!(
            *events.borrow(),
            vec![
                "store 1001", "connected", "publish 1001",
                "store 1002", "connected", "publish 1002",
            ]
        );
        assert_eq!(consumer.published(), 2);
    }

    #[test]
    fn storage_failure_does_not_stop_publishing() {
        let queue = SampleQueue::<NoopRawMutex>::new();
        let events = Events::default();
        let delay = SimDelay::new(&SimClock::new());
        let mut consumer = consumer(&queue, &events, delay, PipelineConfig::default(), true, false);

        queue.try_send(sample(1500)).unwrap();
        block_on(consumer.process_next());

        assert_eq!(
            *events.borrow(),
            vec!["fault storage: Unavailable", "connected", "publish 1500"]
        );
    }

    #[test]
    fn publish_failure_is_recorded() {
        let queue = SampleQueue::<NoopRawMutex>::new();
        let events = Events::default();
        let delay = SimDelay::new(&SimClock::new());
        let mut consumer = consumer(&queue, &events, delay, PipelineConfig::default(), false, true);

        queue.try_send(sample(1600)).unwrap();
        block_on(consumer.process_next());

        assert_eq!(
            *events.borrow(),
            vec!["store 1600", "connected", "fault uplink: Unavailable"]
        );
        assert_eq!(consumer.published(), 0);
    }

    #[test]
    fn publish_is_followed_by_settle_delay_and_sleep() {
        let queue = SampleQueue::<NoopRawMutex>::new();
        let events = Events::default();
        let delay = SimDelay::new(&SimClock::new());
        let mut consumer = consumer(&queue, &events, delay.clone(), PipelineConfig::default(), false, false);

        queue.try_send(sample(1200)).unwrap();
        queue.try_send(sample(1300)).unwrap();
        let outcome = block_on(select(consumer.run_cycle(), core::future::ready(())));
        assert!(matches!(outcome, Either::Second(())));

        assert_eq!(
            *events.borrow(),
            vec!["store 1200", "connected", "publish 1200", "sleep"]
        );
        assert_eq!(delay.async_delays(), vec![200_000]);
        // nothing past the first sample is touched in this wake
        assert_eq!(queue.len(), 1);
    }
}
