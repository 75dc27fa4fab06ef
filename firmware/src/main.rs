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

#![no_std]
#![no_main]

mod clock;
mod housekeeping;
mod power;
mod rtc;
mod storage;

use core::cell::RefCell;
use crate::clock::EmbassyClock;
use crate::housekeeping::AdcHousekeeping;
use crate::power::RtcPowerCycle;
use crate::rtc::accessor::RtcAccessor;
use crate::rtc::RtcControl;
use crate::storage::{
    partition, BlockingAsyncPartition, FlashMutex, DIAGNOSTICS_PARTITION, DIAGNOSTICS_RANGE,
    FLASH_SIZE, SAMPLE_LOG_PARTITION, SAMPLE_METADATA_RANGE, SAMPLE_RECORD_RANGE,
};
use assign_resources::assign_resources;
use defmt::{error, info, warn, Debug2Format};
use ds323x::Ds323x;
use embassy_executor::Spawner;
use embassy_rp::adc::{self, Adc};
use embassy_rp::flash::{self, Flash};
use embassy_rp::gpio::{Input, Level, Output, Pull};
use embassy_rp::i2c::{self, I2c};
use embassy_rp::peripherals::{I2C0, I2C1, UART0};
use embassy_rp::uart::{self, BufferedUartTx};
use embassy_rp::{bind_interrupts, peripherals, Peri};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_time::{with_timeout, Delay, Duration};
use snowgauge::laser::vl53l0x::Vl53l0x;
use snowgauge::pipeline::consumer::SampleConsumer;
use snowgauge::pipeline::messaging::SampleQueue;
use snowgauge::pipeline::producer::SampleProducer;
use snowgauge::pipeline::{DutyCycle, FaultLog, PipelineConfig, PowerCycle};
use snowgauge::station::SensorAggregator;
use snowgauge::storage::diagnostics::{describe, DiagnosticText};
use snowgauge::storage::{DiagnosticsLog, SampleLog};
use snowgauge::telemetry::ModemUplink;
use snowgauge::ultrasonic::hcsr04p::Hcsr04p;
use snowgauge::weight::interface::hx711::Hx711;
use snowgauge::weight::weight::WeightScale;
use snowgauge::StationConfig;
use static_cell::StaticCell;
#[allow(unused_imports)]
use {defmt_rtt as _, panic_probe as _};

mod built_info {
    // The file has been placed there by the build script.
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

/// Time between wakes
const SLEEP_SECS: u32 = 30;
const RTC_FIRST_READ_TIMEOUT: Duration = Duration::from_secs(2);
const MODEM_BAUD: u32 = 115_200;

#[cfg(feature = "stay_awake")]
const DUTY_CYCLE: DutyCycle = DutyCycle::StayAwake;
#[cfg(not(feature = "stay_awake"))]
const DUTY_CYCLE: DutyCycle = DutyCycle::SleepAfterPublish;

static SAMPLE_QUEUE: SampleQueue<CriticalSectionRawMutex> = SampleQueue::new();
static MODEM_TX_BUFFER: StaticCell<[u8; 256]> = StaticCell::new();
static FLASH_MUTEX: StaticCell<FlashMutex> = StaticCell::new();

assign_resources! {
    ultrasonic: UltrasonicResources {
        trigger_pin: PIN_12,
        echo_pin: PIN_13,
    },
    strain_gauge_io: StrainGaugeResources {
        clk_pin: PIN_14,
        data_pin: PIN_15,
    },
    laser_i2c: LaserI2cPins {
        sda_pin: PIN_4,
        scl_pin: PIN_5,
        i2c_peripheral: I2C0,
    },
    rtc_i2c: RtcI2cPins {
        sda_pin: PIN_2,
        scl_pin: PIN_3,
        i2c_peripheral: I2C1,
    },
    modem: ModemResources {
        uart: UART0,
        tx_pin: PIN_0,
        link_ready_pin: PIN_6,
    },
    housekeeping: HousekeepingResources {
        adc: ADC,
        vsys_pin: PIN_29,
        temp_sensor: ADC_TEMP_SENSOR,
    },
    power: PowerResources {
        hold_pin: PIN_22,
    },
    storage: StorageResources {
        flash: FLASH,
    },
}

bind_interrupts!(struct Irqs {
    ADC_IRQ_FIFO => adc::InterruptHandler;
    I2C0_IRQ => i2c::InterruptHandler<I2C0>;
    I2C1_IRQ => i2c::InterruptHandler<I2C1>;
    UART0_IRQ => uart::BufferedInterruptHandler<UART0>;
});

type Ultrasonic = Hcsr04p<Output<'static>, Input<'static>, EmbassyClock, Delay>;
type LoadCell = WeightScale<Hx711<Output<'static>, Input<'static>, Delay>, Delay>;
type Laser = Vl53l0x<I2c<'static, I2C0, i2c::Async>, Delay>;
type Station = SensorAggregator<Ultrasonic, LoadCell, Laser, AdcHousekeeping, RtcAccessor>;
type Modem = ModemUplink<BufferedUartTx, Input<'static>>;

type Producer = SampleProducer<'static, CriticalSectionRawMutex, Station, Delay>;
type Consumer = SampleConsumer<
    'static,
    CriticalSectionRawMutex,
    SampleLog<BlockingAsyncPartition>,
    Modem,
    DiagnosticsLog<BlockingAsyncPartition>,
    RtcPowerCycle,
    Delay,
>;

#[embassy_executor::main]
async fn main(spawner: Spawner) -> ! {
    let p = embassy_rp::init(Default::default());
    let resources = split_resources!(p);

    // Keep the supply latched before anything slow happens
    let power_hold = Output::new(resources.power.hold_pin, Level::High);

    let dirty_indicator = if built_info::GIT_DIRTY.unwrap_or(true) {
        "+"
    } else {
        ""
    };
    info!(
        "{} v{} {}{}",
        built_info::PKG_NAME,
        built_info::PKG_VERSION,
        built_info::GIT_COMMIT_HASH_SHORT.unwrap_or("unknown"),
        dirty_indicator
    );

    spawner.spawn(rtc_task(resources.rtc_i2c).expect("rtc task"));

    let mut sample_time = RtcAccessor::new().expect("RTC receiver for samples");
    if with_timeout(RTC_FIRST_READ_TIMEOUT, sample_time.wait_for_next_second())
        .await
        .is_err()
    {
        warn!("No time from RTC, samples will carry the epoch");
    }

    let mut power = RtcPowerCycle::new(
        RtcAccessor::new().expect("RTC receiver for power cycle"),
        power_hold,
        SLEEP_SECS,
    );

    let flash: &'static FlashMutex = FLASH_MUTEX.init(Mutex::new(RefCell::new(
        Flash::<_, flash::Blocking, FLASH_SIZE>::new_blocking(resources.storage.flash),
    )));

    let mut diagnostics =
        match DiagnosticsLog::open(partition(flash, DIAGNOSTICS_PARTITION), DIAGNOSTICS_RANGE).await {
            Ok(diagnostics) => diagnostics,
            Err(e) => {
                error!("Diagnostics unavailable: {}", e);
                match power.enter_deep_sleep().await {}
            }
        };
    if let Err(e) = diagnostics.record_event("boot").await {
        warn!("Boot event not recorded: {}", e);
    }

    let station = match init_station(
        resources.ultrasonic,
        resources.strain_gauge_io,
        resources.laser_i2c,
        resources.housekeeping,
        sample_time,
    )
    .await
    {
        Ok(station) => station,
        Err(reason) => {
            FaultLog::record_error(&mut diagnostics, "station", &reason).await;
            match power.enter_deep_sleep().await {}
        }
    };

    let sample_log = match SampleLog::open(
        partition(flash, SAMPLE_LOG_PARTITION),
        SAMPLE_RECORD_RANGE,
        SAMPLE_METADATA_RANGE,
    )
    .await
    {
        Ok(log) => log,
        Err(e) => {
            FaultLog::record_error(&mut diagnostics, "storage", &describe(&e)).await;
            match power.enter_deep_sleep().await {}
        }
    };

    let modem = init_modem(resources.modem);

    let pipeline_config = PipelineConfig {
        duty_cycle: DUTY_CYCLE,
        ..PipelineConfig::default()
    };
    info!("Duty cycle: {}", pipeline_config.duty_cycle);

    let producer = SampleProducer::new(station, SAMPLE_QUEUE.sender(), Delay, &pipeline_config);
    let consumer = SampleConsumer::new(
        SAMPLE_QUEUE.receiver(),
        sample_log,
        modem,
        diagnostics,
        power,
        Delay,
        &pipeline_config,
    );

    spawner.spawn(consumer_task(consumer).expect("consumer task"));
    spawner.spawn(producer_task(producer).expect("producer task"));

    loop {
        embassy_time::Timer::after_secs(60).await;
    }
}

async fn init_station(
    ultrasonic: UltrasonicResources,
    strain_gauge_io: StrainGaugeResources,
    laser_i2c: LaserI2cPins,
    housekeeping: HousekeepingResources,
    time: RtcAccessor,
) -> Result<Station, DiagnosticText> {
    let ultrasonic = Hcsr04p::new(
        Output::new(ultrasonic.trigger_pin, Level::Low),
        Input::new(ultrasonic.echo_pin, Pull::None),
        EmbassyClock,
        Delay,
    );

    let config = StationConfig::default();
    let strain_gauge = Hx711::new(
        Output::new(strain_gauge_io.clk_pin, Level::Low),
        Input::new(strain_gauge_io.data_pin, Pull::None),
        Delay,
        config.load_cell_gain,
    );
    let scale = WeightScale::new(strain_gauge, Delay);

    let i2c = I2c::new_async(
        laser_i2c.i2c_peripheral,
        laser_i2c.scl_pin,
        laser_i2c.sda_pin,
        Irqs,
        i2c::Config::default(),
    );
    let laser = Vl53l0x::new(i2c, Delay, config.laser_address);

    let adc = Adc::new(housekeeping.adc, Irqs, adc::Config::default());
    let housekeeping = AdcHousekeeping::new(
        adc,
        adc::Channel::new_pin(housekeeping.vsys_pin, Pull::None),
        adc::Channel::new_temp_sensor(housekeeping.temp_sensor),
    );

    SensorAggregator::init(ultrasonic, scale, laser, housekeeping, time, config)
        .await
        .map_err(|e| {
            error!("Station init failed: {}", Debug2Format(&e));
            describe(&e)
        })
}

fn init_modem(modem: ModemResources) -> Modem {
    let mut config = uart::Config::default();
    config.baudrate = MODEM_BAUD;
    let tx_buffer = &mut MODEM_TX_BUFFER.init([0; 256])[..];
    let tx = BufferedUartTx::new(modem.uart, modem.tx_pin, Irqs, tx_buffer, config);
    ModemUplink::new(tx, Input::new(modem.link_ready_pin, Pull::Down))
}

#[embassy_executor::task]
async fn rtc_task(rtc_i2c_pins: RtcI2cPins) {
    let i2c = I2c::new_async(
        rtc_i2c_pins.i2c_peripheral,
        rtc_i2c_pins.scl_pin,
        rtc_i2c_pins.sda_pin,
        Irqs,
        i2c::Config::default(),
    );
    let mut rtc_control = RtcControl::new(Ds323x::new_ds3231(i2c));
    rtc_control.run().await;
}

#[embassy_executor::task]
async fn producer_task(mut producer: Producer) {
    producer.run().await;
}

#[embassy_executor::task]
async fn consumer_task(mut consumer: Consumer) {
    consumer.run().await;
}
