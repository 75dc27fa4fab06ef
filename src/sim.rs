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

//! Simulated hardware for the host tests.

use crate::poll::Clock;
use core::cell::{Cell, RefCell};
use core::convert::Infallible;
use embedded_hal::digital::{ErrorType, InputPin, OutputPin};
use embedded_hal_async::i2c::Operation;
use embedded_storage_async::nor_flash::{
    ErrorType as FlashErrorType, MultiwriteNorFlash, NorFlash, NorFlashError, NorFlashErrorKind,
    ReadNorFlash,
};
use std::collections::VecDeque;
use std::rc::Rc;
use std::vec::Vec;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Microsecond clock that moves forward by one tick every time it is read, so
/// busy-wait loops always make progress.
#[derive(Clone, Default)]
pub struct SimClock {
    now: Rc<Cell<u64>>,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current time without advancing it.
    pub fn peek(&self) -> u64 {
        self.now.get()
    }

    pub fn advance(&self, micros: u64) {
        self.now.set(self.now.get() + micros);
    }
}

impl Clock for SimClock {
    fn now_micros(&self) -> u64 {
        let now = self.now.get();
        self.now.set(now + 1);
        now
    }
}

/// Both flavours of `DelayNs`, advancing the shared clock instead of sleeping.
#[derive(Clone)]
pub struct SimDelay {
    clock: SimClock,
    async_delays: Rc<RefCell<Vec<u64>>>,
}

impl SimDelay {
    pub fn new(clock: &SimClock) -> Self {
        Self {
            clock: clock.clone(),
            async_delays: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Every async sleep taken so far, in microseconds.
    pub fn async_delays(&self) -> Vec<u64> {
        self.async_delays.borrow().clone()
    }

    fn ns_to_us(ns: u32) -> u64 {
        (ns as u64).div_ceil(1000)
    }
}

impl embedded_hal::delay::DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.clock.advance(Self::ns_to_us(ns));
    }
}

impl embedded_hal_async::delay::DelayNs for SimDelay {
    async fn delay_ns(&mut self, ns: u32) {
        let us = Self::ns_to_us(ns);
        self.clock.advance(us);
        self.async_delays.borrow_mut().push(us);
    }

    async fn delay_us(&mut self, us: u32) {
        self.clock.advance(us as u64);
        self.async_delays.borrow_mut().push(us as u64);
    }

    async fn delay_ms(&mut self, ms: u32) {
        let us = ms as u64 * 1000;
        self.clock.advance(us);
        self.async_delays.borrow_mut().push(us);
    }
}

/// Input that reads high for `[rise, fall)` on the simulated clock.
pub struct SimLevelPin {
    clock: SimClock,
    rise: u64,
    fall: u64,
}

impl SimLevelPin {
    pub fn high_between(clock: &SimClock, rise: u64, fall: u64) -> Self {
        Self {
            clock: clock.clone(),
            rise,
            fall,
        }
    }
}

impl ErrorType for SimLevelPin {
    type Error = Infallible;
}

impl InputPin for SimLevelPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        let now = self.clock.peek();
        Ok(now >= self.rise && now < self.fall)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.is_high().map(|high| !high)
    }
}

struct UltrasonicState {
    trigger_high_since: Option<u64>,
    trigger_pulses: Vec<u64>,
    last_trigger_fall: Option<u64>,
    echo_delay_us: Option<u64>,
    echo_width_us: u64,
}

/// HC-SR04P style module: the echo line answers each trigger pulse after a
/// configurable delay and stays high for the configured width.
#[derive(Clone)]
pub struct SimUltrasonic {
    clock: SimClock,
    state: Rc<RefCell<UltrasonicState>>,
}

impl SimUltrasonic {
    pub fn new(clock: &SimClock) -> Self {
        Self {
            clock: clock.clone(),
            state: Rc::new(RefCell::new(UltrasonicState {
                trigger_high_since: None,
                trigger_pulses: Vec::new(),
                last_trigger_fall: None,
                echo_delay_us: Some(200),
                echo_width_us: 0,
            })),
        }
    }

    pub fn set_echo(&self, delay_us: Option<u64>, width_us: u64) {
        let mut state = self.state.borrow_mut();
        state.echo_delay_us = delay_us;
        state.echo_width_us = width_us;
    }

    /// Widths of the trigger pulses seen so far.
    pub fn trigger_pulses(&self) -> Vec<u64> {
        self.state.borrow().trigger_pulses.clone()
    }

    pub fn trigger_pin(&self) -> SimTriggerPin {
        SimTriggerPin { sim: self.clone() }
    }

    pub fn echo_pin(&self) -> SimEchoPin {
        SimEchoPin { sim: self.clone() }
    }
}

pub struct SimTriggerPin {
    sim: SimUltrasonic,
}

impl ErrorType for SimTriggerPin {
    type Error = Infallible;
}

impl OutputPin for SimTriggerPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        let now = self.sim.clock.peek();
        let mut state = self.sim.state.borrow_mut();
        if let Some(since) = state.trigger_high_since.take() {
            state.trigger_pulses.push(now - since);
            state.last_trigger_fall = Some(now);
        }
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        let now = self.sim.clock.peek();
        let mut state = self.sim.state.borrow_mut();
        if state.trigger_high_since.is_none() {
            state.trigger_high_since = Some(now);
        }
        Ok(())
    }
}

pub struct SimEchoPin {
    sim: SimUltrasonic,
}

impl ErrorType for SimEchoPin {
    type Error = Infallible;
}

impl InputPin for SimEchoPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        let now = self.sim.clock.peek();
        let state = self.sim.state.borrow();
        Ok(match (state.last_trigger_fall, state.echo_delay_us) {
            (Some(fall), Some(delay)) => {
                let rise = fall + delay;
                now >= rise && now < rise + state.echo_width_us
            }
            _ => false,
        })
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.is_high().map(|high| !high)
    }
}

const HX711_DATA_BITS: u32 = 24;

struct Hx711State {
    available: bool,
    clock_high: bool,
    rising_edges: u32,
    shift_index: u32,
    extra_pulses: u32,
    output_bit: bool,
    word: u32,
    values: VecDeque<i32>,
}

impl Hx711State {
    fn load_next(&mut self) {
        let value = if self.values.len() > 1 {
            self.values.pop_front().unwrap_or(0)
        } else {
            self.values.front().copied().unwrap_or(0)
        };
        self.word = (value as u32) & 0x00FF_FFFF;
    }
}

/// HX711 shift register. Conversions are taken from a queue, the last one
/// repeating once the queue runs dry.
#[derive(Clone)]
pub struct SimHx711 {
    state: Rc<RefCell<Hx711State>>,
}

impl SimHx711 {
    pub fn new(values: &[i32]) -> Self {
        let mut state = Hx711State {
            available: true,
            clock_high: false,
            rising_edges: 0,
            shift_index: 0,
            extra_pulses: 0,
            output_bit: true,
            word: 0,
            values: values.iter().copied().collect(),
        };
        state.load_next();
        Self {
            state: Rc::new(RefCell::new(state)),
        }
    }

    pub fn push_values(&self, values: &[i32]) {
        let mut state = self.state.borrow_mut();
        state.values.clear();
        state.values.extend(values.iter().copied());
        state.load_next();
    }

    pub fn set_available(&self, available: bool) {
        self.state.borrow_mut().available = available;
    }

    pub fn rising_edges(&self) -> u32 {
        self.state.borrow().rising_edges
    }

    /// Gain selection pulses following the most recent conversion.
    pub fn extra_pulses(&self) -> u32 {
        self.state.borrow().extra_pulses
    }

    pub fn clock_is_high(&self) -> bool {
        self.state.borrow().clock_high
    }

    pub fn clock_pin(&self) -> SimHx711Clock {
        SimHx711Clock { sim: self.clone() }
    }

    pub fn data_pin(&self) -> SimHx711Data {
        SimHx711Data { sim: self.clone() }
    }
}

pub struct SimHx711Clock {
    sim: SimHx711,
}

impl ErrorType for SimHx711Clock {
    type Error = Infallible;
}

impl OutputPin for SimHx711Clock {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.sim.state.borrow_mut().clock_high = false;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        let mut state = self.sim.state.borrow_mut();
        if state.clock_high {
            return Ok(());
        }
        state.clock_high = true;
        state.rising_edges += 1;
        if state.shift_index < HX711_DATA_BITS {
            let bit = HX711_DATA_BITS - 1 - state.shift_index;
            state.output_bit = (state.word >> bit) & 1 == 1;
            state.shift_index += 1;
            if state.shift_index == HX711_DATA_BITS {
                state.extra_pulses = 0;
                state.load_next();
            }
        } else {
            state.output_bit = true;
            state.extra_pulses += 1;
        }
        Ok(())
    }
}

pub struct SimHx711Data {
    sim: SimHx711,
}

impl ErrorType for SimHx711Data {
    type Error = Infallible;
}

impl InputPin for SimHx711Data {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        let mut state = self.sim.state.borrow_mut();
        if state.clock_high {
            return Ok(state.output_bit);
        }
        // clock low: a readiness check. A finished shift moves on to the next
        // conversion, a partial one (stray edge while powering down) is dropped.
        if state.shift_index != 0 {
            state.shift_index = 0;
        }
        Ok(!(state.available && state.shift_index == 0))
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.is_high().map(|high| !high)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimBusError {
    Nack,
    Injected,
}

impl embedded_hal::i2c::Error for SimBusError {
    fn kind(&self) -> embedded_hal::i2c::ErrorKind {
        match self {
            SimBusError::Nack => embedded_hal::i2c::ErrorKind::NoAcknowledge(
                embedded_hal::i2c::NoAcknowledgeSource::Address,
            ),
            SimBusError::Injected => embedded_hal::i2c::ErrorKind::Other,
        }
    }
}

pub const SIM_RANGING_ID_REG: u8 = 0xC0;
const SIM_RANGING_START_REG: u8 = 0x00;
const SIM_RANGING_CLEAR_REG: u8 = 0x0B;
const SIM_RANGING_STATUS_REG: u8 = 0x13;
const SIM_RANGING_RESULT_REG: u8 = 0x14 + 10;

struct RangingState {
    address: u8,
    registers: [u8; 256],
    pointer: u8,
    writes: Vec<(u8, u8)>,
    fail_writes_to: Option<u8>,
    stalled: bool,
    status_polls_until_ready: u32,
    measurement_latency: u32,
    status_reads: u32,
}

impl RangingState {
    fn write(&mut self, bytes: &[u8]) -> Result<(), SimBusError> {
        let Some((&reg, data)) = bytes.split_first() else {
            return Ok(());
        };
        self.pointer = reg;
        for (i, &value) in data.iter().enumerate() {
            let target = reg.wrapping_add(i as u8);
            if self.fail_writes_to == Some(target) {
                return Err(SimBusError::Injected);
            }
            self.registers[target as usize] = value;
            self.writes.push((target, value));
            if target == SIM_RANGING_START_REG && value == 0x01 {
                self.status_polls_until_ready = self.measurement_latency;
                self.registers[SIM_RANGING_STATUS_REG as usize] = 0;
            }
            if target == SIM_RANGING_CLEAR_REG {
                self.registers[SIM_RANGING_STATUS_REG as usize] = 0;
            }
        }
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) {
        if self.pointer == SIM_RANGING_STATUS_REG {
            self.status_reads += 1;
            if self.status_polls_until_ready > 0 {
                self.status_polls_until_ready -= 1;
                if self.status_polls_until_ready == 0 {
                    self.registers[SIM_RANGING_STATUS_REG as usize] = 0x07;
                }
            }
        }
        for (i, byte) in buf.iter_mut().enumerate() {
            *byte = self.registers[self.pointer.wrapping_add(i as u8) as usize];
        }
    }
}

/// VL53L0X register file behind an async I2C bus.
#[derive(Clone)]
pub struct SimRangingBus {
    state: Rc<RefCell<RangingState>>,
}

impl SimRangingBus {
    pub fn new(address: u8) -> Self {
        let mut registers = [0u8; 256];
        registers[SIM_RANGING_ID_REG as usize] = 0xEE;
        Self {
            state: Rc::new(RefCell::new(RangingState {
                address,
                registers,
                pointer: 0,
                writes: Vec::new(),
                fail_writes_to: None,
                stalled: false,
                status_polls_until_ready: 0,
                measurement_latency: 3,
                status_reads: 0,
            })),
        }
    }

    pub fn set_register(&self, reg: u8, value: u8) {
        self.state.borrow_mut().registers[reg as usize] = value;
    }

    pub fn register(&self, reg: u8) -> u8 {
        self.state.borrow().registers[reg as usize]
    }

    pub fn set_range_mm(&self, mm: u16) {
        let [high, low] = mm.to_be_bytes();
        let mut state = self.state.borrow_mut();
        state.registers[SIM_RANGING_RESULT_REG as usize] = high;
        state.registers[SIM_RANGING_RESULT_REG as usize + 1] = low;
    }

    pub fn set_measurement_latency(&self, status_polls: u32) {
        self.state.borrow_mut().measurement_latency = status_polls;
    }

    pub fn fail_writes_to(&self, reg: Option<u8>) {
        self.state.borrow_mut().fail_writes_to = reg;
    }

    pub fn set_stalled(&self, stalled: bool) {
        self.state.borrow_mut().stalled = stalled;
    }

    pub fn writes(&self) -> Vec<(u8, u8)> {
        self.state.borrow().writes.clone()
    }

    pub fn clear_writes(&self) {
        self.state.borrow_mut().writes.clear();
    }

    pub fn status_reads(&self) -> u32 {
        self.state.borrow().status_reads
    }
}

impl embedded_hal_async::i2c::ErrorType for SimRangingBus {
    type Error = SimBusError;
}

impl embedded_hal_async::i2c::I2c for SimRangingBus {
    async fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        if self.state.borrow().stalled {
            core::future::pending::<()>().await;
        }
        let mut state = self.state.borrow_mut();
        if address != state.address {
            return Err(SimBusError::Nack);
        }
        for operation in operations.iter_mut() {
            match operation {
                Operation::Write(bytes) => state.write(bytes)?,
                Operation::Read(buf) => state.read(buf),
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RamFlashError {
    OutOfBounds,
    NotAligned,
    WriteProtected,
}

impl NorFlashError for RamFlashError {
    fn kind(&self) -> NorFlashErrorKind {
        match self {
            RamFlashError::OutOfBounds => NorFlashErrorKind::OutOfBounds,
            RamFlashError::NotAligned => NorFlashErrorKind::NotAligned,
            RamFlashError::WriteProtected => NorFlashErrorKind::Other,
        }
    }
}

/// NOR flash in RAM: erased bytes read 0xFF and writes can only clear bits.
#[derive(Clone)]
pub struct RamFlash {
    bytes: Rc<RefCell<Vec<u8>>>,
    protected_from: Rc<Cell<Option<u32>>>,
}

impl RamFlash {
    pub const PAGE_SIZE: usize = 4096;

    pub fn new(pages: usize) -> Self {
        Self {
            bytes: Rc::new(RefCell::new(std::vec![0xFF; pages * Self::PAGE_SIZE])),
            protected_from: Rc::new(Cell::new(None)),
        }
    }

    /// Writes at or above `offset` fail until this is called with `None`.
    pub fn protect_from(&self, offset: Option<u32>) {
        self.protected_from.set(offset);
    }

    fn check(&self, offset: u32, len: usize, align: usize) -> Result<(), RamFlashError> {
        if offset as usize + len > self.bytes.borrow().len() {
            return Err(RamFlashError::OutOfBounds);
        }
        if offset as usize % align != 0 || len % align != 0 {
            return Err(RamFlashError::NotAligned);
        }
        Ok(())
    }
}

impl FlashErrorType for RamFlash {
    type Error = RamFlashError;
}

impl ReadNorFlash for RamFlash {
    const READ_SIZE: usize = 1;

    async fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        self.check(offset, bytes.len(), Self::READ_SIZE)?;
        let start = offset as usize;
        bytes.copy_from_slice(&self.bytes.borrow()[start..start + bytes.len()]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.bytes.borrow().len()
    }
}

impl NorFlash for RamFlash {
    const WRITE_SIZE: usize = 4;
    const ERASE_SIZE: usize = Self::PAGE_SIZE;

    async fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        if to < from {
            return Err(RamFlashError::OutOfBounds);
        }
        self.check(from, (to - from) as usize, Self::ERASE_SIZE)?;
        self.bytes.borrow_mut()[from as usize..to as usize].fill(0xFF);
        Ok(())
    }

    async fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        self.check(offset, bytes.len(), Self::WRITE_SIZE)?;
        if self.protected_from.get().is_some_and(|from| offset >= from) {
            return Err(RamFlashError::WriteProtected);
        }
        let start = offset as usize;
        let mut flash = self.bytes.borrow_mut();
        for (cell, byte) in flash[start..start + bytes.len()].iter_mut().zip(bytes) {
            *cell &= *byte;
        }
        Ok(())
    }
}

impl MultiwriteNorFlash for RamFlash {}

/// Link-ready line that is always asserted.
#[derive(Clone, Default)]
pub struct SimLinkReady {
    waits: Rc<Cell<u32>>,
}

impl SimLinkReady {
    pub fn waits(&self) -> u32 {
        self.waits.get()
    }
}

impl ErrorType for SimLinkReady {
    type Error = Infallible;
}

impl embedded_hal_async::digital::Wait for SimLinkReady {
    async fn wait_for_high(&mut self) -> Result<(), Self::Error> {
        self.waits.set(self.waits.get() + 1);
        Ok(())
    }

    async fn wait_for_low(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    async fn wait_for_rising_edge(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    async fn wait_for_falling_edge(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    async fn wait_for_any_edge(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Byte stream collecting everything written to it.
#[derive(Clone, Default)]
pub struct SinkWriter {
    bytes: Rc<RefCell<Vec<u8>>>,
}

impl SinkWriter {
    pub fn contents(&self) -> std::string::String {
        std::string::String::from_utf8_lossy(&self.bytes.borrow()).into_owned()
    }
}

impl embedded_io_async::ErrorType for SinkWriter {
    type Error = Infallible;
}

impl embedded_io_async::Write for SinkWriter {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.bytes.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }
}
