#![allow(dead_code)]

use std::cell::Cell;
use std::collections::VecDeque;

use analogsensor::Clock;
use embedded_hal::adc::{Channel, OneShot};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// 12-bit ADC that replays queued conversions, then holds a steady level.
///
/// Every conversion reports `WouldBlock` once before completing, like a
/// converter that is polled for its end-of-conversion flag.
pub struct FakeAdc {
    queued: VecDeque<u16>,
    level: u16,
    converting: bool,
    fail_next: bool,
    pub reads: usize,
}

#[derive(Debug, PartialEq)]
pub struct AdcError;

impl FakeAdc {
    pub fn steady(level: u16) -> Self {
        Self {
            queued: VecDeque::new(),
            level,
            converting: false,
            fail_next: false,
            reads: 0,
        }
    }

    /// Replay `values` in order, then keep returning the last one.
    pub fn scripted(values: &[u16]) -> Self {
        let mut adc = Self::steady(values.last().copied().unwrap_or(0));
        adc.queued.extend(values.iter().copied());
        adc
    }

    pub fn queue(&mut self, value: u16) {
        self.queued.push_back(value);
    }

    pub fn set_level(&mut self, level: u16) {
        self.queued.clear();
        self.level = level;
    }

    pub fn fail_next(&mut self) {
        self.fail_next = true;
    }
}

/// The phototransistor pin.
pub struct Pa0;

impl Channel<FakeAdc> for Pa0 {
    type ID = u8;

    fn channel() -> u8 {
        0
    }
}

impl OneShot<FakeAdc, u16, Pa0> for FakeAdc {
    type Error = AdcError;

    fn read(&mut self, _pin: &mut Pa0) -> nb::Result<u16, AdcError> {
        if self.fail_next {
            self.fail_next = false;
            return Err(nb::Error::Other(AdcError));
        }
        if !self.converting {
            self.converting = true;
            return Err(nb::Error::WouldBlock);
        }
        self.converting = false;
        self.reads += 1;
        Ok(self.queued.pop_front().unwrap_or(self.level))
    }
}

/// Millisecond counter driven by the test.
pub struct TestClock(Cell<u32>);

impl TestClock {
    pub fn at(ms: u32) -> Self {
        TestClock(Cell::new(ms))
    }

    pub fn advance(&self, ms: u32) {
        self.0.set(self.0.get().wrapping_add(ms));
    }
}

impl Clock for TestClock {
    fn now_ms(&self) -> u32 {
        self.0.get()
    }
}
