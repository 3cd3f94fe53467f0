//! Sliding-window history of one analog channel.
//!
//! Index 0 of the window is always the latest reading, the last index the
//! oldest one still kept. All statistics are recomputed from the window on
//! every call.

use embedded_hal::adc::{Channel, OneShot};
use heapless::{String, Vec};
use log::{debug, trace};

use crate::clock::{elapsed_ms, Clock};
use crate::config::SensorConfig;
use crate::error::Error;

/// Capacity of a sensor name in bytes.
pub const NAME_LEN: usize = 16;

pub type Name = String<NAME_LEN>;

/// Which threshold checks currently fire.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Firing {
    pub by_pct: bool,
    pub by_avg_dev: bool,
    pub by_delta: bool,
}

impl Firing {
    pub fn any(&self) -> bool {
        self.by_pct || self.by_avg_dev || self.by_delta
    }
}

/// Snapshot of every derived statistic, e.g. for a log line.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Stats {
    pub last: i32,
    pub average: i32,
    pub min: i32,
    pub max: i32,
    pub average_deviation: i32,
    pub variance: i32,
    /// `None` while the average is 0.
    pub percent_of_average: Option<i32>,
    pub delta: i32,
    pub last_delta: i32,
    pub firing: Firing,
}

/// Most-recent-first history of an analog channel with firing thresholds.
///
/// `N` is the size of the sample buffer; the configured `sample_count` may be
/// anything in `1..=N`.
pub struct AnalogSensor<PIN, const N: usize> {
    name: Name,
    pin: PIN,
    config: SensorConfig,
    samples: Vec<i32, N>,
    last_sample_at: u32,
}

fn read_channel<ADC, A, W, PIN>(adc: &mut A, pin: &mut PIN) -> Result<i32, Error<A::Error>>
where
    PIN: Channel<ADC>,
    A: OneShot<ADC, W, PIN>,
    W: Into<i32>,
{
    nb::block!(adc.read(pin)).map(Into::into).map_err(Error::Read)
}

impl<PIN, const N: usize> AnalogSensor<PIN, N> {
    /// Set up a window on `pin` and backfill it with the current level, so
    /// a freshly started sensor is not firing.
    pub fn new<ADC, A, W, CLK>(
        name: &str,
        pin: PIN,
        config: SensorConfig,
        adc: &mut A,
        clock: &CLK,
    ) -> Result<Self, Error<A::Error>>
    where
        PIN: Channel<ADC>,
        A: OneShot<ADC, W, PIN>,
        W: Into<i32>,
        CLK: Clock,
    {
        Self::new_with(name, pin, config, clock, |pin| {
            nb::block!(adc.read(pin)).map(Into::into)
        })
    }

    /// Like [`new`](Self::new), backfilling with readings taken by `read`.
    ///
    /// `channel` identifies the source and is handed to every read.
    pub fn new_with<CLK, F, E>(
        name: &str,
        mut channel: PIN,
        config: SensorConfig,
        clock: &CLK,
        mut read: F,
    ) -> Result<Self, Error<E>>
    where
        CLK: Clock,
        F: FnMut(&mut PIN) -> Result<i32, E>,
    {
        config.validate::<E, N>()?;

        let mut label = Name::new();
        label
            .push_str(name)
            .map_err(|_| Error::NameTooLong { capacity: NAME_LEN })?;

        let mut samples: Vec<i32, N> = Vec::new();
        samples
            .resize(config.sample_count, 0)
            .map_err(|_| Error::SampleCount {
                requested: config.sample_count,
                capacity: N,
            })?;

        // oldest slot first, the last read lands on index 0
        for slot in samples.iter_mut().rev() {
            *slot = read(&mut channel).map_err(Error::Read)?;
        }

        let sensor = Self {
            name: label,
            pin: channel,
            config,
            samples,
            last_sample_at: clock.now_ms(),
        };
        debug!(
            "{}: backfilled {} samples, level {}",
            sensor.name,
            sensor.samples.len(),
            sensor.last_state()
        );
        Ok(sensor)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn channel(&self) -> &PIN {
        &self.pin
    }

    pub fn config(&self) -> &SensorConfig {
        &self.config
    }

    /// The window, latest reading first.
    pub fn samples(&self) -> &[i32] {
        &self.samples
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn last_sample_at(&self) -> u32 {
        self.last_sample_at
    }

    /// Tear the window down and hand the channel back.
    pub fn release(self) -> PIN {
        self.pin
    }

    /// True once `sample_interval_ms` has passed since the last accepted sample.
    pub fn is_due(&self, now_ms: u32) -> bool {
        elapsed_ms(now_ms, self.last_sample_at) >= self.config.sample_interval_ms
    }

    /// Read the channel and shift the reading into the window if the sample
    /// interval has passed. Returns whether a sample was taken.
    ///
    /// Nothing is read or changed while the interval has not passed, so this
    /// can be called on every tick.
    pub fn sample_if_due<ADC, A, W, CLK>(
        &mut self,
        adc: &mut A,
        clock: &CLK,
    ) -> Result<bool, Error<A::Error>>
    where
        PIN: Channel<ADC>,
        A: OneShot<ADC, W, PIN>,
        W: Into<i32>,
        CLK: Clock,
    {
        let now = clock.now_ms();
        if !self.is_due(now) {
            return Ok(false);
        }
        let value = read_channel(adc, &mut self.pin)?;
        self.shift_in(value, now);
        Ok(true)
    }

    /// Like [`sample_if_due`](Self::sample_if_due) with the reading supplied
    /// by `read`, for sources that are not an ADC channel.
    pub fn sample_if_due_with<F, E>(&mut self, now_ms: u32, read: F) -> Result<bool, E>
    where
        F: FnOnce() -> Result<i32, E>,
    {
        if !self.is_due(now_ms) {
            return Ok(false);
        }
        let value = read()?;
        self.shift_in(value, now_ms);
        Ok(true)
    }

    /// Reset the whole window to a fresh reading, ignoring the sample interval.
    pub fn fill_all<ADC, A, W, CLK>(&mut self, adc: &mut A, clock: &CLK) -> Result<(), Error<A::Error>>
    where
        PIN: Channel<ADC>,
        A: OneShot<ADC, W, PIN>,
        W: Into<i32>,
        CLK: Clock,
    {
        let value = read_channel(adc, &mut self.pin)?;
        self.flatten(value, clock.now_ms());
        Ok(())
    }

    pub fn fill_all_with<F, E>(&mut self, now_ms: u32, read: F) -> Result<(), E>
    where
        F: FnOnce() -> Result<i32, E>,
    {
        let value = read()?;
        self.flatten(value, now_ms);
        Ok(())
    }

    fn shift_in(&mut self, value: i32, now_ms: u32) {
        self.samples.rotate_right(1);
        self.samples[0] = value;
        self.last_sample_at = now_ms;
        trace!("{}: sample {} at {} ms", self.name, value, now_ms);
    }

    fn flatten(&mut self, value: i32, now_ms: u32) {
        self.samples.fill(value);
        self.last_sample_at = now_ms;
        debug!("{}: re-baselined to {}", self.name, value);
    }

    /// Latest reading.
    pub fn last_state(&self) -> i32 {
        self.samples[0]
    }

    /// Truncating mean of the window.
    pub fn average(&self) -> i32 {
        let sum: i64 = self.samples.iter().map(|&s| i64::from(s)).sum();
        (sum / self.samples.len() as i64) as i32
    }

    /// Truncating mean distance of the samples from the average.
    pub fn average_deviation(&self) -> i32 {
        let average = i64::from(self.average());
        let total: i64 = self
            .samples
            .iter()
            .map(|&s| (i64::from(s) - average).abs())
            .sum();
        saturate(total / self.samples.len() as i64)
    }

    /// Largest reading, never below 0.
    ///
    /// The fold starts at 0, so a window of only negative readings reports 0.
    pub fn max_reading(&self) -> i32 {
        self.samples.iter().fold(0, |max, &s| max.max(s))
    }

    pub fn min_reading(&self) -> i32 {
        self.samples.iter().fold(self.last_state(), |min, &s| min.min(s))
    }

    /// Latest reading as a percentage of the average, `None` when the average is 0.
    pub fn percent_of_average(&self) -> Option<i32> {
        let average = i64::from(self.average());
        if average == 0 {
            return None;
        }
        Some(saturate(i64::from(self.last_state()) * 100 / average))
    }

    /// Latest reading minus the average, in raw units.
    pub fn variance(&self) -> i32 {
        self.last_state().saturating_sub(self.average())
    }

    /// [`percent_of_average`](Self::percent_of_average) minus 100.
    pub fn variance_percent(&self) -> Option<i32> {
        self.percent_of_average().map(|pct| pct.saturating_sub(100))
    }

    /// Distance from the latest reading to the window's min, or to whichever
    /// of min and max is further when not direction sensitive.
    pub fn delta(&self) -> i32 {
        let current = self.last_state();
        let delta = current.saturating_sub(self.min_reading());
        if self.config.direction_sensitive {
            delta
        } else {
            delta.max(self.max_reading().saturating_sub(current))
        }
    }

    /// Previous reading minus the latest one; 0 for a single-sample window.
    pub fn last_delta(&self) -> i32 {
        match self.samples.get(1) {
            Some(&previous) => previous.saturating_sub(self.last_state()),
            None => 0,
        }
    }

    /// Evaluate the three threshold checks separately.
    pub fn firing(&self) -> Firing {
        let config = &self.config;

        let by_pct = config.threshold_pct != 0 && {
            let variance = self.variance();
            if config.direction_sensitive && config.threshold_pct < 0 && variance < 0 {
                config.threshold_pct > variance
            } else {
                config.threshold_pct.unsigned_abs() < variance.unsigned_abs()
            }
        };

        let by_avg_dev =
            config.threshold_avg_dev != 0 && config.threshold_avg_dev < self.average_deviation();

        let by_delta = config.threshold_delta != 0 && {
            let current = self.last_state();
            (current == self.min_reading() || current == self.max_reading())
                && self.delta() >= config.threshold_delta
        };

        let firing = Firing {
            by_pct,
            by_avg_dev,
            by_delta,
        };
        if firing.any() {
            trace!("{}: firing {:?}", self.name, firing);
        }
        firing
    }

    pub fn is_firing(&self) -> bool {
        self.firing().any()
    }

    pub fn stats(&self) -> Stats {
        Stats {
            last: self.last_state(),
            average: self.average(),
            min: self.min_reading(),
            max: self.max_reading(),
            average_deviation: self.average_deviation(),
            variance: self.variance(),
            percent_of_average: self.percent_of_average(),
            delta: self.delta(),
            last_delta: self.last_delta(),
            firing: self.firing(),
        }
    }
}

fn saturate(value: i64) -> i32 {
    value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}
