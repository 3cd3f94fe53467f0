use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Sampling and firing thresholds for one analog channel.
///
/// A threshold of `0` disables that check.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq)]
pub struct SensorConfig {
    /// Number of readings kept in the window.
    pub sample_count: usize,
    /// Fire when the current reading is further than this from the average.
    /// Negative values with `direction_sensitive` only fire on drops.
    pub threshold_pct: i32,
    /// Fire when the current reading is a new min/max at least this far from the other bound.
    pub threshold_delta: i32,
    /// Fire when the average deviation of the window exceeds this.
    pub threshold_avg_dev: i32,
    pub direction_sensitive: bool,
    /// Minimum time between accepted samples.
    pub sample_interval_ms: u32,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            sample_count: 16,
            threshold_pct: 0,
            threshold_delta: 0,
            threshold_avg_dev: 0,
            direction_sensitive: false,
            sample_interval_ms: 100,
        }
    }
}

impl SensorConfig {
    pub fn with_sample_count(mut self, sample_count: usize) -> Self {
        self.sample_count = sample_count;
        self
    }

    pub fn with_threshold_pct(mut self, threshold: i32) -> Self {
        self.threshold_pct = threshold;
        self
    }

    pub fn with_threshold_delta(mut self, threshold: i32) -> Self {
        self.threshold_delta = threshold;
        self
    }

    pub fn with_threshold_avg_dev(mut self, threshold: i32) -> Self {
        self.threshold_avg_dev = threshold;
        self
    }

    pub fn with_direction_sensitive(mut self, direction_sensitive: bool) -> Self {
        self.direction_sensitive = direction_sensitive;
        self
    }

    pub fn with_sample_interval_ms(mut self, interval: u32) -> Self {
        self.sample_interval_ms = interval;
        self
    }

    /// True when every threshold is 0, so the window can never fire.
    pub fn is_silent(&self) -> bool {
        self.threshold_pct == 0 && self.threshold_delta == 0 && self.threshold_avg_dev == 0
    }

    /// Check the history length against a sample buffer of `N` slots.
    pub fn validate<E, const N: usize>(&self) -> Result<(), Error<E>> {
        if self.sample_count == 0 || self.sample_count > N {
            return Err(Error::SampleCount {
                requested: self.sample_count,
                capacity: N,
            });
        }
        Ok(())
    }

    /// Decode a config blob, e.g. one kept in flash.
    pub fn from_bytes(bytes: &[u8]) -> postcard::Result<Self> {
        postcard::from_bytes(bytes)
    }

    /// Encode into `buf`, returning the used part.
    pub fn to_slice<'a>(&self, buf: &'a mut [u8]) -> postcard::Result<&'a mut [u8]> {
        postcard::to_slice(self, buf)
    }
}
