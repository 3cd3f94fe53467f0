//! Windowed analog sensor readings with firing thresholds.
//!
//! An [`AnalogSensor`] keeps the last few readings of one ADC channel and
//! decides from their average, spread and extremes whether the latest
//! reading is a significant change. It is meant to be polled from a main
//! loop: [`AnalogSensor::sample_if_due`] only reads the channel once the
//! configured interval has passed.
#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod clock;
pub mod config;
pub mod error;
pub mod window;

pub use clock::{elapsed_ms, Clock};
pub use config::SensorConfig;
pub use error::Error;
pub use window::{AnalogSensor, Firing, Name, Stats, NAME_LEN};
