use thiserror::Error;

/// Errors raised by an [`AnalogSensor`](crate::AnalogSensor).
///
/// `E` is the error type of the ADC the window reads through.
#[derive(Debug, Error)]
pub enum Error<E> {
    /// The name does not fit the fixed name buffer.
    #[error("sensor name exceeds {capacity} bytes")]
    NameTooLong { capacity: usize },

    /// The requested history length is zero or larger than the sample buffer.
    #[error("sample count {requested} outside 1..={capacity}")]
    SampleCount { requested: usize, capacity: usize },

    /// Reading the analog channel failed.
    #[error("channel read failed: {0:?}")]
    Read(E),

    /// A stored sensor config could not be decoded.
    #[error("malformed sensor config: {0:?}")]
    Config(postcard::Error),
}

impl<E> From<postcard::Error> for Error<E> {
    fn from(err: postcard::Error) -> Self {
        Error::Config(err)
    }
}

impl<E> Error<E> {
    /// True for the errors raised while sizing the name or sample buffer.
    pub fn is_allocation(&self) -> bool {
        matches!(self, Error::NameTooLong { .. } | Error::SampleCount { .. })
    }
}
