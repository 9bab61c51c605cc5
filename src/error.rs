use crate::sink::FlushError;
use std::time::Duration;
use thiserror::Error;

/// Unified error type for the aggregator's owner-facing surface.
///
/// Producer calls (`add`) never return errors; flush failures reach the
/// owner only through the explicit [`flush`](crate::BatchAggregator::flush)
/// path, the error observer hook, and the log.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {message}")]
    Configuration { message: String },

    #[error("flush failed: {0}")]
    Flush(FlushError),

    #[error("shutdown timed out after {0:?} waiting for the deadline timer to stop")]
    ShutdownTimeout(Duration),
}

impl Error {
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;
