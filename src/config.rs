//! Aggregator configuration.

use crate::{Error, Result};
use std::time::Duration;

/// Configuration for a [`BatchAggregator`](crate::BatchAggregator).
///
/// - `max_size`: a flush is attempted as soon as the buffer reaches this
///   many items, inline in the `add` call that crossed the threshold.
/// - `max_wait`: the deadline timer's period. The timer restarts its full
///   period after every tick, whether or not anything was flushed, so an
///   item added right after a tick can sit for up to `max_wait` before the
///   next tick considers it.
/// - `shutdown_timeout`: how long `shutdown` waits for the deadline timer
///   task to acknowledge the stop signal and exit.
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    pub max_size: usize,
    pub max_wait: Duration,
    pub shutdown_timeout: Duration,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            max_size: 10,
            max_wait: Duration::from_secs(5),
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

impl AggregatorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.max_size == 0 {
            return Err(Error::configuration("max_size must be at least 1"));
        }
        if self.max_wait.is_zero() {
            return Err(Error::configuration("max_wait must be non-zero"));
        }
        Ok(())
    }
}
