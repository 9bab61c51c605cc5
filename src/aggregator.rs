//! The batch aggregator core.
//!
//! [`BatchAggregator`] accumulates items produced by many concurrent
//! callers and periodically hands them, as a group, to an owner-supplied
//! [`BatchSink`] — triggered by whichever comes first, a size threshold or
//! a deadline tick. A single async mutex guards the buffer and is held for
//! the duration of every flush attempt, so "at most one flush in flight" is
//! enforced by the lock rather than coordinated manually.

use crate::config::AggregatorConfig;
use crate::sink::{BatchSink, FlushError};
use crate::{Error, Result};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

type ErrorObserver = dyn Fn(&FlushError) + Send + Sync;

/// Point-in-time view of an aggregator's counters.
#[derive(Debug, Clone)]
pub struct AggregatorSnapshot {
    /// Items currently buffered and not yet successfully flushed.
    pub pending: usize,
    /// Completed (successful) flushes.
    pub flushes: u64,
    /// Failed flush attempts. The same retained batch failing repeatedly
    /// counts once per attempt.
    pub flush_failures: u64,
}

struct Shared<T> {
    config: AggregatorConfig,
    buffer: Mutex<Vec<T>>,
    sink: Box<dyn BatchSink<T>>,
    observer: Option<Box<ErrorObserver>>,
    flushes: AtomicU64,
    flush_failures: AtomicU64,
    stopped: AtomicBool,
}

impl<T> Shared<T> {
    /// Flush the buffer through the sink. The caller holds the buffer lock,
    /// so no second flush can start while this one runs.
    ///
    /// Success clears the buffer in place (length to zero, capacity kept).
    /// Failure leaves the buffer untouched: the batch is retained and will
    /// be retried, in full and in order, on the next trigger. There is no
    /// retry cap — a persistently failing sink grows the buffer without
    /// bound.
    async fn flush_locked(&self, buffer: &mut Vec<T>) -> std::result::Result<(), FlushError> {
        if buffer.is_empty() {
            debug!("flush trigger on empty buffer, skipping");
            return Ok(());
        }
        match self.sink.flush(buffer).await {
            Ok(()) => {
                self.flushes.fetch_add(1, Ordering::Relaxed);
                debug!(batch_len = buffer.len(), "batch flushed");
                buffer.clear();
                Ok(())
            }
            Err(err) => {
                self.flush_failures.fetch_add(1, Ordering::Relaxed);
                warn!(
                    batch_len = buffer.len(),
                    error = %err,
                    "batch flush failed, batch retained for retry"
                );
                if let Some(observer) = &self.observer {
                    observer(&err);
                }
                Err(err)
            }
        }
    }
}

/// Accumulates items and flushes them in batches.
///
/// Flushes are triggered two ways, with no priority between them:
///
/// - **Size**: the `add` call that brings the buffer to `max_size` attempts
///   a flush inline, before returning.
/// - **Deadline**: a background task ticks every `max_wait` and flushes
///   whatever has accumulated. The period restarts in full after every
///   tick, flush or no flush.
///
/// Flush outcomes never reach producers: a failed flush is logged, reported
/// to the error observer if one is installed, and the batch is kept for
/// retry on the next trigger. Teardown is explicit via [`shutdown`]; the
/// timer does not flush on its way out, so owners wanting a final drain
/// call [`flush`] first.
///
/// [`shutdown`]: BatchAggregator::shutdown
/// [`flush`]: BatchAggregator::flush
pub struct BatchAggregator<T> {
    shared: Arc<Shared<T>>,
    shutdown_tx: watch::Sender<bool>,
    timer: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl<T: Send + Sync + 'static> BatchAggregator<T> {
    /// Create an aggregator and start its deadline timer.
    ///
    /// Must be called from within a Tokio runtime. Fails if the
    /// configuration is invalid.
    pub fn new(config: AggregatorConfig, sink: impl BatchSink<T> + 'static) -> Result<Self> {
        Self::builder(config, sink).build()
    }

    /// Builder variant of [`new`](Self::new) for installing optional hooks.
    pub fn builder(
        config: AggregatorConfig,
        sink: impl BatchSink<T> + 'static,
    ) -> AggregatorBuilder<T> {
        AggregatorBuilder {
            config,
            sink: Box::new(sink),
            observer: None,
        }
    }

    /// Append an item, flushing inline if the buffer reaches `max_size`.
    ///
    /// Fire-and-forget: the outcome of an inline flush is not reported to
    /// the caller and a failed flush does not roll back the append. The
    /// call blocks only while waiting for the buffer lock — which includes
    /// the duration of any flush already in progress.
    pub async fn add(&self, item: T) {
        let mut buffer = self.shared.buffer.lock().await;
        buffer.push(item);
        if buffer.len() >= self.shared.config.max_size
            && !self.shared.stopped.load(Ordering::Acquire)
        {
            // Producer path: flush errors stay on the side channel.
            let _ = self.shared.flush_locked(&mut buffer).await;
        }
    }

    /// Flush the current buffer now, regardless of size.
    ///
    /// This is the owner-facing flush path (use it to drain before
    /// [`shutdown`](Self::shutdown)), so unlike `add` it surfaces the sink
    /// error. An empty buffer is a no-op and the sink is not invoked.
    pub async fn flush(&self) -> Result<()> {
        let mut buffer = self.shared.buffer.lock().await;
        self.shared
            .flush_locked(&mut buffer)
            .await
            .map_err(Error::Flush)
    }

    /// Number of items currently buffered.
    pub async fn len(&self) -> usize {
        self.shared.buffer.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Counters plus the current pending count.
    pub async fn snapshot(&self) -> AggregatorSnapshot {
        AggregatorSnapshot {
            pending: self.shared.buffer.lock().await.len(),
            flushes: self.shared.flushes.load(Ordering::Relaxed),
            flush_failures: self.shared.flush_failures.load(Ordering::Relaxed),
        }
    }

    /// Stop the deadline timer and wait for it to exit.
    ///
    /// Sends the cancellation signal, then waits up to
    /// `config.shutdown_timeout` for the timer task to finish. Idempotent:
    /// a second call returns `Ok` without waiting.
    ///
    /// No flush happens on the way out, and after shutdown the aggregator
    /// never initiates one itself: neither the timer nor the size
    /// threshold triggers flushes, so `add` may leave the buffer above
    /// `max_size`. "No further flush" is deliberately relaxed in one
    /// direction only: `add` keeps accepting items and the owner may still
    /// call [`flush`](Self::flush) for a late drain.
    pub async fn shutdown(&self) -> Result<()> {
        self.shared.stopped.store(true, Ordering::Release);
        let _ = self.shutdown_tx.send(true);
        let handle = match self.timer.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        };
        let Some(handle) = handle else {
            return Ok(());
        };
        let timeout = self.shared.config.shutdown_timeout;
        match tokio::time::timeout(timeout, handle).await {
            Ok(_) => {
                debug!("deadline timer stopped");
                Ok(())
            }
            Err(_) => Err(Error::ShutdownTimeout(timeout)),
        }
    }
}

impl<T> Drop for BatchAggregator<T> {
    fn drop(&mut self) {
        // An aggregator dropped without shutdown() must not leave its timer
        // task running forever.
        if let Ok(mut guard) = self.timer.lock() {
            if let Some(handle) = guard.take() {
                handle.abort();
            }
        }
    }
}

/// Builder for [`BatchAggregator`], created via
/// [`BatchAggregator::builder`].
pub struct AggregatorBuilder<T> {
    config: AggregatorConfig,
    sink: Box<dyn BatchSink<T>>,
    observer: Option<Box<ErrorObserver>>,
}

impl<T: Send + Sync + 'static> AggregatorBuilder<T> {
    /// Install an observer invoked with every flush failure, in addition to
    /// the log line. Runs under the buffer lock; keep it cheap.
    pub fn on_flush_error(mut self, observer: impl Fn(&FlushError) + Send + Sync + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Validate the configuration, allocate the buffer at `max_size`
    /// capacity, and spawn the deadline timer.
    pub fn build(self) -> Result<BatchAggregator<T>> {
        self.config.validate()?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let shared = Arc::new(Shared {
            buffer: Mutex::new(Vec::with_capacity(self.config.max_size)),
            sink: self.sink,
            observer: self.observer,
            flushes: AtomicU64::new(0),
            flush_failures: AtomicU64::new(0),
            stopped: AtomicBool::new(false),
            config: self.config,
        });
        let timer = spawn_deadline_timer(Arc::clone(&shared), shutdown_rx);
        Ok(BatchAggregator {
            shared,
            shutdown_tx,
            timer: std::sync::Mutex::new(Some(timer)),
        })
    }
}

/// Deadline loop: flush every `max_wait` until cancelled.
///
/// The sleep restarts after each tick whether or not anything was flushed,
/// so `max_wait` bounds time between ticks, not the age of the oldest
/// buffered item. Exits on the shutdown signal without a final flush.
fn spawn_deadline_timer<T: Send + Sync + 'static>(
    shared: Arc<Shared<T>>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(shared.config.max_wait) => {
                    let mut buffer = shared.buffer.lock().await;
                    let _ = shared.flush_locked(&mut buffer).await;
                }
                _ = shutdown_rx.changed() => {
                    debug!("shutdown signalled, deadline timer exiting");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::sink_fn;
    use futures::FutureExt;
    use std::time::Duration;

    fn discard_sink() -> impl BatchSink<i32> {
        sink_fn(|_batch: &[i32]| async move { Ok(()) }.boxed())
    }

    #[tokio::test]
    async fn test_build_rejects_invalid_config() {
        let config = AggregatorConfig::new().with_max_size(0);
        assert!(BatchAggregator::new(config, discard_sink()).is_err());
    }

    #[tokio::test]
    async fn test_empty_aggregator_state() {
        let aggregator =
            BatchAggregator::new(AggregatorConfig::default(), discard_sink()).unwrap();
        assert!(aggregator.is_empty().await);
        assert_eq!(aggregator.len().await, 0);

        let snapshot = aggregator.snapshot().await;
        assert_eq!(snapshot.pending, 0);
        assert_eq!(snapshot.flushes, 0);
        assert_eq!(snapshot.flush_failures, 0);
        aggregator.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_add_below_threshold_buffers() {
        let config = AggregatorConfig::new()
            .with_max_size(5)
            .with_max_wait(Duration::from_secs(60));
        let aggregator = BatchAggregator::new(config, discard_sink()).unwrap();
        aggregator.add(1).await;
        aggregator.add(2).await;
        assert_eq!(aggregator.len().await, 2);
        aggregator.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_explicit_flush_on_empty_is_noop() {
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let calls_in_sink = Arc::clone(&calls);
        let sink = sink_fn(move |_batch: &[i32]| {
            calls_in_sink.fetch_add(1, Ordering::SeqCst);
            async move { Ok(()) }.boxed()
        });
        let aggregator = BatchAggregator::new(AggregatorConfig::default(), sink).unwrap();
        aggregator.flush().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        aggregator.shutdown().await.unwrap();
    }
}
