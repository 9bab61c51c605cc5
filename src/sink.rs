//! The flush seam between the aggregator and its owner.
//!
//! [`BatchSink`] is the single point where control leaves the aggregator:
//! it receives the full pending batch, in insertion order, and reports
//! success or failure of the owner's bulk operation (for example, upserting
//! a group of vector records into a similarity store). The batch is
//! borrowed rather than moved so that a failed flush retains the items for
//! retry without any cloning on the aggregator side.

use async_trait::async_trait;
use futures::future::BoxFuture;
use std::sync::Arc;

/// Error reported by a sink for a failed batch. The aggregator treats all
/// sink errors identically (log, notify the observer, retain the batch);
/// it makes no transient/permanent distinction.
pub type FlushError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Owner-supplied bulk operation invoked with each batch.
///
/// At most one `flush` call is ever in progress per aggregator. The
/// aggregator holds its buffer lock for the duration of the call, so a slow
/// sink stalls producers for that long; keep flushes bounded.
#[async_trait]
pub trait BatchSink<T>: Send + Sync {
    async fn flush(&self, batch: &[T]) -> std::result::Result<(), FlushError>;
}

#[async_trait]
impl<T, S> BatchSink<T> for Arc<S>
where
    T: Send + Sync,
    S: BatchSink<T> + ?Sized,
{
    async fn flush(&self, batch: &[T]) -> std::result::Result<(), FlushError> {
        (**self).flush(batch).await
    }
}

/// Adapter turning a closure into a [`BatchSink`]. See [`sink_fn`].
pub struct SinkFn<F> {
    f: F,
}

/// Wrap a closure as a [`BatchSink`].
///
/// The closure receives the borrowed batch and returns a boxed future:
///
/// ```rust
/// use batchflow::{sink_fn, FlushError};
/// use futures::FutureExt;
///
/// let sink = sink_fn(|batch: &[String]| {
///     let count = batch.len();
///     async move {
///         // perform the bulk write for `count` records here
///         let _ = count;
///         Ok(())
///     }
///     .boxed()
/// });
/// # let _ = sink;
/// ```
pub fn sink_fn<T, F>(f: F) -> SinkFn<F>
where
    T: Send + Sync,
    F: for<'a> Fn(&'a [T]) -> BoxFuture<'a, std::result::Result<(), FlushError>> + Send + Sync,
{
    SinkFn { f }
}

#[async_trait]
impl<T, F> BatchSink<T> for SinkFn<F>
where
    T: Send + Sync,
    F: for<'a> Fn(&'a [T]) -> BoxFuture<'a, std::result::Result<(), FlushError>> + Send + Sync,
{
    async fn flush(&self, batch: &[T]) -> std::result::Result<(), FlushError> {
        (self.f)(batch).await
    }
}
