//! # batchflow
//!
//! Write-behind batch aggregation for async Rust: accumulate work items
//! from many concurrent producers and hand them to a bulk operation in
//! groups, triggered by whichever comes first — a size threshold or a
//! deadline.
//!
//! ## Overview
//!
//! The pattern recurs in ingestion pipelines, metrics exporters, and
//! write-behind caches: individual producers emit small units of work, the
//! downstream wants them in batches. [`BatchAggregator`] owns the buffer
//! and the synchronization; the owner supplies a [`BatchSink`] that
//! performs the actual bulk write (for example, upserting a group of vector
//! records into a similarity store).
//!
//! Design properties:
//!
//! - **Generic**: the aggregator never inspects item contents; any
//!   `Send + Sync` type works.
//! - **At most one flush in flight**: the buffer lock is held across the
//!   sink call, so the sink is never invoked concurrently with itself.
//! - **Producers are decoupled from flush outcomes**: `add` never reports
//!   sink errors; failures are logged, reported to an optional observer,
//!   and the batch is retained for retry on the next trigger. A
//!   persistently failing sink therefore grows the buffer without bound —
//!   there is no retry cap, back-pressure, or shedding.
//! - **Explicit teardown**: `shutdown` stops the deadline timer without a
//!   final flush; drain with `flush` first if you need one.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use batchflow::{sink_fn, AggregatorConfig, BatchAggregator};
//! use futures::FutureExt;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> batchflow::Result<()> {
//!     let sink = sink_fn(|batch: &[String]| {
//!         let count = batch.len();
//!         async move {
//!             // bulk-write `count` records downstream here
//!             println!("flushed {count} records");
//!             Ok(())
//!         }
//!         .boxed()
//!     });
//!
//!     let config = AggregatorConfig::new()
//!         .with_max_size(128)
//!         .with_max_wait(Duration::from_secs(2));
//!     let aggregator = BatchAggregator::new(config, sink)?;
//!
//!     aggregator.add("record-1".to_string()).await;
//!     aggregator.add("record-2".to_string()).await;
//!
//!     // Final drain, then stop the deadline timer.
//!     aggregator.flush().await?;
//!     aggregator.shutdown().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`aggregator`] | The aggregator core, builder, and snapshot |
//! | [`config`] | Size, deadline, and shutdown configuration |
//! | [`sink`] | The [`BatchSink`] seam and closure adapter |
//! | [`error`] | Owner-facing error type |

pub mod aggregator;
pub mod config;
pub mod error;
pub mod sink;

// Re-export main types for convenience
pub use aggregator::{AggregatorBuilder, AggregatorSnapshot, BatchAggregator};
pub use config::AggregatorConfig;
pub use error::{Error, Result};
pub use sink::{sink_fn, BatchSink, FlushError, SinkFn};
