//! Median-based aggregation of GPU samples.
//!
//! Samples are buffered as they arrive and summarized on demand. Readers
//! drain the buffer with [`StatSource::reset`] after each summary, so every
//! summary covers the samples received since the previous one.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::redundant_pub_crate)]

mod aggregator;
mod error;
mod median;

pub use aggregator::{Aggregator, PowerUsage};
pub use error::{Error, Result};
pub use median::median;

use std::collections::BTreeMap;
use std::sync::Arc;

use gpumon_gpu_top::EngineUsage;

/// Summaries of the samples received since the last reset.
pub trait StatSource: Send + Sync + 'static {
    /// Median GPU and package power draw.
    fn median_power(&self) -> PowerUsage;

    /// Median busy, sema and wait values per engine.
    fn median_engine_usage(&self) -> BTreeMap<String, EngineUsage>;

    /// Median number of clients per sample.
    fn median_client_count(&self) -> f64;

    /// Discards all buffered samples.
    fn reset(&self);
}

impl<T> StatSource for Arc<T>
where
    T: StatSource,
{
    fn median_power(&self) -> PowerUsage {
        self.as_ref().median_power()
    }

    fn median_engine_usage(&self) -> BTreeMap<String, EngineUsage> {
        self.as_ref().median_engine_usage()
    }

    fn median_client_count(&self) -> f64 {
        self.as_ref().median_client_count()
    }

    fn reset(&self) {
        self.as_ref().reset();
    }
}
