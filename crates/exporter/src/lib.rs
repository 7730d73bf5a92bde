//! Prometheus exporter for Intel GPU statistics gathered with `intel_gpu_top`.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::redundant_pub_crate)]

mod error;
mod server;

pub use error::{Error, Result};
pub use server::MetricsServer;
