//! Supervises `intel_gpu_top` and feeds its output to the aggregator.
//!
//! [`TopReader`] runs a health loop on top of a [`ProcessRunner`]. When no
//! sample has reached the aggregator for longer than the timeout, the
//! process is stopped and a fresh one is started.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::redundant_pub_crate)]

mod command;
mod error;
mod reader;
mod runner;

pub use command::{GPU_TOP_BINARY, GpuTopCommand};
pub use error::{Error, Result};
pub use reader::{
    DEFAULT_CHECK_INTERVAL, DEFAULT_SAMPLE_INTERVAL, DEFAULT_TIMEOUT, HealthAction, TopReader,
    TopReaderOptions, health_action,
};
pub use runner::{DEFAULT_GRACE_PERIOD, GpuTopRunner, ProcessRunner};
