//! Reads the JSON output of `intel_gpu_top -J` into structured samples.
//!
//! Depending on its version, `intel_gpu_top` writes its records as bare
//! concatenated objects, as a JSON array with commas between the records, or
//! as a JSON array without them. [`FrameNormalizer`] recovers the record
//! boundaries for all three layouts and [`read_samples`] decodes the records
//! as they arrive.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::redundant_pub_crate)]

mod decoder;
mod error;
mod sample;
mod tracker;

/// Fixtures shared by the tests of the gpumon crates.
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use decoder::read_samples;
pub use error::{Error, Result};
pub use sample::{
    Client, ClientEngineClass, EngineUsage, Frequency, IdleRatio, Interrupts, MemoryBandwidth,
    Period, Power, Sample,
};
pub use tracker::{FrameNormalizer, FrameReader};
