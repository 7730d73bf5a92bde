use thiserror::Error;

/// Result type for the aggregator.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while feeding the aggregator.
#[derive(Debug, Error)]
pub enum Error {
    /// The sample stream ended with an error.
    #[error("gpu top error: {0}")]
    GpuTop(#[from] gpumon_gpu_top::Error),
}
