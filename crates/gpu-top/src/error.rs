use thiserror::Error;

/// Result type for reading `intel_gpu_top` output.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while reading `intel_gpu_top` output.
#[derive(Debug, Error)]
pub enum Error {
    /// A complete record could not be decoded into a sample.
    #[error("failed to decode gpu top record: {0}")]
    Decode(#[from] serde_json::Error),

    /// Reading the underlying stream failed.
    #[error("{0}: {1}")]
    Io(&'static str, #[source] std::io::Error),
}
