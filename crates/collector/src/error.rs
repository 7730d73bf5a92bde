use thiserror::Error;

/// Result type for the collector.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Creating or registering the metrics failed.
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}
