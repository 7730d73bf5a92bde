use thiserror::Error;

/// Result type for the exporter.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// The server has already been started.
    #[error("the server has already been started")]
    AlreadyStarted,

    /// Failed to bind to address.
    #[error("failed to bind to address: {0}")]
    Bind(#[source] std::io::Error),

    /// Collector error.
    #[error(transparent)]
    Collector(#[from] gpumon_collector::Error),

    /// IO operation failed.
    #[error("{0}: {1}")]
    Io(&'static str, #[source] std::io::Error),

    /// Could not set global default subscriber.
    #[error("could not set global default subscriber: {0}")]
    SetTracing(#[from] tracing::dispatcher::SetGlobalDefaultError),

    /// Supervisor error.
    #[error(transparent)]
    Supervisor(#[from] gpumon_supervisor::Error),
}
