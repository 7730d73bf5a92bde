use thiserror::Error;

/// Result type for supervising `intel_gpu_top`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while supervising `intel_gpu_top`.
#[derive(Debug, Error)]
pub enum Error {
    /// A process is already running.
    #[error("already started")]
    AlreadyStarted,

    /// The `intel_gpu_top` binary could not be found on `PATH`.
    #[error("intel_gpu_top binary not found: {0}")]
    BinaryNotFound(#[from] which::Error),

    /// The command line was empty.
    #[error("empty command line")]
    EmptyCommand,

    /// IO operation failed.
    #[error("{0}: {1}")]
    Io(&'static str, #[source] std::io::Error),

    /// The process could not be launched.
    #[error("failed to spawn {0}: {1}")]
    Spawn(String, #[source] std::io::Error),
}
