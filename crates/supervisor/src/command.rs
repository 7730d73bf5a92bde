use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;

/// Name of the binary looked up on `PATH`.
pub const GPU_TOP_BINARY: &str = "intel_gpu_top";

/// Builds `intel_gpu_top` command lines.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GpuTopCommand {
    binary: PathBuf,
    device: Option<String>,
}

impl GpuTopCommand {
    /// Creates a command running `binary`.
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            device: None,
        }
    }

    /// Creates a command running `intel_gpu_top` from `PATH`.
    ///
    /// # Errors
    ///
    /// Returns an error if `intel_gpu_top` is not on `PATH`.
    pub fn locate() -> Result<Self> {
        Ok(Self::new(which::which(GPU_TOP_BINARY)?))
    }

    /// Selects the device to monitor, as understood by `intel_gpu_top -d`.
    #[must_use]
    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = Some(device.into());
        self
    }

    /// Returns the binary the command runs.
    #[must_use]
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Returns the command line sampling once every `interval`.
    #[must_use]
    pub fn build(&self, interval: Duration) -> Vec<String> {
        let mut command = vec![self.binary.to_string_lossy().to_string()];

        if let Some(device) = &self.device {
            command.push("-d".to_string());
            command.push(device.clone());
        }

        command.push("-J".to_string());
        command.push("-s".to_string());
        command.push(interval.as_millis().to_string());

        command
    }
}

impl Default for GpuTopCommand {
    fn default() -> Self {
        Self::new(GPU_TOP_BINARY)
    }
}
