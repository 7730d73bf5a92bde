use std::process::Stdio;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};

/// Time a process gets to exit after `SIGTERM` before it is killed.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(10);

/// Starts and stops the external process feeding the aggregator.
///
/// At most one process is running at a time.
#[async_trait]
pub trait ProcessRunner: Send + Sync + 'static {
    /// Standard output of a started process.
    type Output: AsyncRead + Send + Unpin + 'static;

    /// Starts `command` and returns its standard output.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyStarted`] if a process is running, or an
    /// error if the process could not be launched.
    async fn start(&self, command: &[String]) -> Result<Self::Output>;

    /// Stops the running process. Does nothing if none is running.
    ///
    /// # Errors
    ///
    /// Returns an error if waiting for the process to exit failed. The
    /// process is forgotten either way.
    async fn stop(&self) -> Result<()>;

    /// Returns `true` while a started process has not been stopped.
    fn running(&self) -> bool;
}

/// Runs the real process with `tokio::process`.
///
/// Standard error of the process is forwarded to the log.
#[derive(Debug)]
pub struct GpuTopRunner {
    child: Mutex<Option<Child>>,
    grace_period: Duration,
    launches: AtomicU32,
}

impl GpuTopRunner {
    /// Creates a runner with no process.
    #[must_use]
    pub fn new() -> Self {
        Self {
            child: Mutex::new(None),
            grace_period: DEFAULT_GRACE_PERIOD,
            launches: AtomicU32::new(0),
        }
    }

    /// Sets the time a process gets to exit after `SIGTERM`.
    #[must_use]
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Returns the number of processes launched so far.
    pub fn launches(&self) -> u32 {
        self.launches.load(Ordering::Relaxed)
    }

    async fn terminate(&self, mut child: Child) -> Result<()> {
        let Some(pid) = child.id().and_then(|pid| i32::try_from(pid).ok()) else {
            // Already reaped.
            return Ok(());
        };

        if let Err(err) = signal::kill(Pid::from_raw(pid), Signal::SIGTERM) {
            warn!("failed to send SIGTERM to process {}: {}", pid, err);
        }

        if let Ok(result) = tokio::time::timeout(self.grace_period, child.wait()).await {
            let status = result.map_err(|e| Error::Io("failed to wait for process", e))?;
            info!("process {} exited with status: {}", pid, status);
        } else {
            error!("timeout waiting for process {} to exit, killing...", pid);
            child
                .kill()
                .await
                .map_err(|e| Error::Io("failed to kill process", e))?;
        }

        Ok(())
    }
}

impl Default for GpuTopRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProcessRunner for GpuTopRunner {
    type Output = ChildStdout;

    async fn start(&self, command: &[String]) -> Result<ChildStdout> {
        let (program, args) = command.split_first().ok_or(Error::EmptyCommand)?;

        let mut slot = self.child.lock();
        if slot.is_some() {
            return Err(Error::AlreadyStarted);
        }

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!("spawning process: {:?}", cmd);

        let mut child = cmd
            .spawn()
            .map_err(|e| Error::Spawn(program.clone(), e))?;

        let stdout = child.stdout.take().ok_or_else(|| {
            Error::Io(
                "process stdout not captured",
                std::io::Error::other("missing stdout pipe"),
            )
        })?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    warn!("process stderr: {}", line);
                }
            });
        }

        info!("started {} (pid {:?})", program, child.id());

        *slot = Some(child);
        self.launches.fetch_add(1, Ordering::Relaxed);

        Ok(stdout)
    }

    async fn stop(&self) -> Result<()> {
        let child = self.child.lock().take();

        match child {
            Some(child) => self.terminate(child).await,
            None => Ok(()),
        }
    }

    fn running(&self) -> bool {
        self.child.lock().is_some()
    }
}
