//! Fake `intel_gpu_top` for testing the supervisor without a GPU.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use gpumon_gpu_top::test_support::{Dialect, SINGLE_PAYLOAD};
use gpumon_supervisor::{Error, ProcessRunner, Result};
use parking_lot::Mutex;
use tokio::io::{AsyncWriteExt, DuplexStream};
use tokio_util::sync::CancellationToken;
use tracing::debug;

struct Instance {
    shutdown: CancellationToken,
    silent: Arc<AtomicBool>,
}

/// Runner whose "process" writes a fixed payload at a fixed pace.
///
/// Each started instance keeps writing records until it is stopped or told
/// to [`go_silent`](FakeRunner::go_silent). A silent instance keeps its
/// output open without writing, like a hung `intel_gpu_top`.
pub struct FakeRunner {
    commands: Mutex<Vec<Vec<String>>>,
    current: Mutex<Option<Instance>>,
    dialect: Dialect,
    fail_start: AtomicBool,
    interval: Duration,
    payload: String,
    starts: AtomicU32,
}

impl FakeRunner {
    /// Creates a runner writing [`SINGLE_PAYLOAD`] every `interval`, as
    /// bare objects.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            commands: Mutex::new(Vec::new()),
            current: Mutex::new(None),
            dialect: Dialect::Bare,
            fail_start: AtomicBool::new(false),
            interval,
            payload: SINGLE_PAYLOAD.to_string(),
            starts: AtomicU32::new(0),
        }
    }

    /// Sets the framing layout of the output.
    #[must_use]
    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Sets the record written.
    #[must_use]
    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = payload.into();
        self
    }

    /// Makes subsequent starts fail.
    pub fn fail_starts(&self) {
        self.fail_start.store(true, Ordering::SeqCst);
    }

    /// Stops the running instance from writing, without closing its output.
    pub fn go_silent(&self) {
        if let Some(instance) = self.current.lock().as_ref() {
            instance.silent.store(true, Ordering::SeqCst);
        }
    }

    /// Returns the number of successful starts.
    pub fn starts(&self) -> u32 {
        self.starts.load(Ordering::SeqCst)
    }

    /// Returns the command lines passed to successful starts.
    pub fn commands(&self) -> Vec<Vec<String>> {
        self.commands.lock().clone()
    }
}

#[async_trait]
impl ProcessRunner for FakeRunner {
    type Output = DuplexStream;

    async fn start(&self, command: &[String]) -> Result<DuplexStream> {
        let mut current = self.current.lock();
        if current.is_some() {
            return Err(Error::AlreadyStarted);
        }

        if self.fail_start.load(Ordering::SeqCst) {
            let program = command.first().cloned().unwrap_or_default();
            return Err(Error::Spawn(
                program,
                std::io::Error::new(std::io::ErrorKind::NotFound, "fake start failure"),
            ));
        }

        let shutdown = CancellationToken::new();
        let silent = Arc::new(AtomicBool::new(false));
        let (writer, reader) = tokio::io::duplex(64 * 1024);

        tokio::spawn(write_records(
            writer,
            self.payload.clone(),
            self.dialect,
            self.interval,
            shutdown.clone(),
            Arc::clone(&silent),
        ));

        *current = Some(Instance { shutdown, silent });
        self.commands.lock().push(command.to_vec());
        self.starts.fetch_add(1, Ordering::SeqCst);

        Ok(reader)
    }

    async fn stop(&self) -> Result<()> {
        if let Some(instance) = self.current.lock().take() {
            instance.shutdown.cancel();
        }

        Ok(())
    }

    fn running(&self) -> bool {
        self.current.lock().is_some()
    }
}

async fn write_records(
    mut writer: DuplexStream,
    payload: String,
    dialect: Dialect,
    interval: Duration,
    shutdown: CancellationToken,
    silent: Arc<AtomicBool>,
) {
    if writer.write_all(dialect.prefix()).await.is_err() {
        return;
    }

    let mut index = 0;
    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            () = tokio::time::sleep(interval) => {}
        }

        if silent.load(Ordering::SeqCst) {
            continue;
        }

        if writer.write_all(dialect.separator(index)).await.is_err()
            || writer.write_all(payload.as_bytes()).await.is_err()
        {
            debug!("fake output closed by reader");
            return;
        }
        index += 1;
    }

    let _ = writer.write_all(dialect.suffix()).await;
}
