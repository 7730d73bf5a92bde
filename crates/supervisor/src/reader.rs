use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use gpumon_aggregator::Aggregator;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::command::GpuTopCommand;
use crate::error::Result;
use crate::runner::ProcessRunner;

/// Default time between health checks.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// Default time without samples after which the process is restarted.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Default sampling interval passed to `intel_gpu_top`.
pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_millis(5000);

/// Time ingestion tasks get to finish on shutdown.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// What a health check decided to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HealthAction {
    /// Samples are arriving.
    Healthy,

    /// No process is running.
    Start,

    /// The running process has stopped producing samples.
    Restart,
}

/// Decides what to do given the state of the process and the time of the
/// last sample.
#[must_use]
pub fn health_action(
    running: bool,
    last_update: Option<Instant>,
    now: Instant,
    timeout: Duration,
) -> HealthAction {
    let fresh = last_update.is_some_and(|last| now.saturating_duration_since(last) < timeout);

    if fresh {
        HealthAction::Healthy
    } else if running {
        HealthAction::Restart
    } else {
        HealthAction::Start
    }
}

/// Options for creating a [`TopReader`].
pub struct TopReaderOptions<R> {
    /// Aggregator the samples are added to.
    pub aggregator: Arc<Aggregator>,

    /// Time between health checks.
    pub check_interval: Duration,

    /// Command line builder.
    pub command: GpuTopCommand,

    /// Runner for the process.
    pub runner: Arc<R>,

    /// Sampling interval passed to the process.
    pub sample_interval: Duration,

    /// Time without samples after which the process is restarted.
    pub timeout: Duration,
}

impl<R> TopReaderOptions<R> {
    /// Creates options with the default intervals.
    pub fn new(runner: Arc<R>, aggregator: Arc<Aggregator>, command: GpuTopCommand) -> Self {
        Self {
            aggregator,
            check_interval: DEFAULT_CHECK_INTERVAL,
            command,
            runner,
            sample_interval: DEFAULT_SAMPLE_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Keeps `intel_gpu_top` running and feeding the aggregator.
///
/// The process is restarted whenever no sample has arrived for longer than
/// the timeout.
pub struct TopReader<R> {
    aggregator: Arc<Aggregator>,
    check_interval: Duration,
    command: GpuTopCommand,
    restarts: AtomicU32,
    runner: Arc<R>,
    sample_interval: Duration,
    task_tracker: TaskTracker,
    timeout: Duration,
}

impl<R> TopReader<R>
where
    R: ProcessRunner,
{
    /// Creates a new `TopReader`.
    pub fn new(
        TopReaderOptions {
            aggregator,
            check_interval,
            command,
            runner,
            sample_interval,
            timeout,
        }: TopReaderOptions<R>,
    ) -> Self {
        Self {
            aggregator,
            check_interval,
            command,
            restarts: AtomicU32::new(0),
            runner,
            sample_interval,
            task_tracker: TaskTracker::new(),
            timeout,
        }
    }

    /// Returns the number of restarts caused by the timeout.
    pub fn restarts(&self) -> u32 {
        self.restarts.load(Ordering::Relaxed)
    }

    /// Runs health checks until `shutdown` is cancelled, then stops the
    /// process.
    ///
    /// # Errors
    ///
    /// Returns an error if the process could not be started.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        let mut ticker = tokio::time::interval(self.check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.check().await {
                        error!("failed to start gpu top: {}", e);
                        self.stop().await;
                        return Err(e);
                    }
                }
            }
        }

        self.stop().await;

        Ok(())
    }

    async fn check(&self) -> Result<()> {
        let last_update = self.aggregator.last_update();
        let now = Instant::now();

        match health_action(self.runner.running(), last_update, now, self.timeout) {
            HealthAction::Healthy => Ok(()),
            HealthAction::Start => self.launch().await,
            HealthAction::Restart => {
                warn!(
                    "no samples for {:?}, restarting gpu top",
                    last_update.map(|last| now.saturating_duration_since(last))
                );

                if let Err(e) = self.runner.stop().await {
                    error!("failed to stop gpu top: {}", e);
                }
                self.restarts.fetch_add(1, Ordering::Relaxed);

                self.launch().await
            }
        }
    }

    async fn launch(&self) -> Result<()> {
        let command = self.command.build(self.sample_interval);
        info!("starting {}", command.join(" "));

        let output = self.runner.start(&command).await?;

        let aggregator = Arc::clone(&self.aggregator);
        self.task_tracker.spawn(async move {
            match aggregator.read(output).await {
                Ok(()) => debug!("ingestion finished"),
                Err(e) => debug!("ingestion stopped: {}", e),
            }
        });

        self.aggregator.touch();

        Ok(())
    }

    async fn stop(&self) {
        info!("stopping gpu top...");

        if let Err(e) = self.runner.stop().await {
            error!("failed to stop gpu top: {}", e);
        }

        self.task_tracker.close();
        if tokio::time::timeout(DRAIN_TIMEOUT, self.task_tracker.wait())
            .await
            .is_err()
        {
            warn!("ingestion tasks did not finish within {:?}", DRAIN_TIMEOUT);
        }

        info!("gpu top stopped");
    }
}
