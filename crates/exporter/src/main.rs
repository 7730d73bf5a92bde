//! Exports Intel GPU statistics from `intel_gpu_top` to Prometheus.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::redundant_pub_crate)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use gpumon_aggregator::Aggregator;
use gpumon_collector::GpuCollector;
use gpumon_exporter::{MetricsServer, Result};
use gpumon_supervisor::{GpuTopCommand, GpuTopRunner, TopReader, TopReaderOptions};
use prometheus::Registry;
use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;
use tracing::{Level, debug, error, info};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Prometheus metrics listener address
    #[arg(long, env = "GPUMON_ADDR", default_value = "0.0.0.0:9090")]
    addr: SocketAddr,

    /// Enable debug logging
    #[arg(long, env = "GPUMON_DEBUG")]
    debug: bool,

    /// Device to monitor, passed to `intel_gpu_top -d`
    #[arg(long, env = "GPUMON_DEVICE")]
    device: Option<String>,

    /// Path to `intel_gpu_top`, looked up on `PATH` if not set
    #[arg(long, env = "GPUMON_GPU_TOP_BIN")]
    gpu_top_bin: Option<PathBuf>,

    /// Sampling interval of `intel_gpu_top` in milliseconds
    #[arg(long, env = "GPUMON_INTERVAL_MS", default_value_t = 5000)]
    interval_ms: u64,

    /// Seconds without samples before `intel_gpu_top` is restarted
    #[arg(long, env = "GPUMON_TIMEOUT_SECS", default_value_t = 15)]
    timeout_secs: u64,
}

impl Args {
    fn command(&self) -> Result<GpuTopCommand> {
        let command = match &self.gpu_top_bin {
            Some(bin) => GpuTopCommand::new(bin),
            None => GpuTopCommand::locate()?,
        };

        Ok(match &self.device {
            Some(device) => command.with_device(device),
            None => command,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing::subscriber::set_global_default(
        FmtSubscriber::builder()
            .with_max_level(if args.debug { Level::DEBUG } else { Level::INFO })
            .finish(),
    )?;

    info!(
        "intel-gpu-exporter {} starting on {}",
        env!("CARGO_PKG_VERSION"),
        args.addr
    );

    let command = args.command()?;
    debug!("using {}", command.binary().display());

    let aggregator = Arc::new(Aggregator::new());
    let registry = Registry::new();
    GpuCollector::new(Arc::clone(&aggregator))?.register(&registry)?;

    let server = MetricsServer::new(args.addr, registry);
    server.start().await?;

    let shutdown_token = CancellationToken::new();
    let signal_shutdown_token = shutdown_token.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("shutting down");
        signal_shutdown_token.cancel();
    });

    let mut options = TopReaderOptions::new(Arc::new(GpuTopRunner::new()), aggregator, command);
    options.sample_interval = Duration::from_millis(args.interval_ms);
    options.timeout = Duration::from_secs(args.timeout_secs);
    let reader = TopReader::new(options);

    let result = reader.run(shutdown_token).await;

    server.shutdown().await;

    if let Err(e) = result {
        error!("intel-gpu-exporter failed to run: {}", e);
        return Err(e.into());
    }

    info!("intel-gpu-exporter stopped");

    Ok(())
}

async fn wait_for_signal() {
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            error!("failed to install SIGTERM handler: {}", e);
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("failed to wait for SIGINT: {}", e);
            }
            return;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM"),
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => info!("received SIGINT"),
            Err(e) => error!("failed to wait for SIGINT: {}", e),
        },
    }
}
