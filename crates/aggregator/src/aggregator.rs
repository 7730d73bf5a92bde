use std::collections::BTreeMap;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use futures::{StreamExt, pin_mut};
use gpumon_gpu_top::{EngineUsage, Sample, read_samples};
use parking_lot::RwLock;
use tokio::io::AsyncRead;
use tokio::time::Instant;
use tracing::{debug, error};

use crate::StatSource;
use crate::error::Result;
use crate::median::median;

/// Median power draw over a window of samples.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PowerUsage {
    /// GPU power draw.
    pub gpu: f64,

    /// Package power draw.
    pub package: f64,
}

/// Buffers samples and computes medians over them.
///
/// The time of the last sample is tracked separately from the buffer, so
/// checking it never waits on readers or writers of the buffer.
#[derive(Debug, Default)]
pub struct Aggregator {
    samples: RwLock<Vec<Sample>>,
    last_update: ArcSwapOption<Instant>,
}

impl Aggregator {
    /// Creates an empty aggregator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a sample to the buffer.
    pub fn add(&self, sample: Sample) {
        self.samples.write().push(sample);
        self.touch();
    }

    /// Adds every sample decoded from `source` until it ends.
    ///
    /// # Errors
    ///
    /// Returns the error that ended the sample stream, if any. Samples
    /// decoded before the error are kept.
    pub async fn read<R>(&self, source: R) -> Result<()>
    where
        R: AsyncRead + Unpin,
    {
        let samples = read_samples(source);
        pin_mut!(samples);

        while let Some(sample) = samples.next().await {
            match sample {
                Ok(sample) => self.add(sample),
                Err(e) => {
                    error!("failed to read gpu top output: {}", e);
                    return Err(e.into());
                }
            }
        }

        debug!("gpu top output closed");

        Ok(())
    }

    /// Returns the time the last sample was added, or the last
    /// [`touch`](Self::touch).
    #[must_use]
    pub fn last_update(&self) -> Option<Instant> {
        self.last_update.load().as_deref().copied()
    }

    /// Marks the aggregator as updated now, without adding a sample.
    pub fn touch(&self) {
        self.last_update.store(Some(Arc::new(Instant::now())));
    }

    /// Returns the number of buffered samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.read().len()
    }

    /// Returns `true` if no samples are buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.read().is_empty()
    }
}

impl StatSource for Aggregator {
    fn median_power(&self) -> PowerUsage {
        let samples = self.samples.read();

        PowerUsage {
            gpu: median(samples.iter().map(|s| s.power.gpu).collect()),
            package: median(samples.iter().map(|s| s.power.package).collect()),
        }
    }

    fn median_engine_usage(&self) -> BTreeMap<String, EngineUsage> {
        let samples = self.samples.read();

        let mut grouped: BTreeMap<&str, Vec<&EngineUsage>> = BTreeMap::new();
        for sample in samples.iter() {
            for (name, usage) in &sample.engines {
                grouped.entry(name.as_str()).or_default().push(usage);
            }
        }

        grouped
            .into_iter()
            .map(|(name, usages)| {
                let usage = EngineUsage {
                    busy: median(usages.iter().map(|u| u.busy).collect()),
                    sema: median(usages.iter().map(|u| u.sema).collect()),
                    wait: median(usages.iter().map(|u| u.wait).collect()),
                    unit: usages[0].unit.clone(),
                };
                (name.to_string(), usage)
            })
            .collect()
    }

    #[allow(clippy::cast_precision_loss)]
    fn median_client_count(&self) -> f64 {
        let samples = self.samples.read();

        median(samples.iter().map(|s| s.clients.len() as f64).collect())
    }

    fn reset(&self) {
        self.samples.write().clear();
    }
}
