//! Exposes aggregated GPU statistics as Prometheus metrics.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::redundant_pub_crate)]

mod error;

pub use error::{Error, Result};

use std::sync::Arc;

use gpumon_aggregator::StatSource;
use parking_lot::Mutex;
use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{Gauge, GaugeVec, Opts, Registry};
use tracing::debug;

const NAMESPACE: &str = "gpumon";

/// Prometheus collector reporting the medians of a [`StatSource`].
///
/// Every collection drains the source, so each scrape reports the samples
/// received since the previous one.
pub struct GpuCollector<S> {
    clients: Gauge,
    collecting: Mutex<()>,
    engine_usage: GaugeVec,
    power: GaugeVec,
    source: Arc<S>,
}

impl<S> GpuCollector<S>
where
    S: StatSource,
{
    /// Creates a collector for `source`.
    ///
    /// # Errors
    ///
    /// Returns an error if the metric descriptions are invalid.
    pub fn new(source: Arc<S>) -> Result<Self> {
        let engine_usage = GaugeVec::new(
            Opts::new("usage", "Usage statistics for the different GPU engines")
                .namespace(NAMESPACE)
                .subsystem("engine"),
            &["engine", "attrib"],
        )?;

        let power = GaugeVec::new(
            Opts::new("power", "Power consumption by type").namespace(NAMESPACE),
            &["type"],
        )?;

        let clients = Gauge::with_opts(
            Opts::new("count", "Number of active clients")
                .namespace(NAMESPACE)
                .subsystem("clients"),
        )?;

        Ok(Self {
            clients,
            collecting: Mutex::new(()),
            engine_usage,
            power,
            source,
        })
    }

    /// Registers the collector with `registry`.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics clash with ones already registered.
    pub fn register(self, registry: &Registry) -> Result<()> {
        registry.register(Box::new(self))?;
        Ok(())
    }
}

impl<S> Collector for GpuCollector<S>
where
    S: StatSource,
{
    fn desc(&self) -> Vec<&Desc> {
        self.engine_usage
            .desc()
            .into_iter()
            .chain(self.power.desc())
            .chain(self.clients.desc())
            .collect()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let _collecting = self.collecting.lock();

        // Engines missing from this window must not be reported.
        self.engine_usage.reset();
        for (engine, usage) in self.source.median_engine_usage() {
            for (attrib, value) in [("busy", usage.busy), ("sema", usage.sema), ("wait", usage.wait)] {
                self.engine_usage
                    .with_label_values(&[engine.as_str(), attrib])
                    .set(value);
            }
        }

        let power = self.source.median_power();
        self.power.with_label_values(&["gpu"]).set(power.gpu);
        self.power.with_label_values(&["pkg"]).set(power.package);

        self.clients.set(self.source.median_client_count());

        self.source.reset();
        debug!("collected gpu metrics");

        let mut families = self.engine_usage.collect();
        families.extend(self.power.collect());
        families.extend(self.clients.collect());
        families
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::BTreeMap;

    use gpumon_aggregator::Aggregator;
    use gpumon_gpu_top::Sample;
    use gpumon_gpu_top::test_support::SINGLE_PAYLOAD;
    use pretty_assertions::assert_eq;
    use prometheus::{Encoder, TextEncoder};

    /// Scrapes `registry`, keyed by metric name with sorted labels.
    fn scrape(registry: &Registry) -> BTreeMap<String, f64> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&registry.gather(), &mut buffer)
            .unwrap();

        String::from_utf8(buffer)
            .unwrap()
            .lines()
            .filter(|line| !line.starts_with('#') && !line.is_empty())
            .map(|line| {
                let (series, value) = line.rsplit_once(' ').unwrap();
                let key = match series.split_once('{') {
                    Some((name, labels)) => {
                        let mut labels: Vec<&str> =
                            labels.trim_end_matches('}').split(',').collect();
                        labels.sort_unstable();
                        format!("{name}{{{}}}", labels.join(","))
                    }
                    None => series.to_string(),
                };
                (key, value.parse().unwrap())
            })
            .collect()
    }

    fn setup() -> (Arc<Aggregator>, Registry) {
        let aggregator = Arc::new(Aggregator::new());
        let registry = Registry::new();
        GpuCollector::new(Arc::clone(&aggregator))
            .unwrap()
            .register(&registry)
            .unwrap();
        (aggregator, registry)
    }

    fn single_sample() -> Sample {
        serde_json::from_str(SINGLE_PAYLOAD).unwrap()
    }

    #[test]
    fn test_collect() {
        let (aggregator, registry) = setup();
        for _ in 0..4 {
            aggregator.add(single_sample());
        }

        let want: BTreeMap<String, f64> = [
            (r#"gpumon_clients_count"#, 1.0),
            (r#"gpumon_engine_usage{attrib="busy",engine="Blitter"}"#, 2.0),
            (r#"gpumon_engine_usage{attrib="busy",engine="Render/3D"}"#, 1.0),
            (r#"gpumon_engine_usage{attrib="busy",engine="Video"}"#, 3.0),
            (r#"gpumon_engine_usage{attrib="busy",engine="VideoEnhance"}"#, 4.0),
            (r#"gpumon_engine_usage{attrib="sema",engine="Blitter"}"#, 0.0),
            (r#"gpumon_engine_usage{attrib="sema",engine="Render/3D"}"#, 0.0),
            (r#"gpumon_engine_usage{attrib="sema",engine="Video"}"#, 0.0),
            (r#"gpumon_engine_usage{attrib="sema",engine="VideoEnhance"}"#, 0.0),
            (r#"gpumon_engine_usage{attrib="wait",engine="Blitter"}"#, 0.0),
            (r#"gpumon_engine_usage{attrib="wait",engine="Render/3D"}"#, 0.0),
            (r#"gpumon_engine_usage{attrib="wait",engine="Video"}"#, 0.0),
            (r#"gpumon_engine_usage{attrib="wait",engine="VideoEnhance"}"#, 0.0),
            (r#"gpumon_power{type="gpu"}"#, 1.0),
            (r#"gpumon_power{type="pkg"}"#, 4.0),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect();

        assert_eq!(scrape(&registry), want);
        assert!(aggregator.is_empty());
    }

    #[test]
    fn test_consecutive_scrapes_cover_disjoint_windows() {
        let (aggregator, registry) = setup();
        aggregator.add(single_sample());
        scrape(&registry);

        let second = scrape(&registry);

        assert!(second.keys().all(|key| !key.starts_with("gpumon_engine_usage")));
        assert_eq!(second[r#"gpumon_power{type="gpu"}"#], 0.0);
        assert_eq!(second[r#"gpumon_power{type="pkg"}"#], 0.0);
        assert_eq!(second["gpumon_clients_count"], 0.0);
    }

    #[test]
    fn test_vanished_engine_is_dropped() {
        let (aggregator, registry) = setup();
        aggregator.add(single_sample());
        scrape(&registry);

        let mut sample = single_sample();
        sample.engines.retain(|name, _| name == "Video");
        aggregator.add(sample);

        let engines: Vec<String> = scrape(&registry)
            .into_keys()
            .filter(|key| key.starts_with("gpumon_engine_usage"))
            .collect();

        assert_eq!(
            engines,
            vec![
                r#"gpumon_engine_usage{attrib="busy",engine="Video"}"#,
                r#"gpumon_engine_usage{attrib="sema",engine="Video"}"#,
                r#"gpumon_engine_usage{attrib="wait",engine="Video"}"#,
            ]
        );
    }

    #[test]
    fn test_desc_is_fixed() {
        let collector = GpuCollector::new(Arc::new(Aggregator::new())).unwrap();

        let names: Vec<&str> = collector.desc().iter().map(|desc| desc.fq_name.as_str()).collect();
        assert_eq!(
            names,
            vec!["gpumon_engine_usage", "gpumon_power", "gpumon_clients_count"]
        );

        collector.collect();

        assert_eq!(collector.desc().len(), 3);
    }

    #[test]
    fn test_register_twice_fails() {
        let registry = Registry::new();
        let aggregator = Arc::new(Aggregator::new());

        GpuCollector::new(Arc::clone(&aggregator))
            .unwrap()
            .register(&registry)
            .unwrap();

        assert!(matches!(
            GpuCollector::new(aggregator).unwrap().register(&registry),
            Err(Error::Prometheus(_))
        ));
    }
}
