use std::time::Duration;

use gpumon_aggregator::{Aggregator, PowerUsage, StatSource};
use gpumon_gpu_top::test_support::{Dialect, SINGLE_PAYLOAD, fake_server};
use pretty_assertions::assert_eq;

#[tokio::test(start_paused = true)]
async fn test_single_payload_four_times() {
    for dialect in Dialect::ALL {
        let aggregator = Aggregator::new();
        let source = fake_server(SINGLE_PAYLOAD, 4, dialect, Duration::from_millis(250));

        aggregator.read(source).await.unwrap();

        assert_eq!(aggregator.len(), 4, "dialect {dialect:?}");
        assert!((aggregator.median_client_count() - 1.0).abs() < f64::EPSILON);
        assert_eq!(
            aggregator.median_power(),
            PowerUsage {
                gpu: 1.0,
                package: 4.0
            }
        );

        let busy: Vec<(String, f64)> = aggregator
            .median_engine_usage()
            .into_iter()
            .map(|(name, usage)| (name, usage.busy))
            .collect();
        assert_eq!(
            busy,
            vec![
                ("Blitter".to_string(), 2.0),
                ("Render/3D".to_string(), 1.0),
                ("Video".to_string(), 3.0),
                ("VideoEnhance".to_string(), 4.0),
            ],
            "dialect {dialect:?}"
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_reset_between_reads_gives_disjoint_windows() {
    let aggregator = Aggregator::new();

    aggregator
        .read(fake_server(SINGLE_PAYLOAD, 2, Dialect::Bare, Duration::from_millis(10)))
        .await
        .unwrap();
    assert_eq!(aggregator.len(), 2);

    aggregator.reset();

    aggregator
        .read(fake_server("{}", 3, Dialect::ArrayWithCommas, Duration::from_millis(10)))
        .await
        .unwrap();

    assert_eq!(aggregator.len(), 3);
    assert!(aggregator.median_client_count().abs() < f64::EPSILON);
    assert!(aggregator.median_engine_usage().is_empty());
}
