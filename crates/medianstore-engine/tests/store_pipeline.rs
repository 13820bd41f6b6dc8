//! Aggregator -> engine end to end.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;

use medianstore_core::Entry;
use medianstore_engine::config::{AggregatorSection, EngineSection};
use medianstore_engine::obs::StoreMetrics;
use medianstore_engine::{config, Aggregator, IntMetric, MedianEngine, MedianStore};

fn cfg(buffer_size: u64) -> config::MedianStoreConfig {
    let yaml = format!(
        "version: 1\naggregator:\n  buffer_size: {buffer_size}\n  flush_interval_ms: 60000\n"
    );
    config::load_from_str(&yaml).unwrap()
}

#[tokio::test]
async fn samples_flow_through_to_the_median() {
    let store = MedianStore::open(&cfg(4)).unwrap();
    let engine = store.engine();
    let metrics = Arc::clone(engine.metrics());

    for v in 1..=9 {
        store.write(&IntMetric::new(v)).await.unwrap();
    }
    store.shutdown().await.unwrap();

    assert_eq!(engine.median(), 5);
    assert_eq!(engine.try_median(), Some(5));
    assert_eq!(metrics.occurrences.get(&[]), 9);
    assert_eq!(metrics.flushes.get(&[("trigger", "size")]), 2);
    assert_eq!(metrics.flushes.get(&[("trigger", "stop")]), 1);
}

#[tokio::test]
async fn bulk_and_single_writes_land_in_one_store() {
    let store = MedianStore::open(&cfg(1)).unwrap();

    store
        .bulk_write(vec![Entry::with_count(10, 3), Entry::with_count(20, 3)])
        .await
        .unwrap();
    store.write(&15i64).await.unwrap();

    // single writes are flushed asynchronously; wait until the engine has them
    let mut snap = store.snapshot().await.unwrap();
    for _ in 0..100 {
        if snap.total == 7 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        snap = store.snapshot().await.unwrap();
    }
    snap.check_invariants().unwrap();
    assert_eq!(snap.total, 7);
    // 10 10 10 [15] 20 20 20
    assert_eq!(store.median(), 15);

    let text = store.metrics_text();
    assert!(text.contains("medianstore_median 15"));
    assert!(text.contains("medianstore_batches_merged_total 2"));

    store.shutdown().await.unwrap();
}

#[test]
fn open_rejects_invalid_config() {
    let mut bad = config::MedianStoreConfig::default();
    bad.aggregator.buffer_size = 0;
    let err = MedianStore::open(&bad).err().expect("must fail");
    assert_eq!(err.code().as_str(), "INVALID_CONFIG");
}

#[tokio::test]
async fn stop_reports_final_flush_lost_to_closed_engine() {
    let metrics = Arc::new(StoreMetrics::new());
    let engine = MedianEngine::open(&EngineSection::default(), Arc::clone(&metrics));
    let cfg = AggregatorSection {
        buffer_size: 100,
        flush_interval_ms: 60_000,
    };
    let agg = Aggregator::start(&cfg, Arc::new(engine.clone()), Arc::clone(&metrics));

    for v in [3i64, 1, 2] {
        agg.write(&v).await.unwrap();
    }
    engine.close().await.unwrap();

    let err = agg.stop().await.unwrap_err();
    assert_eq!(err.code().as_str(), "CLOSED");
    assert_eq!(metrics.occurrences.get(&[]), 0);
    assert_eq!(metrics.flush_errors.get(&[]), 1);
}
