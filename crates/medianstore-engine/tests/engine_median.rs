//! Owner-task behavior of the median engine.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;

use medianstore_core::{Entry, PartitionSnapshot};
use medianstore_engine::config::EngineSection;
use medianstore_engine::obs::StoreMetrics;
use medianstore_engine::MedianEngine;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn open() -> MedianEngine {
    init_tracing();
    MedianEngine::open(&EngineSection::default(), Arc::new(StoreMetrics::new()))
}

fn run(lo: i64, hi: i64) -> Vec<Entry> {
    (lo..hi).map(Entry::new).collect()
}

fn pairs(part: &[Entry]) -> Vec<(i64, u64)> {
    part.iter().map(|e| (e.value(), e.count())).collect()
}

#[tokio::test]
async fn nothing_published_before_first_merge() {
    let engine = open();
    assert_eq!(engine.median(), 0);
    assert_eq!(engine.try_median(), None);

    engine.bulk_write(Vec::new()).await.unwrap();
    let snap = engine.snapshot().await.unwrap();
    assert_eq!(snap, PartitionSnapshot::default());
    assert_eq!(engine.try_median(), None);

    engine.close().await.unwrap();
}

#[tokio::test]
async fn nine_values_then_repeated_median() {
    let engine = open();

    engine.bulk_write(run(0, 9)).await.unwrap();
    let snap = engine.snapshot().await.unwrap();
    assert_eq!(pairs(&snap.low), vec![(0, 1), (1, 1), (2, 1), (3, 1), (4, 1)]);
    assert_eq!(pairs(&snap.high), vec![(5, 1), (6, 1), (7, 1), (8, 1)]);
    assert_eq!(engine.median(), 4);

    engine.bulk_write(vec![Entry::with_count(4, 4)]).await.unwrap();
    let snap = engine.snapshot().await.unwrap();
    snap.check_invariants().unwrap();
    assert_eq!(snap.total, 13);
    let fours: u64 = snap
        .low
        .iter()
        .chain(snap.high.iter())
        .filter(|e| e.value() == 4)
        .map(Entry::count)
        .sum();
    assert_eq!(fours, 5);
    assert_eq!(snap.low.last().map(Entry::value), Some(4));
    assert_eq!(engine.median(), 4);

    engine.close().await.unwrap();
}

#[tokio::test]
async fn two_values_average_truncates() {
    let engine = open();
    engine
        .bulk_write(vec![Entry::new(2), Entry::new(1)])
        .await
        .unwrap();
    engine.snapshot().await.unwrap();
    assert_eq!(engine.median(), 1);
    assert_eq!(engine.try_median(), Some(1));
    engine.close().await.unwrap();
}

#[tokio::test]
async fn count_one_repeats_match_single_bulk_entry() {
    let repeated = open();
    let bulk = open();

    repeated.bulk_write(run(-10, 10)).await.unwrap();
    bulk.bulk_write(run(-10, 10)).await.unwrap();

    for _ in 0..11 {
        repeated.bulk_write(vec![Entry::new(3)]).await.unwrap();
    }
    bulk.bulk_write(vec![Entry::with_count(3, 11)]).await.unwrap();

    let a = repeated.snapshot().await.unwrap();
    let b = bulk.snapshot().await.unwrap();
    assert_eq!(a, b);
    assert_eq!(repeated.median(), bulk.median());

    repeated.close().await.unwrap();
    bulk.close().await.unwrap();
}

#[tokio::test]
async fn intra_batch_duplicates_are_summed() {
    let engine = open();
    engine
        .bulk_write(vec![Entry::new(5), Entry::with_count(5, 2), Entry::new(1)])
        .await
        .unwrap();
    let snap = engine.snapshot().await.unwrap();
    snap.check_invariants().unwrap();
    assert_eq!(snap.total, 4);
    // 1, 5, 5, 5
    assert_eq!(engine.median(), 5);
    engine.close().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_writers_keep_invariants() {
    let engine = open();
    let writers = 4u64;
    let batches = 50u64;

    let mut handles = Vec::new();
    for w in 0..writers {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            for b in 0..batches {
                let base = ((w * 31 + b * 7) % 40) as i64 - 20;
                let batch = vec![
                    Entry::with_count(base, 1 + b % 3),
                    Entry::with_count(base + 5, 2),
                    Entry::new(base * 3),
                ];
                engine.bulk_write(batch).await.unwrap();
                // never torn: always a value some merge produced
                let _ = engine.median();
            }
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    let snap = engine.snapshot().await.unwrap();
    snap.check_invariants().unwrap();

    let mut expected = 0u64;
    for _w in 0..writers {
        for b in 0..batches {
            expected += (1 + b % 3) + 2 + 1;
        }
    }
    assert_eq!(snap.total, expected);
    assert_eq!(
        engine.metrics().batches_merged.get(&[]),
        writers * batches
    );

    engine.close().await.unwrap();
}

#[tokio::test]
async fn close_drains_accepted_batches() {
    let engine = open();
    let metrics = Arc::clone(engine.metrics());

    for i in 0..20 {
        engine.bulk_write(vec![Entry::new(i)]).await.unwrap();
    }
    let reader = engine.clone();
    engine.close().await.unwrap();

    assert_eq!(metrics.batches_merged.get(&[]), 20);
    assert_eq!(metrics.occurrences.get(&[]), 20);
    // published value survives close
    assert_eq!(reader.median(), 9);
}

#[tokio::test]
async fn handles_fail_fast_after_close() {
    let engine = open();
    let survivor = engine.clone();
    engine.close().await.unwrap();

    let err = survivor.bulk_write(vec![Entry::new(1)]).await.unwrap_err();
    assert_eq!(err.code().as_str(), "CLOSED");
    let err = survivor.snapshot().await.unwrap_err();
    assert_eq!(err.code().as_str(), "CLOSED");
    let err = survivor.close().await.unwrap_err();
    assert_eq!(err.code().as_str(), "CLOSED");
}
