//! Median engine: one owner task, many handles.
//!
//! Responsibilities:
//! - Own the [`DualPartition`] exclusively inside a spawned task
//! - Accept batches over a rendezvous handoff (channel slot + accept ack)
//! - Merge batches strictly in arrival order
//! - Publish the median as a single atomic scalar after each merge
//!
//! Reads never touch the partitions; `median()` is one atomic load.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use medianstore_core::partition::Rebalance;
use medianstore_core::{
    DualPartition, Entry, MedianStoreError, Normalized, PartitionSnapshot, Result,
};

use crate::config::EngineSection;
use crate::obs::StoreMetrics;
use crate::sink::MedianSink;

enum Command {
    Write {
        batch: Normalized,
        accepted: oneshot::Sender<()>,
    },
    Snapshot {
        reply: oneshot::Sender<PartitionSnapshot>,
    },
    Close {
        done: oneshot::Sender<()>,
    },
}

/// Median published by the owner task.
///
/// `ready` flips once, after the first store; `value` is never torn.
#[derive(Default)]
struct Published {
    value: AtomicI64,
    ready: AtomicBool,
}

impl Published {
    fn store(&self, median: i64) {
        self.value.store(median, Ordering::Release);
        self.ready.store(true, Ordering::Release);
    }
}

/// Handle to the engine's owner task. Cheap to clone.
#[derive(Clone)]
pub struct MedianEngine {
    tx: mpsc::Sender<Command>,
    published: Arc<Published>,
    metrics: Arc<StoreMetrics>,
}

impl MedianEngine {
    /// Spawn the owner task. Must be called inside a tokio runtime.
    pub fn open(cfg: &EngineSection, metrics: Arc<StoreMetrics>) -> Self {
        // one slot: a sender waits for the previous item to be taken
        let (tx, rx) = mpsc::channel::<Command>(1);
        let published = Arc::new(Published::default());

        let owner = Owner {
            rx,
            store: DualPartition::with_capacity(cfg.initial_capacity),
            published: Arc::clone(&published),
            metrics: Arc::clone(&metrics),
        };
        tokio::spawn(owner.run());

        tracing::info!(initial_capacity = cfg.initial_capacity, "median engine opened");
        Self {
            tx,
            published,
            metrics,
        }
    }

    /// Hand a batch to the owner task.
    ///
    /// Sorting and coalescing happen here, on the caller, so the owner only
    /// merges. Returns once the owner has taken the batch; the merge itself
    /// may still be running.
    pub async fn bulk_write(&self, entries: Vec<Entry>) -> Result<()> {
        let batch = Normalized::from(entries);
        let (accepted, ack) = oneshot::channel();
        self.tx
            .send(Command::Write { batch, accepted })
            .await
            .map_err(|_| MedianStoreError::Closed)?;
        ack.await.map_err(|_| MedianStoreError::Closed)
    }

    /// Last published median, 0 until the first non-empty merge completes.
    pub fn median(&self) -> i64 {
        self.published.value.load(Ordering::Acquire)
    }

    /// Like [`median`](Self::median) but `None` before anything was published.
    pub fn try_median(&self) -> Option<i64> {
        if self.published.ready.load(Ordering::Acquire) {
            Some(self.published.value.load(Ordering::Acquire))
        } else {
            None
        }
    }

    /// Copy of both partitions, taken after every batch accepted before it.
    pub async fn snapshot(&self) -> Result<PartitionSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Snapshot { reply })
            .await
            .map_err(|_| MedianStoreError::Closed)?;
        rx.await.map_err(|_| MedianStoreError::Closed)
    }

    pub fn metrics(&self) -> &Arc<StoreMetrics> {
        &self.metrics
    }

    /// Stop the owner task and wait for its acknowledgment.
    ///
    /// Every batch accepted before this call has been merged when it returns.
    /// Clones left behind get `Closed` on their next call.
    pub async fn close(self) -> Result<()> {
        let (done, rx) = oneshot::channel();
        self.tx
            .send(Command::Close { done })
            .await
            .map_err(|_| MedianStoreError::Closed)?;
        rx.await.map_err(|_| MedianStoreError::Closed)?;
        tracing::info!(median = ?self.try_median(), "median engine closed");
        Ok(())
    }
}

#[async_trait]
impl MedianSink for MedianEngine {
    async fn bulk_write(&self, entries: Vec<Entry>) -> Result<()> {
        MedianEngine::bulk_write(self, entries).await
    }

    fn median(&self) -> i64 {
        MedianEngine::median(self)
    }
}

struct Owner {
    rx: mpsc::Receiver<Command>,
    store: DualPartition,
    published: Arc<Published>,
    metrics: Arc<StoreMetrics>,
}

impl Owner {
    async fn run(mut self) {
        while let Some(cmd) = self.rx.recv().await {
            match cmd {
                Command::Write { batch, accepted } => {
                    // release the caller before merging
                    let _ = accepted.send(());
                    self.merge(batch);
                }
                Command::Snapshot { reply } => {
                    let _ = reply.send(self.store.snapshot());
                }
                Command::Close { done } => {
                    tracing::debug!(total = self.store.total(), "engine owner stopping");
                    let _ = done.send(());
                    return;
                }
            }
        }
        tracing::warn!(total = self.store.total(), "all engine handles dropped without close");
    }

    fn merge(&mut self, batch: Normalized) {
        if batch.is_empty() {
            return;
        }

        let started = Instant::now();
        let outcome = match self.store.merge(batch) {
            Ok(outcome) => outcome,
            Err(e) => {
                self.metrics.merge_errors.inc(&[("code", e.code().as_str())]);
                tracing::error!(error = %e, poisoned = self.store.is_poisoned(), "merge failed");
                return;
            }
        };

        if let Some(median) = outcome.median {
            self.published.store(median);
        }

        let m = &self.metrics;
        m.merge_duration.observe(&[], started.elapsed());
        m.batches_merged.inc(&[]);
        m.occurrences.add(&[], outcome.accepted());
        match outcome.rebalance {
            Rebalance::LowToHigh(k) => m.rebalanced.add(&[("direction", "low_to_high")], k),
            Rebalance::HighToLow(k) => m.rebalanced.add(&[("direction", "high_to_low")], k),
            Rebalance::None => {}
        }
        m.partition_entries
            .set(&[("partition", "low")], gauge_value(self.store.low_entries()));
        m.partition_entries
            .set(&[("partition", "high")], gauge_value(self.store.high_entries()));

        tracing::debug!(
            low_offset = outcome.low_offset,
            high_offset = outcome.high_offset,
            rebalance = ?outcome.rebalance,
            total = self.store.total(),
            median = ?outcome.median,
            "batch merged"
        );
    }
}

fn gauge_value(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}
