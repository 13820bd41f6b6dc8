//! Wired store: one engine, one aggregator in front of it, shared metrics.

use std::sync::Arc;

use medianstore_core::{Entry, PartitionSnapshot, Result};

use crate::aggregator::Aggregator;
use crate::config::MedianStoreConfig;
use crate::engine::MedianEngine;
use crate::metric::Metric;
use crate::obs::StoreMetrics;

pub struct MedianStore {
    engine: Arc<MedianEngine>,
    aggregator: Aggregator,
    metrics: Arc<StoreMetrics>,
}

impl MedianStore {
    /// Validate `cfg`, then start the engine and the aggregator.
    pub fn open(cfg: &MedianStoreConfig) -> Result<Self> {
        cfg.validate()?;

        let metrics = Arc::new(StoreMetrics::new());
        let engine = Arc::new(MedianEngine::open(&cfg.engine, Arc::clone(&metrics)));
        let aggregator =
            Aggregator::start(&cfg.aggregator, Arc::clone(&engine), Arc::clone(&metrics));

        Ok(Self {
            engine,
            aggregator,
            metrics,
        })
    }

    /// Single sample through the aggregator.
    pub async fn write<M: Metric + ?Sized>(&self, metric: &M) -> Result<()> {
        self.aggregator.write(metric).await
    }

    /// Pre-aggregated batch straight to the engine.
    pub async fn bulk_write(&self, entries: Vec<Entry>) -> Result<()> {
        self.engine.bulk_write(entries).await
    }

    pub fn median(&self) -> i64 {
        self.engine.median()
    }

    pub fn try_median(&self) -> Option<i64> {
        self.engine.try_median()
    }

    pub async fn snapshot(&self) -> Result<PartitionSnapshot> {
        self.engine.snapshot().await
    }

    pub fn engine(&self) -> Arc<MedianEngine> {
        Arc::clone(&self.engine)
    }

    pub fn metrics_text(&self) -> String {
        self.metrics.render(self.engine.try_median())
    }

    /// Stop the aggregator (final flush accepted), then close the engine.
    pub async fn shutdown(self) -> Result<()> {
        self.aggregator.stop().await?;
        MedianEngine::clone(&self.engine).close().await
    }
}
