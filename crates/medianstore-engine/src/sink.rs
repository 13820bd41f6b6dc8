//! Seam between the aggregator and whatever stores its batches.

use async_trait::async_trait;

use medianstore_core::{Entry, Result};

/// Batch-oriented median store. Implemented by [`crate::MedianEngine`].
#[async_trait]
pub trait MedianSink: Send + Sync {
    /// Resolves once the owner accepted the batch, not once it is merged.
    async fn bulk_write(&self, entries: Vec<Entry>) -> Result<()>;

    /// Last published median (0 before anything was published).
    fn median(&self) -> i64;
}
