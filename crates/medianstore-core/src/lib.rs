//! medianstore core: run-length entries, batch normalization, and the
//! dual-partition median store.
//!
//! This crate holds the order-statistics algorithm and the error surface
//! shared by the engine runtime. It carries no async runtime dependency so the
//! algorithm can be exercised synchronously in tests and reused elsewhere.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! Arithmetic on counts is checked and surfaces as `MedianStoreError`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod batch;
pub mod entry;
pub mod error;
pub mod partition;

pub use batch::Normalized;
pub use entry::Entry;
pub use partition::{DualPartition, MergeOutcome, PartitionSnapshot, Rebalance};

/// Shared result type.
pub use error::{ErrorCode, MedianStoreError, Result};
