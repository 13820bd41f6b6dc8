//! medianstore engine library entry.
//!
//! Wires the dual-partition core into tokio owner tasks: the median engine,
//! the aggregator in front of it, strict YAML config, and in-process metrics.

pub mod aggregator;
pub mod config;
pub mod engine;
pub mod metric;
pub mod obs;
pub mod sink;
pub mod store;

pub use aggregator::Aggregator;
pub use config::MedianStoreConfig;
pub use engine::MedianEngine;
pub use metric::{IntMetric, Metric};
pub use sink::MedianSink;
pub use store::MedianStore;
