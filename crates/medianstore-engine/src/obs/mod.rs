//! In-process store metrics.
//!
//! Counters, gauges and a fixed-bucket histogram kept as atomics and rendered
//! in Prometheus text exposition format on demand.

pub mod metrics;

pub use metrics::StoreMetrics;
