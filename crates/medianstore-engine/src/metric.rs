//! Raw metric capability consumed by the aggregator.

/// Anything that carries a single integer sample.
pub trait Metric {
    fn value(&self) -> i64;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntMetric {
    value: i64,
}

impl IntMetric {
    pub fn new(value: i64) -> Self {
        Self { value }
    }
}

impl Metric for IntMetric {
    fn value(&self) -> i64 {
        self.value
    }
}

impl Metric for i64 {
    fn value(&self) -> i64 {
        *self
    }
}
