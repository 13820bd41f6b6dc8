//! Run-length entry: one value and how many times it occurs.

use crate::error::{MedianStoreError, Result};

/// `value` occurs `count` times in the stored multiset.
///
/// The value is fixed at construction. Counts change only through the
/// increment/decrement methods, which the owner task drives during merge and
/// rebalance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    value: i64,
    count: u64,
}

impl Entry {
    /// First occurrence of `value` (count = 1).
    pub fn new(value: i64) -> Self {
        Self { value, count: 1 }
    }

    pub fn with_count(value: i64, count: u64) -> Self {
        Self { value, count }
    }

    pub fn value(&self) -> i64 {
        self.value
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn increment(&mut self) {
        self.increment_by(1);
    }

    /// Saturates at `u64::MAX`.
    pub fn increment_by(&mut self, n: u64) {
        self.count = self.count.saturating_add(n);
    }

    /// Remove `n` occurrences. Fails without touching the count if the entry
    /// holds fewer than `n`.
    pub fn decrement_by(&mut self, n: u64) -> Result<()> {
        self.count = self
            .count
            .checked_sub(n)
            .ok_or(MedianStoreError::CountUnderflow {
                value: self.value,
                count: self.count,
                by: n,
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn new_starts_at_one() {
        let mut e = Entry::new(42);
        assert_eq!(e.value(), 42);
        assert_eq!(e.count(), 1);
        e.increment();
        e.increment_by(3);
        assert_eq!(e.count(), 5);
        e.decrement_by(5).unwrap();
        assert_eq!(e.count(), 0);
    }

    #[test]
    fn decrement_past_zero_is_rejected() {
        let mut e = Entry::with_count(-3, 2);
        let err = e.decrement_by(3).unwrap_err();
        assert_eq!(err.code().as_str(), "COUNT_UNDERFLOW");
        // untouched
        assert_eq!(e.count(), 2);
    }
}
