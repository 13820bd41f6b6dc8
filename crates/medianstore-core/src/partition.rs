//! Dual-partition median store.
//!
//! Occurrences live in two ordered runs of [`Entry`]:
//! - `low`: the smaller half, median candidate at its tail
//! - `high`: the larger half, median candidate at its head
//!
//! After every completed merge:
//! - values are strictly increasing inside each partition
//! - `max(low) <= min(high)` (a run split by rebalance may sit on both sides of
//!   the boundary with the same value)
//! - `low` holds `ceil(n / 2)` occurrences and `high` holds `floor(n / 2)`
//!
//! Because both halves are determined by the multiset alone, the layout after
//! a merge does not depend on how the occurrences were batched.

use std::collections::VecDeque;

use crate::batch::{self, Normalized};
use crate::entry::Entry;
use crate::error::{MedianStoreError, Result};

/// Occurrences moved across the boundary by one rebalance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rebalance {
    None,
    /// Taken from the tail of `low`, placed at the head of `high`.
    LowToHigh(u64),
    /// Taken from the head of `high`, placed at the tail of `low`.
    HighToLow(u64),
}

/// What a single merge did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Occurrences placed into `low` during the scan.
    pub low_offset: u64,
    /// Occurrences placed into `high` during the scan and tail append.
    pub high_offset: u64,
    pub rebalance: Rebalance,
    /// `None` while the store is empty.
    pub median: Option<i64>,
}

impl MergeOutcome {
    pub fn accepted(&self) -> u64 {
        self.low_offset.saturating_add(self.high_offset)
    }
}

/// Point-in-time copy of both partitions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionSnapshot {
    pub low: Vec<Entry>,
    pub high: Vec<Entry>,
    /// Running total of merged occurrences.
    pub total: u64,
}

impl PartitionSnapshot {
    pub fn low_occurrences(&self) -> u64 {
        batch::occurrences(&self.low)
    }

    pub fn high_occurrences(&self) -> u64 {
        batch::occurrences(&self.high)
    }

    /// Verify ordering, balance and total accounting.
    pub fn check_invariants(&self) -> Result<()> {
        for (name, part) in [("low", &self.low), ("high", &self.high)] {
            if part.windows(2).any(|w| w[0].value() >= w[1].value()) {
                return Err(MedianStoreError::Internal(format!(
                    "{name} partition not strictly increasing"
                )));
            }
            if part.iter().any(|e| e.count() == 0) {
                return Err(MedianStoreError::Internal(format!(
                    "{name} partition holds a zero-count entry"
                )));
            }
        }

        if let (Some(tail), Some(head)) = (self.low.last(), self.high.first()) {
            if tail.value() > head.value() {
                return Err(MedianStoreError::Internal(format!(
                    "boundary out of order: low tail {} > high head {}",
                    tail.value(),
                    head.value()
                )));
            }
        }

        let low = self.low_occurrences();
        let high = self.high_occurrences();
        if low.abs_diff(high) > 1 {
            return Err(MedianStoreError::Internal(format!(
                "unbalanced: low={low} high={high}"
            )));
        }
        if low.saturating_add(high) != self.total {
            return Err(MedianStoreError::Internal(format!(
                "total mismatch: low={low} high={high} total={}",
                self.total
            )));
        }
        Ok(())
    }
}

/// The two partitions plus their occurrence totals.
///
/// Not synchronized; the engine's owner task is the only writer.
///
/// A merge that fails part way leaves the partitions half-mutated. The store
/// is then poisoned: every later merge fails without touching it, while
/// `median` and `snapshot` keep reporting the last state.
#[derive(Debug, Default)]
pub struct DualPartition {
    low: VecDeque<Entry>,
    high: VecDeque<Entry>,
    low_total: u64,
    high_total: u64,
    poisoned: bool,
}

impl DualPartition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            low: VecDeque::with_capacity(capacity),
            high: VecDeque::with_capacity(capacity),
            low_total: 0,
            high_total: 0,
            poisoned: false,
        }
    }

    /// Running total of merged occurrences.
    pub fn total(&self) -> u64 {
        self.low_total.saturating_add(self.high_total)
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    pub fn low_entries(&self) -> usize {
        self.low.len()
    }

    pub fn high_entries(&self) -> usize {
        self.high.len()
    }

    /// Merge one batch and restore the balance.
    ///
    /// Raw `Vec<Entry>` batches are normalized first: duplicate values are
    /// summed and zero counts dropped.
    pub fn merge(&mut self, entries: impl Into<Normalized>) -> Result<MergeOutcome> {
        if self.poisoned {
            return Err(MedianStoreError::Internal(
                "store poisoned by an earlier failed merge".into(),
            ));
        }
        let entries: Normalized = entries.into();
        let outcome = self.merge_sorted(entries.as_slice());
        if outcome.is_err() {
            self.poisoned = true;
        }
        outcome
    }

    fn merge_sorted(&mut self, entries: &[Entry]) -> Result<MergeOutcome> {
        let (low_offset, placed) = merge_into(&mut self.low, entries)?;
        let rest = &entries[placed..];
        let (mut high_offset, placed) = merge_into(&mut self.high, rest)?;

        // everything left is above max(high)
        for e in &rest[placed..] {
            high_offset = high_offset.saturating_add(e.count());
            self.high.push_back(*e);
        }

        self.low_total = self.low_total.saturating_add(low_offset);
        self.high_total = self.high_total.saturating_add(high_offset);

        let rebalance = self.rebalance()?;

        Ok(MergeOutcome {
            low_offset,
            high_offset,
            rebalance,
            median: self.median(),
        })
    }

    /// Median of everything merged so far, `None` when empty.
    ///
    /// Even totals average the two middle values with truncating division.
    pub fn median(&self) -> Option<i64> {
        let tail = self.low.back()?.value();
        if self.total() % 2 == 1 {
            return Some(tail);
        }
        let head = self.high.front().map_or(tail, Entry::value);
        // i128 keeps the sum from overflowing; the mean always fits back in i64
        Some(((i128::from(tail) + i128::from(head)) / 2) as i64)
    }

    pub fn snapshot(&self) -> PartitionSnapshot {
        PartitionSnapshot {
            low: self.low.iter().copied().collect(),
            high: self.high.iter().copied().collect(),
            total: self.total(),
        }
    }

    fn rebalance(&mut self) -> Result<Rebalance> {
        let total = self.total();
        let target_low = total - total / 2;

        if self.low_total > target_low {
            let k = self.low_total - target_low;
            self.shift_low_to_high(k)?;
            Ok(Rebalance::LowToHigh(k))
        } else if self.low_total < target_low {
            let k = target_low - self.low_total;
            self.shift_high_to_low(k)?;
            Ok(Rebalance::HighToLow(k))
        } else {
            Ok(Rebalance::None)
        }
    }

    fn shift_low_to_high(&mut self, mut k: u64) -> Result<()> {
        while k > 0 {
            let (value, held) = self
                .low
                .back()
                .map(|e| (e.value(), e.count()))
                .ok_or_else(|| {
                    MedianStoreError::Internal("low exhausted during rebalance".into())
                })?;

            let take = k.min(held);
            if take == held {
                self.low.pop_back();
            } else if let Some(tail) = self.low.back_mut() {
                tail.decrement_by(take)?;
            }

            match self.high.front_mut() {
                Some(head) if head.value() == value => head.increment_by(take),
                _ => self.high.push_front(Entry::with_count(value, take)),
            }

            self.low_total = self.low_total.saturating_sub(take);
            self.high_total = self.high_total.saturating_add(take);
            k -= take;
        }
        Ok(())
    }

    fn shift_high_to_low(&mut self, mut k: u64) -> Result<()> {
        while k > 0 {
            let (value, held) = self
                .high
                .front()
                .map(|e| (e.value(), e.count()))
                .ok_or_else(|| {
                    MedianStoreError::Internal("high exhausted during rebalance".into())
                })?;

            let take = k.min(held);
            if take == held {
                self.high.pop_front();
            } else if let Some(head) = self.high.front_mut() {
                head.decrement_by(take)?;
            }

            match self.low.back_mut() {
                Some(tail) if tail.value() == value => tail.increment_by(take),
                _ => self.low.push_back(Entry::with_count(value, take)),
            }

            self.high_total = self.high_total.saturating_sub(take);
            self.low_total = self.low_total.saturating_add(take);
            k -= take;
        }
        Ok(())
    }
}

/// Place the prefix of a sorted, duplicate-free batch that falls at or below
/// the partition's largest value.
///
/// Returns the occurrences placed (the partition's offset) and how many batch
/// entries were consumed. An empty partition consumes nothing.
fn merge_into(part: &mut VecDeque<Entry>, entries: &[Entry]) -> Result<(u64, usize)> {
    let Some(max) = part.back().map(Entry::value) else {
        return Ok((0, 0));
    };

    let mut offset = 0u64;
    for (i, e) in entries.iter().enumerate() {
        if e.value() > max {
            return Ok((offset, i));
        }
        match part.binary_search_by_key(&e.value(), Entry::value) {
            Ok(idx) => part
                .get_mut(idx)
                .ok_or_else(|| MedianStoreError::Internal("search index out of range".into()))?
                .increment_by(e.count()),
            Err(idx) => part.insert(idx, *e),
        }
        offset = offset.saturating_add(e.count());
    }
    Ok((offset, entries.len()))
}
