//! Batch normalization before merge.
//!
//! A batch handed to the store may be unordered and may repeat a value. The
//! merge walks the partitions in value order, so it needs a sorted,
//! duplicate-free view: sort by value, then fold adjacent equal values by
//! summing their counts. Zero-count entries carry nothing and are dropped.

use crate::entry::Entry;

/// Sort, coalesce equal values, drop empty runs.
pub fn normalize(mut batch: Vec<Entry>) -> Vec<Entry> {
    batch.sort_unstable_by_key(Entry::value);

    let mut out: Vec<Entry> = Vec::with_capacity(batch.len());
    for e in batch {
        if e.count() == 0 {
            continue;
        }
        match out.last_mut() {
            Some(last) if last.value() == e.value() => last.increment_by(e.count()),
            _ => out.push(e),
        }
    }
    out
}

/// A batch that has already been through [`normalize`].
///
/// Built by `From<Vec<Entry>>`, so anything accepting `impl Into<Normalized>`
/// takes raw batches as well as pre-normalized ones without sorting twice.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Normalized(Vec<Entry>);

impl Normalized {
    pub fn as_slice(&self) -> &[Entry] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn occurrences(&self) -> u64 {
        occurrences(&self.0)
    }

    pub fn into_inner(self) -> Vec<Entry> {
        self.0
    }
}

impl From<Vec<Entry>> for Normalized {
    fn from(batch: Vec<Entry>) -> Self {
        Normalized(normalize(batch))
    }
}

/// Total occurrences carried by a batch.
pub fn occurrences(batch: &[Entry]) -> u64 {
    batch
        .iter()
        .fold(0u64, |acc, e| acc.saturating_add(e.count()))
}
