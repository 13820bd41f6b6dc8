use std::time::Duration;

use serde::Deserialize;
use medianstore_core::error::{MedianStoreError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MedianStoreConfig {
    pub version: u32,

    #[serde(default)]
    pub engine: EngineSection,

    #[serde(default)]
    pub aggregator: AggregatorSection,
}

impl Default for MedianStoreConfig {
    fn default() -> Self {
        Self {
            version: 1,
            engine: EngineSection::default(),
            aggregator: AggregatorSection::default(),
        }
    }
}

impl MedianStoreConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(MedianStoreError::UnsupportedVersion);
        }
        self.engine.validate()?;
        self.aggregator.validate()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineSection {
    /// Entries pre-allocated per partition.
    #[serde(default = "default_initial_capacity")]
    pub initial_capacity: usize,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            initial_capacity: default_initial_capacity(),
        }
    }
}

impl EngineSection {
    pub fn validate(&self) -> Result<()> {
        if self.initial_capacity > 1_000_000 {
            return Err(MedianStoreError::InvalidConfig(
                "engine.initial_capacity must be at most 1000000".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AggregatorSection {
    /// Buffered occurrences that force a flush.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: u64,

    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
}

impl Default for AggregatorSection {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
            flush_interval_ms: default_flush_interval_ms(),
        }
    }
}

impl AggregatorSection {
    pub fn validate(&self) -> Result<()> {
        if !(1..=10_000_000).contains(&self.buffer_size) {
            return Err(MedianStoreError::InvalidConfig(
                "aggregator.buffer_size must be between 1 and 10000000".into(),
            ));
        }
        if !(1..=3_600_000).contains(&self.flush_interval_ms) {
            return Err(MedianStoreError::InvalidConfig(
                "aggregator.flush_interval_ms must be between 1 and 3600000".into(),
            ));
        }
        Ok(())
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }
}

fn default_initial_capacity() -> usize {
    1000
}
fn default_buffer_size() -> u64 {
    10_000
}
fn default_flush_interval_ms() -> u64 {
    1000
}
