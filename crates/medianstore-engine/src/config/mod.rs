//! Store config loader (strict parsing).

pub mod schema;

use std::fs;

use medianstore_core::error::{MedianStoreError, Result};

pub use schema::{AggregatorSection, EngineSection, MedianStoreConfig};

pub fn load_from_file(path: &str) -> Result<MedianStoreConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| MedianStoreError::Internal(format!("read config failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<MedianStoreConfig> {
    let cfg: MedianStoreConfig = serde_yaml::from_str(s)
        .map_err(|e| MedianStoreError::InvalidConfig(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
