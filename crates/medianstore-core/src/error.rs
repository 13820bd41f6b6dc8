//! Shared error type across medianstore crates.

use thiserror::Error;

/// Stable error codes (safe to match on in callers and tests).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Configuration failed to parse or validate.
    InvalidConfig,
    /// Unsupported configuration version.
    UnsupportedVersion,
    /// The owner task is gone.
    Closed,
    /// A run-length count would go below zero.
    CountUnderflow,
    /// Internal invariant failure.
    Internal,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidConfig => "INVALID_CONFIG",
            ErrorCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ErrorCode::Closed => "CLOSED",
            ErrorCode::CountUnderflow => "COUNT_UNDERFLOW",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, MedianStoreError>;

/// Unified error type used by core and engine.
#[derive(Debug, Error)]
pub enum MedianStoreError {
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("unsupported config version")]
    UnsupportedVersion,
    #[error("owner task closed")]
    Closed,
    #[error("count underflow: value {value} holds {count}, asked to remove {by}")]
    CountUnderflow { value: i64, count: u64, by: u64 },
    #[error("internal: {0}")]
    Internal(String),
}

impl MedianStoreError {
    /// Map the error to its stable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            MedianStoreError::InvalidConfig(_) => ErrorCode::InvalidConfig,
            MedianStoreError::UnsupportedVersion => ErrorCode::UnsupportedVersion,
            MedianStoreError::Closed => ErrorCode::Closed,
            MedianStoreError::CountUnderflow { .. } => ErrorCode::CountUnderflow,
            MedianStoreError::Internal(_) => ErrorCode::Internal,
        }
    }
}
