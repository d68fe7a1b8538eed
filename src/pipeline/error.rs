//! Error kinds surfaced by the intelligence pipeline

use std::fmt;

/// Failure of a collector fetch or a façade operation
///
/// `Clone` so a single coalesced computation can hand its outcome to every waiter.
#[derive(Debug, Clone, PartialEq)]
pub enum IntelligenceError {
    /// Collector exhausted its retries; the façade degrades instead of failing
    DataUnavailable(String),
    /// Malformed token mint, rejected before any computation
    InvalidToken(String),
    /// Negative or non-finite amounts, impacts or curve fields
    InvalidInput(String),
    Storage(String),
    Internal(String),
}

impl IntelligenceError {
    pub fn is_data_unavailable(&self) -> bool {
        matches!(self, IntelligenceError::DataUnavailable(_))
    }
}

impl fmt::Display for IntelligenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntelligenceError::DataUnavailable(msg) => write!(f, "Data unavailable: {}", msg),
            IntelligenceError::InvalidToken(token) => write!(f, "Invalid token mint: {}", token),
            IntelligenceError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            IntelligenceError::Storage(msg) => write!(f, "Storage error: {}", msg),
            IntelligenceError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for IntelligenceError {}

impl From<rusqlite::Error> for IntelligenceError {
    fn from(e: rusqlite::Error) -> Self {
        IntelligenceError::Storage(e.to_string())
    }
}

impl From<std::io::Error> for IntelligenceError {
    fn from(e: std::io::Error) -> Self {
        IntelligenceError::DataUnavailable(e.to_string())
    }
}
