//! Pipeline - data collection, caching and the intelligence façade
//!
//! Wraps the pure `analysis_core` with the pieces that touch the outside world:
//! collectors (with retry), wallet-history stores, the coalescing TTL cache, and the
//! `IntelligenceEngine` that ties them together per token.

pub mod cache;
pub mod collector;
pub mod config;
pub mod engine;
pub mod error;
pub mod history;

pub use cache::{AnalysisCache, CacheKey, CacheStats, Cacheable};
pub use collector::{DataCollector, ExponentialBackoff, JsonlSnapshotCollector, RetryingCollector};
pub use config::{ConfigError, IntelligenceConfig};
pub use engine::{validate_mint, AnalysisResult, IntelligenceEngine};
pub use error::IntelligenceError;
pub use history::{InMemoryWalletHistory, SqliteWalletHistory};
