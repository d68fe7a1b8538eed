//! Intelligence configuration from environment variables
//!
//! One explicit object passed into every component. Weights are constants in the
//! scorer; only thresholds, windows and ranges are configurable here.

use crate::analysis_core::{
    ClusterConfig, NormalizationRanges, OptimizerConfig, PatternConfig, RiskThresholds, SniperConfig,
};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Candidate offsets may look at most this many analysis windows ahead
const MAX_OFFSET_WINDOWS: u64 = 10;

#[derive(Debug)]
pub enum ConfigError {
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone, PartialEq)]
pub struct IntelligenceConfig {
    /// Analysis window requested from the collector
    pub window_seconds: u64,

    pub min_trade_count: usize,
    pub max_trade_size: f64,
    pub first_seen_threshold: f64,

    pub cluster_window_seconds: u64,
    pub min_cluster_size: usize,
    pub size_correlation_threshold: f64,

    pub whale_threshold: f64,

    pub medium_risk_threshold: f64,
    pub high_risk_threshold: f64,
    pub critical_risk_threshold: f64,

    pub cache_ttl_seconds: u64,

    /// Collector attempts before DataUnavailable
    pub collector_max_attempts: u32,
    pub retry_initial_delay_ms: u64,
    pub retry_max_delay_ms: u64,

    /// Optional SQLite path for persistent first-seen tracking
    pub wallet_history_db: Option<String>,

    /// Tokens whose metric samples are kept for trend extrapolation
    pub max_tracked_tokens: usize,

    pub ranges: NormalizationRanges,
    pub optimizer: OptimizerConfig,
}

impl Default for IntelligenceConfig {
    fn default() -> Self {
        Self {
            window_seconds: 300,
            min_trade_count: 5,
            max_trade_size: 0.5,
            first_seen_threshold: 0.6,
            cluster_window_seconds: 60,
            min_cluster_size: 2,
            size_correlation_threshold: 0.3,
            whale_threshold: 5.0,
            medium_risk_threshold: 0.35,
            high_risk_threshold: 0.7,
            critical_risk_threshold: 0.9,
            cache_ttl_seconds: 30,
            collector_max_attempts: 3,
            retry_initial_delay_ms: 250,
            retry_max_delay_ms: 2_000,
            wallet_history_db: None,
            max_tracked_tokens: 1_024,
            ranges: NormalizationRanges::default(),
            optimizer: OptimizerConfig::default(),
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

impl IntelligenceConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables (defaults in parentheses):
    /// - `CURVE_WINDOW_SECONDS` (300)
    /// - `CURVE_MIN_TRADE_COUNT` (5), `CURVE_MAX_TRADE_SIZE` (0.5), `CURVE_FIRST_SEEN_THRESHOLD` (0.6)
    /// - `CURVE_CLUSTER_WINDOW_SECONDS` (60), `CURVE_MIN_CLUSTER_SIZE` (2),
    ///   `CURVE_SIZE_CORRELATION_THRESHOLD` (0.3)
    /// - `CURVE_WHALE_THRESHOLD` (5.0)
    /// - `CURVE_MEDIUM_RISK_THRESHOLD` (0.35), `CURVE_HIGH_RISK_THRESHOLD` (0.7),
    ///   `CURVE_CRITICAL_RISK_THRESHOLD` (0.9)
    /// - `CURVE_CACHE_TTL_SECONDS` (30)
    /// - `CURVE_COLLECTOR_MAX_ATTEMPTS` (3)
    /// - `CURVE_PENALTY_WEIGHT` (1.0), `CURVE_CANDIDATE_OFFSETS` (0,30,60,120)
    /// - `CURVE_WALLET_HISTORY_DB` (unset: in-memory history)
    /// - `CURVE_MAX_TRACKED_TOKENS` (1024)
    ///
    /// Unparseable values fall back to the default.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let candidate_offsets = env::var("CURVE_CANDIDATE_OFFSETS")
            .ok()
            .and_then(|s| {
                s.split(',')
                    .map(|part| part.trim().parse::<u64>().ok())
                    .collect::<Option<Vec<u64>>>()
            })
            .filter(|offsets| !offsets.is_empty())
            .unwrap_or_else(|| defaults.optimizer.candidate_offsets.clone());

        Self {
            window_seconds: env_or("CURVE_WINDOW_SECONDS", defaults.window_seconds),
            min_trade_count: env_or("CURVE_MIN_TRADE_COUNT", defaults.min_trade_count),
            max_trade_size: env_or("CURVE_MAX_TRADE_SIZE", defaults.max_trade_size),
            first_seen_threshold: env_or("CURVE_FIRST_SEEN_THRESHOLD", defaults.first_seen_threshold),
            cluster_window_seconds: env_or(
                "CURVE_CLUSTER_WINDOW_SECONDS",
                defaults.cluster_window_seconds,
            ),
            min_cluster_size: env_or("CURVE_MIN_CLUSTER_SIZE", defaults.min_cluster_size),
            size_correlation_threshold: env_or(
                "CURVE_SIZE_CORRELATION_THRESHOLD",
                defaults.size_correlation_threshold,
            ),
            whale_threshold: env_or("CURVE_WHALE_THRESHOLD", defaults.whale_threshold),
            medium_risk_threshold: env_or(
                "CURVE_MEDIUM_RISK_THRESHOLD",
                defaults.medium_risk_threshold,
            ),
            high_risk_threshold: env_or("CURVE_HIGH_RISK_THRESHOLD", defaults.high_risk_threshold),
            critical_risk_threshold: env_or(
                "CURVE_CRITICAL_RISK_THRESHOLD",
                defaults.critical_risk_threshold,
            ),
            cache_ttl_seconds: env_or("CURVE_CACHE_TTL_SECONDS", defaults.cache_ttl_seconds),
            collector_max_attempts: env_or(
                "CURVE_COLLECTOR_MAX_ATTEMPTS",
                defaults.collector_max_attempts,
            ),
            retry_initial_delay_ms: defaults.retry_initial_delay_ms,
            retry_max_delay_ms: defaults.retry_max_delay_ms,
            wallet_history_db: env::var("CURVE_WALLET_HISTORY_DB")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            max_tracked_tokens: env_or("CURVE_MAX_TRACKED_TOKENS", defaults.max_tracked_tokens),
            ranges: defaults.ranges,
            optimizer: OptimizerConfig {
                candidate_offsets,
                penalty_weight: env_or("CURVE_PENALTY_WEIGHT", defaults.optimizer.penalty_weight),
                ..defaults.optimizer
            },
        }
    }

    /// Reject configurations the components cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_seconds == 0 {
            return Err(ConfigError::InvalidValue("window_seconds must be > 0".to_string()));
        }
        if self.cluster_window_seconds == 0 {
            return Err(ConfigError::InvalidValue(
                "cluster_window_seconds must be > 0".to_string(),
            ));
        }
        if self.min_cluster_size < 1 {
            return Err(ConfigError::InvalidValue("min_cluster_size must be >= 1".to_string()));
        }
        if !self.risk_thresholds().is_ordered() {
            return Err(ConfigError::InvalidValue(format!(
                "risk thresholds must satisfy 0 < medium < high < critical <= 1 (got {} / {} / {})",
                self.medium_risk_threshold, self.high_risk_threshold, self.critical_risk_threshold
            )));
        }
        for (name, value) in [
            ("max_trade_size", self.max_trade_size),
            ("first_seen_threshold", self.first_seen_threshold),
            ("size_correlation_threshold", self.size_correlation_threshold),
            ("whale_threshold", self.whale_threshold),
            ("penalty_weight", self.optimizer.penalty_weight),
            ("reference_trade_size", self.optimizer.reference_trade_size),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidValue(format!(
                    "{} must be finite and >= 0 (got {})",
                    name, value
                )));
            }
        }
        if !self.optimizer.candidate_offsets.contains(&0) {
            return Err(ConfigError::InvalidValue(
                "candidate_offsets must include 0 (now)".to_string(),
            ));
        }
        let max_offset = self.window_seconds.saturating_mul(MAX_OFFSET_WINDOWS);
        if let Some(offset) = self
            .optimizer
            .candidate_offsets
            .iter()
            .find(|&&offset| offset > max_offset)
        {
            return Err(ConfigError::InvalidValue(format!(
                "candidate offset {}s exceeds {}s ({} analysis windows)",
                offset, max_offset, MAX_OFFSET_WINDOWS
            )));
        }
        if self.optimizer.sample_history < 2 {
            return Err(ConfigError::InvalidValue("sample_history must be >= 2".to_string()));
        }
        if self.max_tracked_tokens == 0 {
            return Err(ConfigError::InvalidValue("max_tracked_tokens must be >= 1".to_string()));
        }
        if self.collector_max_attempts == 0 {
            return Err(ConfigError::InvalidValue(
                "collector_max_attempts must be >= 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn sniper_config(&self) -> SniperConfig {
        SniperConfig {
            window_seconds: self.window_seconds,
            max_trade_size: self.max_trade_size,
            first_seen_threshold: self.first_seen_threshold,
            min_trade_count: self.min_trade_count,
        }
    }

    pub fn cluster_config(&self) -> ClusterConfig {
        ClusterConfig {
            cluster_window_seconds: self.cluster_window_seconds,
            min_cluster_size: self.min_cluster_size,
            size_correlation_threshold: self.size_correlation_threshold,
        }
    }

    pub fn pattern_config(&self) -> PatternConfig {
        PatternConfig {
            window_seconds: self.window_seconds,
            whale_threshold: self.whale_threshold,
        }
    }

    pub fn risk_thresholds(&self) -> RiskThresholds {
        RiskThresholds {
            medium: self.medium_risk_threshold,
            high: self.high_risk_threshold,
            critical: self.critical_risk_threshold,
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }
}
