//! Analysis Core - bonding-curve metrics, detectors and risk scoring
//!
//! Pure, synchronous computation. Nothing here performs I/O or keeps state between
//! calls; identical inputs give bit-identical outputs.
//!
//! # Architecture
//!
//! ```text
//! WindowData (Transactions + CurveState)
//!     ↓
//! MetricNormalizer (slope, liquidity_depth, trade_velocity, volatility → [0, 1])
//!     ↓
//! SniperDetector │ ClusterDetector │ PatternRecognizer (whales, bots)
//!     ↓
//! RiskAggregator (risk_score, level, flags, privacy mode)
//!     ↓
//! WindowOptimizer (forward slice minimizing impact + risk)
//! ```

pub mod cluster;
pub mod impact;
pub mod normalizer;
pub mod patterns;
pub mod scorer;
pub mod sniper;
pub mod stats;
pub mod types;
pub mod window;

pub use cluster::{Cluster, ClusterConfig, ClusterDetection, ClusterDetector};
pub use impact::{assess_trade_impact, TradeImpact};
pub use normalizer::{CurveMetrics, MetricNormalizer, NormalizationRanges, RawCurveMetrics};
pub use patterns::{
    BotActivity, DetectedPattern, PatternConfig, PatternKind, PatternRecognizer, WhaleActivity,
};
pub use scorer::{
    risk_score, DetectorOutputs, PrivacyMode, RiskAggregator, RiskAssessment, RiskFlag, RiskLevel,
    RiskThresholds,
};
pub use sniper::{SniperConfig, SniperDetection, SniperDetector, WalletHistory};
pub use stats::MetricRange;
pub use types::{CurveState, TradeSide, Transaction, WindowData};
pub use window::{CandidateEvaluation, ExecutionWindow, MetricSample, OptimizerConfig, WindowOptimizer};
