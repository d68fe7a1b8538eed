//! Risk aggregation - one weighted score, its level, and the privacy tier it maps to
//!
//! ```text
//! risk_score = 0.35 * sniper_score
//!            + 0.25 * volatility
//!            + 0.20 * min(1, trade_velocity * 1.2)
//!            + 0.20 * (1 - liquidity_depth)
//! ```
//!
//! Weights are fixed. Only the level boundaries are configurable, and the
//! level -> privacy mapping is a fixed monotonic table.

use super::cluster::ClusterDetection;
use super::normalizer::CurveMetrics;
use super::patterns::{BotActivity, WhaleActivity};
use super::sniper::SniperDetection;
use super::stats;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const SNIPER_WEIGHT: f64 = 0.35;
pub const VOLATILITY_WEIGHT: f64 = 0.25;
pub const VELOCITY_WEIGHT: f64 = 0.20;
pub const LIQUIDITY_WEIGHT: f64 = 0.20;
const VELOCITY_SCALE: f64 = 1.2;

mod flag_thresholds {
    pub const HIGH_SLOPE: f64 = 0.7;
    pub const LOW_LIQUIDITY: f64 = 0.2;
    pub const HIGH_VOLATILITY: f64 = 0.7;
    pub const HIGH_VELOCITY: f64 = 0.8;
    pub const THIN_LIQUIDITY_RATIO: f64 = 0.1;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }

    pub fn privacy_mode(&self) -> PrivacyMode {
        match self {
            RiskLevel::Low => PrivacyMode::Normal,
            RiskLevel::Medium => PrivacyMode::Stealth,
            RiskLevel::High => PrivacyMode::MaxGhost,
            RiskLevel::Critical => PrivacyMode::Confidential,
        }
    }
}

/// Execution-strategy tier, ordered from least to most protective
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrivacyMode {
    Normal,
    Stealth,
    MaxGhost,
    Confidential,
}

impl PrivacyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrivacyMode::Normal => "normal",
            PrivacyMode::Stealth => "stealth",
            PrivacyMode::MaxGhost => "max_ghost",
            PrivacyMode::Confidential => "confidential",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskFlag {
    HighSlope,
    LowLiquidity,
    ThinLiquidityRatio,
    HighVolatility,
    HighVelocity,
    SniperActive,
    CoordinatedClusters,
    WhaleActivity,
    BotActivity,
    LowConfidenceData,
}

impl RiskFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskFlag::HighSlope => "HIGH_SLOPE",
            RiskFlag::LowLiquidity => "LOW_LIQUIDITY",
            RiskFlag::ThinLiquidityRatio => "THIN_LIQUIDITY_RATIO",
            RiskFlag::HighVolatility => "HIGH_VOLATILITY",
            RiskFlag::HighVelocity => "HIGH_VELOCITY",
            RiskFlag::SniperActive => "SNIPER_ACTIVE",
            RiskFlag::CoordinatedClusters => "COORDINATED_CLUSTERS",
            RiskFlag::WhaleActivity => "WHALE_ACTIVITY",
            RiskFlag::BotActivity => "BOT_ACTIVITY",
            RiskFlag::LowConfidenceData => "LOW_CONFIDENCE_DATA",
        }
    }
}

/// Lower bounds of the medium, high and critical bands
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskThresholds {
    pub medium: f64,
    pub high: f64,
    pub critical: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            medium: 0.35,
            high: 0.7,
            critical: 0.9,
        }
    }
}

impl RiskThresholds {
    pub fn is_ordered(&self) -> bool {
        0.0 < self.medium
            && self.medium < self.high
            && self.high < self.critical
            && self.critical <= 1.0
    }

    /// Half-open bands: [0, medium) low, [medium, high) medium, [high, critical) high, [critical, 1] critical
    pub fn level(&self, risk_score: f64) -> RiskLevel {
        if risk_score >= self.critical {
            RiskLevel::Critical
        } else if risk_score >= self.high {
            RiskLevel::High
        } else if risk_score >= self.medium {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

/// Detector outputs the aggregator joins on
#[derive(Debug, Clone, Copy)]
pub struct DetectorOutputs<'a> {
    pub sniper: &'a SniperDetection,
    pub clusters: &'a ClusterDetection,
    pub whales: &'a WhaleActivity,
    pub bots: &'a BotActivity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub flags: BTreeSet<RiskFlag>,
    pub privacy_recommendation: PrivacyMode,
}

pub struct RiskAggregator {
    thresholds: RiskThresholds,
}

impl RiskAggregator {
    pub fn new(thresholds: RiskThresholds) -> Self {
        Self { thresholds }
    }

    pub fn with_defaults() -> Self {
        Self::new(RiskThresholds::default())
    }

    pub fn thresholds(&self) -> &RiskThresholds {
        &self.thresholds
    }

    pub fn assess(&self, metrics: &CurveMetrics, detections: DetectorOutputs<'_>) -> RiskAssessment {
        use flag_thresholds::*;

        let risk_score = risk_score(
            detections.sniper.score,
            metrics.volatility,
            metrics.trade_velocity,
            metrics.liquidity_depth,
        );
        let risk_level = self.thresholds.level(risk_score);

        let mut flags = BTreeSet::new();
        if metrics.slope > HIGH_SLOPE {
            flags.insert(RiskFlag::HighSlope);
        }
        if metrics.liquidity_depth < LOW_LIQUIDITY {
            flags.insert(RiskFlag::LowLiquidity);
        }
        if metrics.market_cap > 0.0
            && metrics.liquidity_pool / metrics.market_cap < THIN_LIQUIDITY_RATIO
        {
            flags.insert(RiskFlag::ThinLiquidityRatio);
        }
        if metrics.volatility > HIGH_VOLATILITY {
            flags.insert(RiskFlag::HighVolatility);
        }
        if metrics.trade_velocity > HIGH_VELOCITY {
            flags.insert(RiskFlag::HighVelocity);
        }
        if detections.sniper.is_active {
            flags.insert(RiskFlag::SniperActive);
        }
        if detections.clusters.is_detected {
            flags.insert(RiskFlag::CoordinatedClusters);
        }
        if detections.whales.is_active {
            flags.insert(RiskFlag::WhaleActivity);
        }
        if detections.bots.is_detected {
            flags.insert(RiskFlag::BotActivity);
        }

        RiskAssessment {
            risk_score,
            risk_level,
            flags,
            privacy_recommendation: risk_level.privacy_mode(),
        }
    }
}

/// Fixed-weight combination of the four risk inputs, clamped to [0, 1]
pub fn risk_score(sniper_score: f64, volatility: f64, trade_velocity: f64, liquidity_depth: f64) -> f64 {
    let sniper = stats::clamp_unit(sniper_score);
    let volatility = stats::clamp_unit(volatility);
    let velocity = stats::clamp_unit(trade_velocity * VELOCITY_SCALE);
    let liquidity_risk = 1.0 - stats::clamp_unit(liquidity_depth);

    stats::clamp_unit(
        SNIPER_WEIGHT * sniper
            + VOLATILITY_WEIGHT * volatility
            + VELOCITY_WEIGHT * velocity
            + LIQUIDITY_WEIGHT * liquidity_risk,
    )
}
