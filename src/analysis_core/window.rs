//! Window Optimizer - picks the forward time slice with the lowest expected adverse cost
//!
//! Each candidate offset is scored by projecting liquidity_depth and volatility linearly
//! from the two most recent metric samples (clamped to [0, 1]):
//!
//! ```text
//! cost = price_impact(amount, depth_proj) + risk_score_proj * penalty_weight
//! ```
//!
//! Lowest cost wins, earliest slice on ties. Confidence is the relative gap between the
//! best and second-best cost. With fewer than two samples there is no trend, so the
//! optimizer returns the "now" slice with zero confidence.

use super::normalizer::{CurveMetrics, MetricNormalizer};
use super::scorer::{self, RiskLevel, RiskThresholds};
use super::stats;
use super::types::TradeSide;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Seconds from now; must include 0
    pub candidate_offsets: Vec<u64>,
    pub penalty_weight: f64,
    /// Trade size used for the window attached to a plain analysis
    pub reference_trade_size: f64,
    /// Samples retained per token for trend extrapolation
    pub sample_history: usize,
    pub min_slice_seconds: u64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            candidate_offsets: vec![0, 30, 60, 120],
            penalty_weight: 1.0,
            reference_trade_size: 1.0,
            sample_history: 16,
            min_slice_seconds: 30,
        }
    }
}

/// Normalized indicators observed at one analysis
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub timestamp: i64,
    pub liquidity_depth: f64,
    pub volatility: f64,
    pub trade_velocity: f64,
    pub sniper_score: f64,
}

impl MetricSample {
    pub fn from_metrics(timestamp: i64, metrics: &CurveMetrics, sniper_score: f64) -> Self {
        Self {
            timestamp,
            liquidity_depth: metrics.liquidity_depth,
            volatility: metrics.volatility,
            trade_velocity: metrics.trade_velocity,
            sniper_score,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CandidateEvaluation {
    pub offset_seconds: u64,
    pub start_time: i64,
    pub end_time: i64,
    pub projected_liquidity_depth: f64,
    pub projected_volatility: f64,
    pub projected_risk_score: f64,
    pub price_impact: f64,
    pub cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionWindow {
    pub intent: TradeSide,
    pub amount: f64,
    pub offset_seconds: u64,
    pub start_time: i64,
    pub end_time: i64,
    pub projected_liquidity_depth: f64,
    pub projected_volatility: f64,
    pub projected_risk_score: f64,
    pub risk_level: RiskLevel,
    pub price_impact: f64,
    pub cost: f64,
    /// 0.0 means the choice is no better than a coin flip (or there was no trend)
    pub confidence: f64,
    pub trend_available: bool,
    pub candidates: Vec<CandidateEvaluation>,
}

/// Per-second slopes from the last two samples
#[derive(Debug, Clone, Copy)]
struct Trend {
    latest: MetricSample,
    depth_per_sec: f64,
    volatility_per_sec: f64,
}

impl Trend {
    fn from_samples(samples: &[MetricSample]) -> Option<Self> {
        let [previous, latest] = match samples {
            [.., a, b] => [*a, *b],
            _ => return None,
        };
        let dt = latest.timestamp.saturating_sub(previous.timestamp) as f64;
        let slope = |a: f64, b: f64| if dt > 0.0 { stats::finite_or_zero((b - a) / dt) } else { 0.0 };

        Some(Self {
            latest,
            depth_per_sec: slope(previous.liquidity_depth, latest.liquidity_depth),
            volatility_per_sec: slope(previous.volatility, latest.volatility),
        })
    }

    fn project(&self, at: i64) -> (f64, f64) {
        let horizon = at.saturating_sub(self.latest.timestamp).max(0) as f64;
        (
            stats::clamp_unit(self.latest.liquidity_depth + self.depth_per_sec * horizon),
            stats::clamp_unit(self.latest.volatility + self.volatility_per_sec * horizon),
        )
    }
}

pub struct WindowOptimizer {
    config: OptimizerConfig,
    thresholds: RiskThresholds,
}

impl WindowOptimizer {
    pub fn new(config: OptimizerConfig, thresholds: RiskThresholds) -> Self {
        Self { config, thresholds }
    }

    pub fn with_defaults() -> Self {
        Self::new(OptimizerConfig::default(), RiskThresholds::default())
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Choose an execution slice for `amount` given samples in timestamp order
    pub fn optimize(
        &self,
        normalizer: &MetricNormalizer,
        samples: &[MetricSample],
        now: i64,
        intent: TradeSide,
        amount: f64,
    ) -> ExecutionWindow {
        let slices = self.slices(now);

        let Some(trend) = Trend::from_samples(samples) else {
            let (offset, start, end) = slices[0];
            let (depth, volatility, velocity, sniper) = samples
                .last()
                .map(|s| (s.liquidity_depth, s.volatility, s.trade_velocity, s.sniper_score))
                .unwrap_or((0.0, 0.0, 0.0, 0.0));
            let candidate =
                self.evaluate(normalizer, offset, start, end, depth, volatility, velocity, sniper, amount);
            return self.window(intent, amount, candidate, 0.0, false, vec![candidate]);
        };

        let latest = trend.latest;
        let candidates: Vec<CandidateEvaluation> = slices
            .iter()
            .map(|&(offset, start, end)| {
                let (depth, volatility) = trend.project(start);
                self.evaluate(
                    normalizer,
                    offset,
                    start,
                    end,
                    depth,
                    volatility,
                    latest.trade_velocity,
                    latest.sniper_score,
                    amount,
                )
            })
            .collect();

        let mut best = candidates[0];
        for candidate in &candidates[1..] {
            if candidate.cost < best.cost {
                best = *candidate;
            }
        }

        let second = candidates
            .iter()
            .filter(|c| c.offset_seconds != best.offset_seconds)
            .map(|c| c.cost)
            .fold(f64::INFINITY, f64::min);
        let confidence = if second.is_finite() && second > 0.0 {
            stats::clamp_unit((second - best.cost) / second)
        } else {
            0.0
        };

        self.window(intent, amount, best, confidence, true, candidates)
    }

    /// (offset, start, end) per candidate, soonest first
    fn slices(&self, now: i64) -> Vec<(u64, i64, i64)> {
        let mut offsets = self.config.candidate_offsets.clone();
        offsets.sort_unstable();
        offsets.dedup();
        if offsets.is_empty() {
            offsets.push(0);
        }

        let min_slice = self.config.min_slice_seconds.max(1);
        let mut slices = Vec::with_capacity(offsets.len());
        let mut previous_gap = min_slice;
        for (i, &offset) in offsets.iter().enumerate() {
            let gap = match offsets.get(i + 1) {
                Some(next) => next - offset,
                None => previous_gap,
            };
            previous_gap = gap;
            let start = now.saturating_add_unsigned(offset);
            slices.push((offset, start, start.saturating_add_unsigned(gap.max(min_slice))));
        }
        slices
    }

    #[allow(clippy::too_many_arguments)]
    fn evaluate(
        &self,
        normalizer: &MetricNormalizer,
        offset_seconds: u64,
        start_time: i64,
        end_time: i64,
        depth: f64,
        volatility: f64,
        velocity: f64,
        sniper_score: f64,
        amount: f64,
    ) -> CandidateEvaluation {
        let projected_risk_score = scorer::risk_score(sniper_score, volatility, velocity, depth);
        let price_impact = normalizer.price_impact(amount, depth);
        CandidateEvaluation {
            offset_seconds,
            start_time,
            end_time,
            projected_liquidity_depth: depth,
            projected_volatility: volatility,
            projected_risk_score,
            price_impact,
            cost: price_impact + projected_risk_score * self.config.penalty_weight,
        }
    }

    fn window(
        &self,
        intent: TradeSide,
        amount: f64,
        chosen: CandidateEvaluation,
        confidence: f64,
        trend_available: bool,
        candidates: Vec<CandidateEvaluation>,
    ) -> ExecutionWindow {
        ExecutionWindow {
            intent,
            amount,
            offset_seconds: chosen.offset_seconds,
            start_time: chosen.start_time,
            end_time: chosen.end_time,
            projected_liquidity_depth: chosen.projected_liquidity_depth,
            projected_volatility: chosen.projected_volatility,
            projected_risk_score: chosen.projected_risk_score,
            risk_level: self.thresholds.level(chosen.projected_risk_score),
            price_impact: chosen.price_impact,
            cost: chosen.cost,
            confidence,
            trend_available,
            candidates,
        }
    }
}
