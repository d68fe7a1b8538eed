//! Trade-impact query for a prospective trade against the standing metrics

use super::normalizer::{CurveMetrics, MetricNormalizer};
use super::stats;
use super::types::TradeSide;
use serde::{Deserialize, Serialize};

const SLIPPAGE_RATIO: f64 = 0.1;
const MAX_SLIPPAGE: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeImpact {
    pub amount: f64,
    pub side: TradeSide,
    /// Normalized to [0, 1]
    pub price_impact: f64,
    pub estimated_slippage: f64,
    /// Pool balance after the trade settles
    pub liquidity_after: f64,
    pub liquidity_depth: f64,
}

/// Impact is symmetric in side; only the post-trade pool balance differs.
pub fn assess_trade_impact(
    normalizer: &MetricNormalizer,
    metrics: &CurveMetrics,
    amount: f64,
    side: TradeSide,
) -> TradeImpact {
    let price_impact = normalizer.price_impact(amount, metrics.liquidity_depth);
    let amount = amount.max(0.0);

    let liquidity_after = match side {
        TradeSide::Buy => (metrics.liquidity_pool - amount).max(0.0),
        TradeSide::Sell => stats::saturate(metrics.liquidity_pool + amount),
    };

    TradeImpact {
        amount,
        side,
        price_impact,
        estimated_slippage: (price_impact * SLIPPAGE_RATIO).min(MAX_SLIPPAGE),
        liquidity_after,
        liquidity_depth: metrics.liquidity_depth,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis_core::normalizer::NormalizationRanges;

    fn metrics(depth: f64, pool: f64) -> CurveMetrics {
        CurveMetrics {
            liquidity_depth: depth,
            liquidity_pool: pool,
            ..CurveMetrics::default()
        }
    }

    #[test]
    fn test_buy_drains_pool() {
        let normalizer = MetricNormalizer::new(NormalizationRanges::default(), 300);
        let impact = assess_trade_impact(&normalizer, &metrics(0.5, 10.0), 1.0, TradeSide::Buy);

        // 1.0 / 0.5 * 0.01 = 0.02 raw, scaled against 0.1
        assert!((impact.price_impact - 0.2).abs() < 1e-12);
        assert!((impact.estimated_slippage - 0.02).abs() < 1e-12);
        assert_eq!(impact.liquidity_after, 9.0);
    }

    #[test]
    fn test_sell_adds_to_pool_same_impact() {
        let normalizer = MetricNormalizer::new(NormalizationRanges::default(), 300);
        let m = metrics(0.5, 10.0);
        let buy = assess_trade_impact(&normalizer, &m, 1.0, TradeSide::Buy);
        let sell = assess_trade_impact(&normalizer, &m, 1.0, TradeSide::Sell);

        assert_eq!(buy.price_impact, sell.price_impact);
        assert_eq!(sell.liquidity_after, 11.0);
    }

    #[test]
    fn test_oversized_buy_floors_pool_and_caps_slippage() {
        let normalizer = MetricNormalizer::new(NormalizationRanges::default(), 300);
        let impact = assess_trade_impact(&normalizer, &metrics(0.0, 2.0), 50.0, TradeSide::Buy);

        assert_eq!(impact.price_impact, 1.0);
        assert_eq!(impact.estimated_slippage, 0.1);
        assert_eq!(impact.liquidity_after, 0.0);
    }

    #[test]
    fn test_zero_amount_has_no_impact() {
        let normalizer = MetricNormalizer::new(NormalizationRanges::default(), 300);
        let impact = assess_trade_impact(&normalizer, &metrics(0.0, 2.0), 0.0, TradeSide::Sell);

        assert_eq!(impact.price_impact, 0.0);
        assert_eq!(impact.estimated_slippage, 0.0);
        assert_eq!(impact.liquidity_after, 2.0);
    }
}
