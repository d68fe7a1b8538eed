//! Metric Normalizer - maps raw curve and trade statistics into bounded [0, 1] indicators
//!
//! Raw formulas:
//! - slope = Δprice / Δsupply between the window-start snapshot and the latest one
//! - liquidity_depth = liquidity_pool / price * depth_factor
//! - trade_velocity = transaction_count / window_seconds
//! - volatility = std_dev(price changes) / mean(price)
//! - price_impact = mean observed impact (standing) or trade_size / depth * impact_factor (query)
//!
//! Each raw value is rescaled against its configured historical range and clamped.
//! Degenerate denominators resolve to 0.0 and overflowing raw values saturate, so each
//! indicator stays monotonic in its raw value. Metrics are recomputed from scratch on every call.

use super::stats::{self, MetricRange};
use super::types::{CurveState, WindowData};
use serde::{Deserialize, Serialize};

/// Historical ranges and curve-mechanic constants used for scaling
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizationRanges {
    pub slope: MetricRange,
    /// Price range over the curve's life, for the early/late position
    pub price_position: MetricRange,
    pub liquidity_depth: MetricRange,
    pub trade_velocity: MetricRange,
    pub volatility: MetricRange,
    pub price_impact: MetricRange,
    pub depth_factor: f64,
    pub impact_factor: f64,
}

impl Default for NormalizationRanges {
    fn default() -> Self {
        Self {
            slope: MetricRange::up_to(1.0e-15),
            price_position: MetricRange::up_to(4.5e-7),
            liquidity_depth: MetricRange::up_to(1.0e9),
            trade_velocity: MetricRange::up_to(2.0),
            volatility: MetricRange::up_to(0.1),
            price_impact: MetricRange::up_to(0.1),
            depth_factor: 1.0,
            impact_factor: 0.01,
        }
    }
}

/// Unscaled values, kept for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RawCurveMetrics {
    pub slope: f64,
    pub liquidity_depth: f64,
    pub trade_velocity: f64,
    pub volatility: f64,
    pub price_impact: f64,
    pub price_points: usize,
}

/// Normalized curve indicators for one analysis
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CurveMetrics {
    pub slope: f64,
    pub slope_position: f64,
    pub liquidity_depth: f64,
    pub trade_velocity: f64,
    pub volatility: f64,
    pub price_impact: f64,
    pub current_price: f64,
    pub supply: f64,
    pub market_cap: f64,
    pub liquidity_pool: f64,
    pub raw: RawCurveMetrics,
}

pub struct MetricNormalizer {
    ranges: NormalizationRanges,
    window_seconds: u64,
}

impl MetricNormalizer {
    pub fn new(ranges: NormalizationRanges, window_seconds: u64) -> Self {
        Self {
            ranges,
            window_seconds,
        }
    }

    pub fn ranges(&self) -> &NormalizationRanges {
        &self.ranges
    }

    /// Compute the standing metrics for a window
    pub fn compute(&self, data: &WindowData) -> CurveMetrics {
        let curve = &data.curve;

        let raw_slope = data
            .baseline
            .as_ref()
            .map(|baseline| raw_slope(baseline, curve))
            .unwrap_or(0.0);

        let raw_depth = self.raw_liquidity_depth(curve);

        let raw_velocity =
            stats::safe_div(data.transactions.len() as f64, self.window_seconds as f64);

        let prices = price_points(data);
        let raw_volatility = raw_volatility(&prices);

        let impacts: Vec<f64> = data.transactions.iter().map(|t| t.price_impact).collect();
        let raw_impact = stats::mean(&impacts);

        let slope = self.ranges.slope.normalize(raw_slope);
        let slope_position = if slope == 0.0 {
            0.0
        } else {
            self.ranges.price_position.normalize(curve.current_price)
        };

        CurveMetrics {
            slope,
            slope_position,
            liquidity_depth: self.ranges.liquidity_depth.normalize(raw_depth),
            trade_velocity: self.ranges.trade_velocity.normalize(raw_velocity),
            volatility: self.ranges.volatility.normalize(raw_volatility),
            price_impact: self.ranges.price_impact.normalize(raw_impact),
            current_price: stats::finite_or_zero(curve.current_price),
            supply: stats::finite_or_zero(curve.supply),
            market_cap: stats::finite_or_zero(curve.market_cap),
            liquidity_pool: stats::finite_or_zero(curve.liquidity_pool),
            raw: RawCurveMetrics {
                slope: raw_slope,
                liquidity_depth: raw_depth,
                trade_velocity: raw_velocity,
                volatility: raw_volatility,
                price_impact: raw_impact,
                price_points: prices.len(),
            },
        }
    }

    pub fn raw_liquidity_depth(&self, curve: &CurveState) -> f64 {
        stats::saturate(stats::safe_div(curve.liquidity_pool, curve.current_price) * self.ranges.depth_factor)
    }

    /// Normalized impact of a trade of `trade_size` against a normalized liquidity depth
    ///
    /// An empty pool saturates to 1.0: any trade moves the price maximally.
    pub fn price_impact(&self, trade_size: f64, liquidity_depth: f64) -> f64 {
        if trade_size <= 0.0 || !trade_size.is_finite() {
            return 0.0;
        }
        if liquidity_depth <= 0.0 {
            return 1.0;
        }
        let raw = stats::saturate(stats::safe_div(trade_size, liquidity_depth) * self.ranges.impact_factor);
        self.ranges.price_impact.normalize(raw)
    }
}

/// Plateau (zero supply change) resolves to 0.0
pub fn raw_slope(previous: &CurveState, current: &CurveState) -> f64 {
    stats::safe_div(
        current.current_price - previous.current_price,
        current.supply - previous.supply,
    )
}

/// std_dev(price changes) / mean(price), 0.0 below two price points
pub fn raw_volatility(prices: &[f64]) -> f64 {
    if prices.len() < 2 {
        return 0.0;
    }
    let changes = stats::deltas(prices);
    stats::safe_div(stats::std_dev(&changes), stats::mean(prices))
}

/// Window-start price, priced transactions in order, then the latest price
fn price_points(data: &WindowData) -> Vec<f64> {
    let mut prices = Vec::with_capacity(data.transactions.len() + 2);
    if let Some(ref baseline) = data.baseline {
        if baseline.current_price > 0.0 {
            prices.push(baseline.current_price);
        }
    }
    prices.extend(
        data.transactions
            .iter()
            .filter_map(|t| t.price)
            .filter(|p| *p > 0.0),
    );
    if data.curve.current_price > 0.0 {
        prices.push(data.curve.current_price);
    }
    prices
}
