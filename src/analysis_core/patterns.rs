//! Whale, bot and price-pattern recognition
//!
//! Whale: direct predicate-and-aggregate pass over `amount >= whale_threshold`.
//!
//! Bot fingerprint over the whole window:
//! - regularity = max(0, 1 - std_dev(intervals) / mean(intervals))
//! - consistency = 1 - min(1, std_dev(amounts) / mean(amounts))
//! - reuse_ratio = transactions / unique_wallets
//! - bot_score = 0.4 * regularity + 0.3 * consistency + 0.3 * min(1, reuse_ratio)
//!
//! Pump/dump and size anomalies read execution prices and amounts; they annotate the
//! analysis and never feed the risk score.

use super::stats;
use super::types::Transaction;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

const BOT_DETECTED_SCORE: f64 = 0.6;

mod pattern_thresholds {
    pub const PRICE_PATTERN_MIN_TXS: usize = 5;
    pub const PRICE_PATTERN_MIN_PRICES: usize = 3;
    pub const PRICE_PATTERN_AVG_CHANGE: f64 = 0.1;
    pub const ANOMALY_SIGMA: f64 = 3.0;
    pub const ANOMALY_CONFIDENCE: f64 = 0.7;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PatternConfig {
    pub window_seconds: u64,
    pub whale_threshold: f64,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            window_seconds: 300,
            whale_threshold: 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WhaleActivity {
    pub is_active: bool,
    pub count: usize,
    pub total_volume: f64,
    pub max_trade: f64,
    pub distinct_wallets: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BotActivity {
    pub is_detected: bool,
    pub score: f64,
    pub regularity_score: f64,
    pub consistency_score: f64,
    pub reuse_ratio: f64,
    pub transaction_count: usize,
    pub unique_wallets: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    WhaleMovement,
    BotActivity,
    PumpPattern,
    DumpPattern,
    Anomaly,
}

impl PatternKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternKind::WhaleMovement => "whale_movement",
            PatternKind::BotActivity => "bot_activity",
            PatternKind::PumpPattern => "pump_pattern",
            PatternKind::DumpPattern => "dump_pattern",
            PatternKind::Anomaly => "anomaly",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedPattern {
    pub kind: PatternKind,
    pub confidence: f64,
    pub timestamp: Option<i64>,
    pub wallet: Option<String>,
    pub amount: Option<f64>,
    /// Average relative price change (pump/dump) or σ distance (anomaly)
    pub magnitude: Option<f64>,
}

pub struct PatternRecognizer {
    config: PatternConfig,
}

impl PatternRecognizer {
    pub fn new(config: PatternConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(PatternConfig::default())
    }

    pub fn detect_whales(&self, transactions: &[Transaction], now: i64) -> WhaleActivity {
        let whales: Vec<&Transaction> = self
            .in_window(transactions, now)
            .filter(|t| t.amount >= self.config.whale_threshold)
            .collect();

        let wallets: HashSet<&str> = whales.iter().map(|t| t.wallet.as_str()).collect();

        WhaleActivity {
            is_active: !whales.is_empty(),
            count: whales.len(),
            total_volume: stats::sum(whales.iter().map(|t| t.amount)),
            max_trade: whales.iter().map(|t| t.amount).fold(0.0, f64::max),
            distinct_wallets: wallets.len(),
        }
    }

    /// Fewer than two transactions carry no fingerprint and score 0
    pub fn detect_bots(&self, transactions: &[Transaction], now: i64) -> BotActivity {
        let window: Vec<&Transaction> = self.in_window(transactions, now).collect();
        if window.len() < 2 {
            return BotActivity {
                transaction_count: window.len(),
                unique_wallets: window.len(),
                ..BotActivity::default()
            };
        }

        let mut timestamps: Vec<i64> = window.iter().map(|t| t.timestamp).collect();
        timestamps.sort_unstable();
        let intervals: Vec<f64> = timestamps
            .windows(2)
            .map(|w| w[1].saturating_sub(w[0]) as f64)
            .collect();

        let interval_mean = stats::mean(&intervals);
        let regularity_score = if interval_mean == 0.0 {
            0.0
        } else {
            (1.0 - stats::safe_div(stats::std_dev(&intervals), interval_mean)).max(0.0)
        };

        let amounts: Vec<f64> = window.iter().map(|t| t.amount).collect();
        let consistency_score = 1.0 - stats::coefficient_of_variation(&amounts).min(1.0);

        let unique_wallets = window
            .iter()
            .map(|t| t.wallet.as_str())
            .collect::<HashSet<_>>()
            .len();
        let reuse_ratio = stats::safe_div(window.len() as f64, unique_wallets as f64);

        let score = stats::clamp_unit(
            0.4 * regularity_score + 0.3 * consistency_score + 0.3 * reuse_ratio.min(1.0),
        );

        BotActivity {
            is_detected: score >= BOT_DETECTED_SCORE,
            score,
            regularity_score: stats::clamp_unit(regularity_score),
            consistency_score: stats::clamp_unit(consistency_score),
            reuse_ratio,
            transaction_count: window.len(),
            unique_wallets,
        }
    }

    /// Pump/dump over timestamp-ordered execution prices
    pub fn detect_price_patterns(&self, transactions: &[Transaction]) -> Vec<DetectedPattern> {
        use pattern_thresholds::*;

        if transactions.len() < PRICE_PATTERN_MIN_TXS {
            return Vec::new();
        }

        let mut priced: Vec<&Transaction> = transactions
            .iter()
            .filter(|t| t.price.map_or(false, |p| p > 0.0))
            .collect();
        if priced.len() < PRICE_PATTERN_MIN_PRICES {
            return Vec::new();
        }
        priced.sort_by_key(|t| t.timestamp);

        let prices: Vec<f64> = priced.iter().filter_map(|t| t.price).collect();
        let changes: Vec<f64> = prices
            .windows(2)
            .map(|w| stats::safe_div(w[1] - w[0], w[0]))
            .collect();
        let avg_change = stats::mean(&changes);

        let kind = if avg_change > PRICE_PATTERN_AVG_CHANGE {
            PatternKind::PumpPattern
        } else if avg_change < -PRICE_PATTERN_AVG_CHANGE {
            PatternKind::DumpPattern
        } else {
            return Vec::new();
        };

        vec![DetectedPattern {
            kind,
            confidence: stats::clamp_unit(avg_change.abs() * 5.0),
            timestamp: priced.last().map(|t| t.timestamp),
            wallet: None,
            amount: None,
            magnitude: Some(avg_change),
        }]
    }

    /// Trades more than 3σ away from the mean size
    pub fn detect_anomalies(&self, transactions: &[Transaction]) -> Vec<DetectedPattern> {
        use pattern_thresholds::*;

        let amounts: Vec<f64> = transactions.iter().map(|t| t.amount).collect();
        let avg = stats::mean(&amounts);
        let sigma = stats::std_dev(&amounts);
        if sigma == 0.0 {
            return Vec::new();
        }

        transactions
            .iter()
            .filter(|t| (t.amount - avg).abs() > sigma * ANOMALY_SIGMA)
            .map(|t| DetectedPattern {
                kind: PatternKind::Anomaly,
                confidence: ANOMALY_CONFIDENCE,
                timestamp: Some(t.timestamp),
                wallet: Some(t.wallet.clone()),
                amount: Some(t.amount),
                magnitude: Some(stats::safe_div((t.amount - avg).abs(), sigma)),
            })
            .collect()
    }

    /// Every pattern annotation for a window, whale and bot results included
    pub fn collect_patterns(
        &self,
        transactions: &[Transaction],
        whales: &WhaleActivity,
        bots: &BotActivity,
        now: i64,
    ) -> Vec<DetectedPattern> {
        let mut patterns = Vec::new();

        if whales.is_active {
            let threshold = self.config.whale_threshold;
            patterns.extend(
                self.in_window(transactions, now)
                    .filter(|t| t.amount >= threshold)
                    .map(|t| DetectedPattern {
                        kind: PatternKind::WhaleMovement,
                        confidence: stats::clamp_unit(stats::safe_div(t.amount, threshold * 2.0)),
                        timestamp: Some(t.timestamp),
                        wallet: Some(t.wallet.clone()),
                        amount: Some(t.amount),
                        magnitude: None,
                    }),
            );
        }

        if bots.is_detected {
            patterns.push(DetectedPattern {
                kind: PatternKind::BotActivity,
                confidence: bots.score,
                timestamp: None,
                wallet: None,
                amount: None,
                magnitude: Some(bots.regularity_score),
            });
        }

        patterns.extend(self.detect_price_patterns(transactions));
        patterns.extend(self.detect_anomalies(transactions));
        patterns
    }

    fn in_window<'a>(
        &'a self,
        transactions: &'a [Transaction],
        now: i64,
    ) -> impl Iterator<Item = &'a Transaction> + 'a {
        let cutoff = now.saturating_sub_unsigned(self.config.window_seconds);
        transactions.iter().filter(move |t| t.timestamp >= cutoff)
    }
}
