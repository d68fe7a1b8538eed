//! Sniper detection - burst and automation-like trading in a short window
//!
//! Additive score, each term independently capped:
//!
//! ```text
//! min(0.4, frequency * 2)
//!   + 0.3  if mean inter-arrival < 10s
//!   + 0.2  if first-seen wallet ratio >= threshold
//!   + min(0.1, mean_price_impact * 0.2)
//! ```
//!
//! Active only when score >= 0.6 AND the filtered window holds at least `min_trade_count` trades.

use super::stats;
use super::types::Transaction;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

const ACTIVE_SCORE: f64 = 0.6;
const FAST_INTERVAL_SECS: f64 = 10.0;

/// Wallets observed in earlier windows
///
/// Implementations use interior mutability so one store can be shared
/// across concurrent analyses.
pub trait WalletHistory: Send + Sync {
    fn has_seen(&self, wallet: &str) -> bool;

    fn record(&self, wallet: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SniperConfig {
    pub window_seconds: u64,
    pub max_trade_size: f64,
    pub first_seen_threshold: f64,
    pub min_trade_count: usize,
}

impl Default for SniperConfig {
    fn default() -> Self {
        Self {
            window_seconds: 300,
            max_trade_size: 0.5,
            first_seen_threshold: 0.6,
            min_trade_count: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SniperComponents {
    pub frequency: f64,
    pub interval: f64,
    pub first_seen: f64,
    pub impact: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SniperDetection {
    pub is_active: bool,
    pub score: f64,
    pub components: SniperComponents,
    pub transaction_count: usize,
    /// Trades per second over the window
    pub frequency: f64,
    pub mean_interval: f64,
    pub first_seen_ratio: f64,
    pub mean_price_impact: f64,
}

pub struct SniperDetector {
    config: SniperConfig,
}

impl SniperDetector {
    pub fn new(config: SniperConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(SniperConfig::default())
    }

    /// Resolve which wallets in the window are new, then score
    pub fn detect(
        &self,
        transactions: &[Transaction],
        now: i64,
        history: &dyn WalletHistory,
    ) -> SniperDetection {
        let first_seen: HashSet<String> = self
            .candidates(transactions, now)
            .map(|t| t.wallet.as_str())
            .filter(|wallet| !history.has_seen(wallet))
            .map(str::to_string)
            .collect();

        self.detect_with_first_seen(transactions, now, &first_seen)
    }

    /// Score against a pre-resolved set of first-seen wallets
    pub fn detect_with_first_seen(
        &self,
        transactions: &[Transaction],
        now: i64,
        first_seen: &HashSet<String>,
    ) -> SniperDetection {
        let window: Vec<&Transaction> = self.candidates(transactions, now).collect();
        let count = window.len();
        if count == 0 {
            return SniperDetection::default();
        }

        let frequency = stats::safe_div(count as f64, self.config.window_seconds as f64);

        let mut timestamps: Vec<i64> = window.iter().map(|t| t.timestamp).collect();
        timestamps.sort_unstable();
        let intervals: Vec<f64> = timestamps
            .windows(2)
            .map(|w| w[1].saturating_sub(w[0]) as f64)
            .collect();
        let mean_interval = stats::mean(&intervals);

        let wallets: HashSet<&str> = window.iter().map(|t| t.wallet.as_str()).collect();
        let new_wallets = wallets.iter().filter(|w| first_seen.contains(**w)).count();
        let first_seen_ratio = stats::safe_div(new_wallets as f64, wallets.len() as f64);

        let impacts: Vec<f64> = window.iter().map(|t| t.price_impact).collect();
        let mean_price_impact = stats::mean(&impacts);

        let components = SniperComponents {
            frequency: (frequency * 2.0).min(0.4),
            // a lone trade has mean_interval 0 and counts as fast
            interval: if mean_interval < FAST_INTERVAL_SECS {
                0.3
            } else {
                0.0
            },
            first_seen: if first_seen_ratio >= self.config.first_seen_threshold {
                0.2
            } else {
                0.0
            },
            impact: (mean_price_impact * 0.2).min(0.1),
        };

        let score = stats::clamp_unit(
            components.frequency + components.interval + components.first_seen + components.impact,
        );

        SniperDetection {
            is_active: score >= ACTIVE_SCORE && count >= self.config.min_trade_count,
            score,
            components,
            transaction_count: count,
            frequency,
            mean_interval,
            first_seen_ratio,
            mean_price_impact,
        }
    }

    fn candidates<'a>(
        &'a self,
        transactions: &'a [Transaction],
        now: i64,
    ) -> impl Iterator<Item = &'a Transaction> + 'a {
        let cutoff = now.saturating_sub_unsigned(self.config.window_seconds);
        transactions
            .iter()
            .filter(move |t| t.amount <= self.config.max_trade_size && t.timestamp >= cutoff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis_core::types::TradeSide;
    use std::sync::Mutex;

    struct FixedHistory(Mutex<HashSet<String>>);

    impl FixedHistory {
        fn new(seen: &[&str]) -> Self {
            Self(Mutex::new(seen.iter().map(|s| s.to_string()).collect()))
        }
    }

    impl WalletHistory for FixedHistory {
        fn has_seen(&self, wallet: &str) -> bool {
            self.0.lock().unwrap().contains(wallet)
        }

        fn record(&self, wallet: &str) {
            self.0.lock().unwrap().insert(wallet.to_string());
        }
    }

    fn make_tx(wallet: &str, amount: f64, timestamp: i64, impact: f64) -> Transaction {
        Transaction::new(wallet, amount, timestamp, impact, TradeSide::Buy)
    }

    fn burst(count: i64, start: i64) -> Vec<Transaction> {
        (0..count)
            .map(|i| make_tx(&format!("sniper_{}", i), 0.1, start + i, 0.5))
            .collect()
    }

    #[test]
    fn test_high_score_but_too_few_trades_is_inactive() {
        let detector = SniperDetector::new(SniperConfig {
            window_seconds: 5,
            ..SniperConfig::default()
        });
        let history = FixedHistory::new(&[]);

        // 3 trades in 5s: 0.4 + 0.3 + 0.2 + min(0.1, 0.5 * 0.2) = 1.0 (clamped)
        let txs = burst(3, 100);
        let result = detector.detect(&txs, 103, &history);

        assert!(result.score >= 0.9, "score was {}", result.score);
        assert_eq!(result.transaction_count, 3);
        assert!(!result.is_active);
    }

    #[test]
    fn test_ninety_percent_score_with_three_trades() {
        let detector = SniperDetector::new(SniperConfig {
            window_seconds: 5,
            ..SniperConfig::default()
        });
        let history = FixedHistory::new(&[]);

        // zero impact: 0.4 + 0.3 + 0.2 = 0.9
        let txs: Vec<Transaction> = (0..3).map(|i| make_tx(&format!("w{}", i), 0.1, 100 + i, 0.0)).collect();
        let result = detector.detect(&txs, 103, &history);

        assert!((result.score - 0.9).abs() < 1e-12);
        assert!(!result.is_active);
    }

    #[test]
    fn test_active_burst() {
        let detector = SniperDetector::new(SniperConfig {
            window_seconds: 10,
            ..SniperConfig::default()
        });
        let history = FixedHistory::new(&[]);

        let txs = burst(8, 100);
        let result = detector.detect(&txs, 108, &history);

        assert!(result.is_active);
        assert_eq!(result.components.frequency, 0.4);
        assert_eq!(result.components.interval, 0.3);
        assert_eq!(result.components.first_seen, 0.2);
        assert_eq!(result.first_seen_ratio, 1.0);
        assert_eq!(result.mean_interval, 1.0);
    }

    #[test]
    fn test_known_wallets_and_large_trades_filtered() {
        let detector = SniperDetector::with_defaults();
        let history = FixedHistory::new(&["a", "b", "c"]);

        let txs = vec![
            make_tx("a", 0.1, 1000, 0.0),
            make_tx("b", 0.2, 1030, 0.0),
            make_tx("c", 0.3, 1060, 0.0),
            make_tx("whale", 50.0, 1061, 0.0), // above max_trade_size
            make_tx("d", 0.1, 500, 0.0),       // outside window
        ];
        let result = detector.detect(&txs, 1100, &history);

        assert_eq!(result.transaction_count, 3);
        assert_eq!(result.first_seen_ratio, 0.0);
        assert_eq!(result.components.first_seen, 0.0);
        assert_eq!(result.mean_interval, 30.0);
        assert_eq!(result.components.interval, 0.0);
        assert!(!result.is_active);
    }

    #[test]
    fn test_lone_trade_counts_as_fast() {
        let detector = SniperDetector::with_defaults();
        let history = FixedHistory::new(&["solo"]);

        let result = detector.detect(&[make_tx("solo", 0.1, 1000, 0.0)], 1000, &history);
        assert_eq!(result.transaction_count, 1);
        assert_eq!(result.mean_interval, 0.0);
        assert_eq!(result.components.interval, 0.3);
        // frequency 1/300 * 2 plus the interval term
        assert!((result.score - (2.0 / 300.0 + 0.3)).abs() < 1e-12);
        assert!(!result.is_active);
    }

    #[test]
    fn test_extreme_timestamps_do_not_overflow() {
        let detector = SniperDetector::with_defaults();
        let history = FixedHistory::new(&[]);
        let txs = vec![
            make_tx("a", 0.1, i64::MIN, 0.0),
            make_tx("b", 0.1, i64::MAX - 1, 0.0),
            make_tx("c", 0.1, i64::MAX, 0.0),
        ];

        let recent = detector.detect(&txs, i64::MAX, &history);
        assert_eq!(recent.transaction_count, 2);
        assert_eq!(recent.mean_interval, 1.0);

        // cutoff saturates at i64::MIN, so every trade is in the window
        let ancient = detector.detect(&txs, i64::MIN + 10, &history);
        assert_eq!(ancient.transaction_count, 3);
        assert!(ancient.mean_interval.is_finite());
        assert!((0.0..=1.0).contains(&ancient.score));
    }

    #[test]
    fn test_empty_window() {
        let detector = SniperDetector::with_defaults();
        let history = FixedHistory::new(&[]);

        let result = detector.detect(&[], 1000, &history);
        assert_eq!(result, SniperDetection::default());
    }

    #[test]
    fn test_repeated_calls_identical() {
        let detector = SniperDetector::with_defaults();
        let history = FixedHistory::new(&["sniper_0"]);
        let txs = burst(6, 1000);

        let first = detector.detect(&txs, 1010, &history);
        let second = detector.detect(&txs, 1010, &history);
        assert_eq!(first, second);
        assert_eq!(first.score.to_bits(), second.score.to_bits());
    }
}
