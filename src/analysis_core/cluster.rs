//! Buy-cluster detection - groups time-localized transactions and scores coordination
//!
//! Single left-to-right sweep over timestamp-ordered transactions. A cluster is anchored at
//! its first member and extended while `timestamp - anchor <= cluster_window`; the first
//! transaction past the window closes it and anchors the next one.
//!
//! Per cluster:
//! - wallet_correlation = unique_wallets / transactions (1.0 = all distinct)
//! - size_cv = std_dev(amounts) / mean(amounts)
//! - correlation_score = 0.5 * (1 - wallet_correlation) + 0.5 * (1 - min(1, size_cv))

use super::stats;
use super::types::Transaction;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub cluster_window_seconds: u64,
    pub min_cluster_size: usize,
    pub size_correlation_threshold: f64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            cluster_window_seconds: 60,
            min_cluster_size: 2,
            size_correlation_threshold: 0.3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub start_time: i64,
    pub end_time: i64,
    pub transaction_count: usize,
    pub total_volume: f64,
    pub unique_wallets: usize,
    pub wallet_correlation: f64,
    pub size_cv: f64,
    pub correlation_score: f64,
    pub avg_amount: f64,
    pub size_std: f64,
    /// Positions of the members in timestamp order (ties keep input order)
    pub members: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ClusterDetection {
    pub is_detected: bool,
    /// Highest correlation score among kept clusters
    pub score: f64,
    pub cluster_count: usize,
    pub clustered_transactions: usize,
    /// Sorted by correlation score, strongest first
    pub clusters: Vec<Cluster>,
}

pub struct ClusterDetector {
    config: ClusterConfig,
}

impl ClusterDetector {
    pub fn new(config: ClusterConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(ClusterConfig::default())
    }

    pub fn detect(&self, transactions: &[Transaction]) -> ClusterDetection {
        let mut ordered: Vec<&Transaction> = transactions.iter().collect();
        ordered.sort_by_key(|t| t.timestamp);

        let mut clusters: Vec<Cluster> = self
            .sweep(&ordered)
            .into_iter()
            .filter(|members| members.len() >= self.config.min_cluster_size.max(1))
            .map(|members| build_cluster(&ordered, members))
            .filter(|c| c.correlation_score >= self.config.size_correlation_threshold)
            .collect();

        clusters.sort_by(|a, b| b.correlation_score.total_cmp(&a.correlation_score));

        let score = clusters.first().map(|c| c.correlation_score).unwrap_or(0.0);
        let clustered_transactions = clusters.iter().map(|c| c.transaction_count).sum();

        ClusterDetection {
            is_detected: !clusters.is_empty(),
            score,
            cluster_count: clusters.len(),
            clustered_transactions,
            clusters,
        }
    }

    /// Partition ordered positions into anchor-windowed runs
    fn sweep(&self, ordered: &[&Transaction]) -> Vec<Vec<usize>> {
        let window = self.config.cluster_window_seconds;
        let mut runs = Vec::new();
        let mut current: Vec<usize> = Vec::new();
        let mut anchor = 0i64;

        for (idx, tx) in ordered.iter().enumerate() {
            if current.is_empty() {
                anchor = tx.timestamp;
                current.push(idx);
            } else if tx.timestamp.saturating_sub(anchor).unsigned_abs() <= window {
                current.push(idx);
            } else {
                runs.push(std::mem::take(&mut current));
                anchor = tx.timestamp;
                current.push(idx);
            }
        }
        if !current.is_empty() {
            runs.push(current);
        }
        runs
    }
}

fn build_cluster(ordered: &[&Transaction], members: Vec<usize>) -> Cluster {
    let amounts: Vec<f64> = members.iter().map(|&i| ordered[i].amount).collect();
    let wallets: HashSet<&str> = members.iter().map(|&i| ordered[i].wallet.as_str()).collect();

    let transaction_count = members.len();
    let unique_wallets = wallets.len();
    let wallet_correlation = stats::safe_div(unique_wallets as f64, transaction_count as f64);
    let avg_amount = stats::mean(&amounts);
    let size_std = stats::std_dev(&amounts);
    let size_cv = stats::coefficient_of_variation(&amounts);

    let correlation_score = stats::clamp_unit(
        0.5 * (1.0 - wallet_correlation) + 0.5 * (1.0 - size_cv.min(1.0)),
    );

    Cluster {
        start_time: ordered[members[0]].timestamp,
        end_time: ordered[members[members.len() - 1]].timestamp,
        transaction_count,
        total_volume: stats::sum(amounts.iter().copied()),
        unique_wallets,
        wallet_correlation,
        size_cv,
        correlation_score,
        avg_amount,
        size_std,
        members,
    }
}
