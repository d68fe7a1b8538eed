//! Intelligence Engine - the façade over one token's analysis
//!
//! ## Flow
//!
//! ```text
//! analyze(mint)
//!     ↓
//! AnalysisCache (coalesced per (mint, window_seconds), TTL)
//!     ↓ miss
//! DataCollector::fetch_window  ──DataUnavailable──→ empty window, low confidence
//!     ↓
//! MetricNormalizer
//!     ↓
//! ┌──────────────┬────────────────┬─────────────────────┐
//! SniperDetector   ClusterDetector   PatternRecognizer      (spawned, joined)
//! └──────────────┴────────────────┴─────────────────────┘
//!     ↓
//! RiskAggregator → WindowOptimizer → AnalysisResult
//! ```
//!
//! Detectors run against the timestamp of the latest curve snapshot, falling back to
//! the engine clock when the snapshot carries none. Wallets are recorded in the history
//! only after the analysis that saw them completes.

use crate::analysis_core::{
    assess_trade_impact, BotActivity, ClusterDetection, ClusterDetector, CurveMetrics,
    DetectedPattern, DetectorOutputs, ExecutionWindow, MetricNormalizer, MetricSample,
    PatternKind, PatternRecognizer, RiskAggregator, RiskAssessment, RiskFlag, SniperDetection,
    SniperDetector, TradeImpact, TradeSide, Transaction, WalletHistory, WhaleActivity,
    WindowData, WindowOptimizer,
};
use crate::pipeline::cache::{AnalysisCache, CacheStats, Cacheable};
use crate::pipeline::collector::DataCollector;
use crate::pipeline::config::{ConfigError, IntelligenceConfig};
use crate::pipeline::error::IntelligenceError;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

const MINT_MIN_LEN: usize = 32;
const MINT_MAX_LEN: usize = 44;
const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Composed outcome of one analysis
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub token_mint: String,
    /// Engine clock when the analysis ran
    pub timestamp: i64,
    /// Time the detectors measured their windows against
    pub reference_time: i64,
    pub window_seconds: u64,
    pub transaction_count: usize,
    pub metrics: CurveMetrics,
    pub risk: RiskAssessment,
    pub sniper: SniperDetection,
    pub clusters: ClusterDetection,
    pub whales: WhaleActivity,
    pub bots: BotActivity,
    pub patterns: Vec<DetectedPattern>,
    pub pattern_flags: Vec<PatternKind>,
    /// Window for the configured reference trade size
    pub execution_window: ExecutionWindow,
    /// Set when the collector could not supply data
    pub low_confidence: bool,
}

impl Cacheable for AnalysisResult {
    fn is_cacheable(&self) -> bool {
        !self.low_confidence
    }
}

/// Base58, 32 to 44 characters
pub fn validate_mint(token_mint: &str) -> Result<(), IntelligenceError> {
    let len = token_mint.len();
    if !(MINT_MIN_LEN..=MINT_MAX_LEN).contains(&len)
        || !token_mint.chars().all(|c| BASE58_ALPHABET.contains(c))
    {
        return Err(IntelligenceError::InvalidToken(token_mint.to_string()));
    }
    Ok(())
}

fn validate_amount(amount: f64) -> Result<(), IntelligenceError> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(IntelligenceError::InvalidInput(format!(
            "trade amount must be finite and >= 0 (got {})",
            amount
        )));
    }
    Ok(())
}

/// Recent metric samples per token, for trend extrapolation
///
/// Holds at most `max_tokens` tokens; a new token evicts the one updated longest ago.
struct SampleStore {
    capacity: usize,
    max_tokens: usize,
    inner: Mutex<SampleSlots>,
}

#[derive(Default)]
struct SampleSlots {
    tick: u64,
    by_token: HashMap<String, TokenSamples>,
}

struct TokenSamples {
    last_update: u64,
    samples: VecDeque<MetricSample>,
}

impl SampleStore {
    fn new(capacity: usize, max_tokens: usize) -> Self {
        Self {
            capacity: capacity.max(2),
            max_tokens: max_tokens.max(1),
            inner: Mutex::new(SampleSlots::default()),
        }
    }

    /// Append a sample (replacing one with the same timestamp) and return the history
    fn push(&self, token_mint: &str, sample: MetricSample) -> Vec<MetricSample> {
        let mut slots = self.lock();
        slots.tick += 1;
        let tick = slots.tick;

        if !slots.by_token.contains_key(token_mint) && slots.by_token.len() >= self.max_tokens {
            let stalest = slots
                .by_token
                .iter()
                .min_by_key(|(_, entry)| entry.last_update)
                .map(|(mint, _)| mint.clone());
            if let Some(mint) = stalest {
                slots.by_token.remove(&mint);
                log::debug!("🧹 Dropped trend samples for {}", mint);
            }
        }

        let entry = slots
            .by_token
            .entry(token_mint.to_string())
            .or_insert_with(|| TokenSamples {
                last_update: tick,
                samples: VecDeque::new(),
            });
        entry.last_update = tick;

        if entry.samples.back().map(|s| s.timestamp) == Some(sample.timestamp) {
            entry.samples.pop_back();
        }
        entry.samples.push_back(sample);
        while entry.samples.len() > self.capacity {
            entry.samples.pop_front();
        }
        entry.samples.iter().copied().collect()
    }

    fn get(&self, token_mint: &str) -> Vec<MetricSample> {
        self.lock()
            .by_token
            .get(token_mint)
            .map(|entry| entry.samples.iter().copied().collect())
            .unwrap_or_default()
    }

    fn tracked_tokens(&self) -> usize {
        self.lock().by_token.len()
    }

    fn lock(&self) -> MutexGuard<'_, SampleSlots> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

struct EngineCore {
    config: IntelligenceConfig,
    collector: Arc<dyn DataCollector>,
    history: Arc<dyn WalletHistory>,
    normalizer: MetricNormalizer,
    sniper: SniperDetector,
    cluster: ClusterDetector,
    patterns: PatternRecognizer,
    aggregator: RiskAggregator,
    optimizer: WindowOptimizer,
    samples: SampleStore,
    now_fn: Box<dyn Fn() -> i64 + Send + Sync>,
}

pub struct IntelligenceEngine {
    core: Arc<EngineCore>,
    cache: AnalysisCache<AnalysisResult>,
}

impl IntelligenceEngine {
    pub fn new(
        config: IntelligenceConfig,
        collector: Arc<dyn DataCollector>,
        history: Arc<dyn WalletHistory>,
    ) -> Result<Self, ConfigError> {
        Self::new_with_timestamp_fn(
            config,
            collector,
            history,
            Box::new(|| chrono::Utc::now().timestamp()),
        )
    }

    /// Same as `new` with an injected clock (for testing)
    pub fn new_with_timestamp_fn(
        config: IntelligenceConfig,
        collector: Arc<dyn DataCollector>,
        history: Arc<dyn WalletHistory>,
        now_fn: Box<dyn Fn() -> i64 + Send + Sync>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let cache = AnalysisCache::new(config.cache_ttl());
        let core = EngineCore {
            normalizer: MetricNormalizer::new(config.ranges, config.window_seconds),
            sniper: SniperDetector::new(config.sniper_config()),
            cluster: ClusterDetector::new(config.cluster_config()),
            patterns: PatternRecognizer::new(config.pattern_config()),
            aggregator: RiskAggregator::new(config.risk_thresholds()),
            optimizer: WindowOptimizer::new(config.optimizer.clone(), config.risk_thresholds()),
            samples: SampleStore::new(config.optimizer.sample_history, config.max_tracked_tokens),
            config,
            collector,
            history,
            now_fn,
        };

        log::info!(
            "🧠 Intelligence engine ready (window {}s, cache TTL {}s)",
            core.config.window_seconds,
            core.config.cache_ttl_seconds
        );

        Ok(Self {
            core: Arc::new(core),
            cache,
        })
    }

    pub fn config(&self) -> &IntelligenceConfig {
        &self.core.config
    }

    /// Full analysis of a token, served from cache when fresh
    pub async fn analyze(&self, token_mint: &str) -> Result<Arc<AnalysisResult>, IntelligenceError> {
        validate_mint(token_mint)?;

        let key = (token_mint.to_string(), self.core.config.window_seconds);
        let core = Arc::clone(&self.core);
        let mint = token_mint.to_string();

        self.cache.get_or_compute(key, async move { core.compute(mint).await }).await
    }

    /// Best execution slice for a specific intent and size
    pub async fn optimal_window(
        &self,
        token_mint: &str,
        intent: TradeSide,
        amount: f64,
    ) -> Result<ExecutionWindow, IntelligenceError> {
        validate_mint(token_mint)?;
        validate_amount(amount)?;

        let result = self.analyze(token_mint).await?;
        let samples = self.core.samples.get(token_mint);

        Ok(self.core.optimizer.optimize(
            &self.core.normalizer,
            &samples,
            result.reference_time,
            intent,
            amount,
        ))
    }

    /// Impact of a prospective trade against the current standing metrics
    pub async fn assess_trade_impact(
        &self,
        token_mint: &str,
        amount: f64,
        side: TradeSide,
    ) -> Result<TradeImpact, IntelligenceError> {
        validate_mint(token_mint)?;
        validate_amount(amount)?;

        let result = self.analyze(token_mint).await?;
        Ok(assess_trade_impact(&self.core.normalizer, &result.metrics, amount, side))
    }

    /// New-transaction signal: drop cached and in-flight results for the mint
    pub fn invalidate(&self, token_mint: &str) -> usize {
        self.cache.invalidate(token_mint)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Tokens currently holding trend samples
    pub fn tracked_tokens(&self) -> usize {
        self.core.samples.tracked_tokens()
    }
}

impl EngineCore {
    async fn compute(self: Arc<Self>, token_mint: String) -> Result<AnalysisResult, IntelligenceError> {
        let started = Instant::now();
        let now = (self.now_fn)();
        let window_seconds = self.config.window_seconds;

        let (mut data, low_confidence) =
            match self.collector.fetch_window(&token_mint, window_seconds).await {
                Ok(data) => (data, false),
                Err(IntelligenceError::DataUnavailable(reason)) => {
                    log::warn!(
                        "⚠️  Data unavailable for {}, analyzing empty window: {}",
                        token_mint,
                        reason
                    );
                    (WindowData::default(), true)
                }
                Err(e) => return Err(e),
            };
        let fetch_ms = started.elapsed().as_millis();

        data.validate().map_err(IntelligenceError::InvalidInput)?;
        data.sort_transactions();

        let reference_time = if data.curve.timestamp > 0 {
            data.curve.timestamp
        } else {
            now
        };

        let metrics = self.normalizer.compute(&data);

        let transactions: Arc<Vec<Transaction>> = Arc::new(data.transactions);
        let first_seen: HashSet<String> = transactions
            .iter()
            .map(|t| t.wallet.as_str())
            .collect::<HashSet<&str>>()
            .into_iter()
            .filter(|wallet| !self.history.has_seen(wallet))
            .map(str::to_string)
            .collect();

        let sniper_task = {
            let core = Arc::clone(&self);
            let txs = Arc::clone(&transactions);
            tokio::spawn(async move {
                core.sniper.detect_with_first_seen(&txs, reference_time, &first_seen)
            })
        };
        let cluster_task = {
            let core = Arc::clone(&self);
            let txs = Arc::clone(&transactions);
            tokio::spawn(async move { core.cluster.detect(&txs) })
        };
        let pattern_task = {
            let core = Arc::clone(&self);
            let txs = Arc::clone(&transactions);
            tokio::spawn(async move {
                let whales = core.patterns.detect_whales(&txs, reference_time);
                let bots = core.patterns.detect_bots(&txs, reference_time);
                let patterns = core.patterns.collect_patterns(&txs, &whales, &bots, reference_time);
                (whales, bots, patterns)
            })
        };

        let (sniper, clusters, pattern_output) = tokio::join!(sniper_task, cluster_task, pattern_task);
        let detector_failed =
            |e: tokio::task::JoinError| IntelligenceError::Internal(format!("detector task failed: {}", e));
        let sniper = sniper.map_err(detector_failed)?;
        let clusters = clusters.map_err(detector_failed)?;
        let (whales, bots, patterns) = pattern_output.map_err(detector_failed)?;

        let mut risk = self.aggregator.assess(
            &metrics,
            DetectorOutputs {
                sniper: &sniper,
                clusters: &clusters,
                whales: &whales,
                bots: &bots,
            },
        );
        if low_confidence {
            risk.flags.insert(RiskFlag::LowConfidenceData);
        }

        let samples = if low_confidence {
            self.samples.get(&token_mint)
        } else {
            self.samples
                .push(&token_mint, MetricSample::from_metrics(reference_time, &metrics, sniper.score))
        };
        let execution_window = self.optimizer.optimize(
            &self.normalizer,
            &samples,
            reference_time,
            TradeSide::Buy,
            self.config.optimizer.reference_trade_size,
        );

        let wallets: HashSet<&str> = transactions.iter().map(|t| t.wallet.as_str()).collect();
        for wallet in &wallets {
            self.history.record(wallet);
        }

        let pattern_flags: Vec<PatternKind> = patterns
            .iter()
            .map(|p| p.kind)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        log::debug!(
            "📊 {} analyzed: risk {:.3} ({}), {} txs, fetch {}ms, total {}ms",
            token_mint,
            risk.risk_score,
            risk.risk_level.as_str(),
            transactions.len(),
            fetch_ms,
            started.elapsed().as_millis()
        );

        Ok(AnalysisResult {
            token_mint,
            timestamp: now,
            reference_time,
            window_seconds,
            transaction_count: transactions.len(),
            metrics,
            risk,
            sniper,
            clusters,
            whales,
            bots,
            patterns,
            pattern_flags,
            execution_window,
            low_confidence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_mints() {
        assert!(validate_mint("7GCihgDB8fe6KNjn2MYtkzZcRjQy3t9GHdC8uHYmW2hr").is_ok());
        assert!(validate_mint("So11111111111111111111111111111111111111112").is_ok());
        assert!(validate_mint(&"1".repeat(32)).is_ok());
    }

    #[test]
    fn test_invalid_mints() {
        for bad in [
            "",
            "short",
            "0GCihgDB8fe6KNjn2MYtkzZcRjQy3t9GHdC8uHYmW2hr", // '0' not base58
            "lGCihgDB8fe6KNjn2MYtkzZcRjQy3t9GHdC8uHYmW2hr", // 'l' not base58
            "7GCihgDB8fe6KNjn2MYtkzZcRjQy3t9GHdC8uHYmW2hr7GCih",
            "7GCihgDB8fe6KNjn2MYtkzZcRjQy3t9G HdC8uHYmW2h",
        ] {
            assert!(
                matches!(validate_mint(bad), Err(IntelligenceError::InvalidToken(_))),
                "accepted {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_amount_validation() {
        assert!(validate_amount(0.0).is_ok());
        assert!(validate_amount(12.5).is_ok());
        assert!(validate_amount(-0.1).is_err());
        assert!(validate_amount(f64::NAN).is_err());
        assert!(validate_amount(f64::INFINITY).is_err());
    }

    fn sample_at(timestamp: i64, depth: f64) -> MetricSample {
        MetricSample {
            timestamp,
            liquidity_depth: depth,
            volatility: 0.1,
            trade_velocity: 0.1,
            sniper_score: 0.0,
        }
    }

    #[test]
    fn test_sample_store_keeps_recent_samples() {
        let store = SampleStore::new(3, 8);
        for ts in [10, 20, 30, 40] {
            store.push("mint", sample_at(ts, 0.5));
        }
        let history = store.push("mint", sample_at(40, 0.9));

        let timestamps: Vec<i64> = history.iter().map(|s| s.timestamp).collect();
        assert_eq!(timestamps, vec![20, 30, 40]);
        assert_eq!(history[2].liquidity_depth, 0.9);
        assert!(store.get("other").is_empty());
    }

    #[test]
    fn test_sample_store_evicts_stalest_token() {
        let store = SampleStore::new(4, 2);
        store.push("a", sample_at(1, 0.1));
        store.push("b", sample_at(1, 0.2));
        store.push("a", sample_at(2, 0.3));

        // "b" was updated longest ago
        store.push("c", sample_at(1, 0.4));
        assert_eq!(store.tracked_tokens(), 2);
        assert!(store.get("b").is_empty());
        assert_eq!(store.get("a").len(), 2);
        assert_eq!(store.get("c").len(), 1);

        for i in 0..100 {
            store.push(&format!("mint_{}", i), sample_at(1, 0.5));
        }
        assert_eq!(store.tracked_tokens(), 2);
    }

    #[test]
    fn test_low_confidence_results_are_not_cacheable() {
        let result = AnalysisResult {
            token_mint: "m".to_string(),
            timestamp: 0,
            reference_time: 0,
            window_seconds: 300,
            transaction_count: 0,
            metrics: CurveMetrics::default(),
            risk: RiskAssessment {
                risk_score: 0.0,
                risk_level: crate::analysis_core::RiskLevel::Low,
                flags: BTreeSet::new(),
                privacy_recommendation: crate::analysis_core::PrivacyMode::Normal,
            },
            sniper: SniperDetection::default(),
            clusters: ClusterDetection::default(),
            whales: WhaleActivity::default(),
            bots: BotActivity::default(),
            patterns: Vec::new(),
            pattern_flags: Vec::new(),
            execution_window: WindowOptimizer::with_defaults().optimize(
                &MetricNormalizer::new(Default::default(), 300),
                &[],
                0,
                TradeSide::Buy,
                1.0,
            ),
            low_confidence: true,
        };
        assert!(!result.is_cacheable());
        assert!(AnalysisResult { low_confidence: false, ..result }.is_cacheable());
    }
}
