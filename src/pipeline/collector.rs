//! Data Collector contract and the collectors shipped with the crate
//!
//! - `DataCollector`: async `fetch_window(mint, window_seconds)` boundary
//! - `RetryingCollector`: exponential backoff around any collector, DataUnavailable when exhausted
//! - `JsonlSnapshotCollector`: replays `{"kind":"transaction"|"curve",...}` lines from a file

use crate::analysis_core::{CurveState, Transaction, WindowData};
use crate::pipeline::error::IntelligenceError;
use async_trait::async_trait;
use rand::Rng;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::sleep;

#[async_trait]
pub trait DataCollector: Send + Sync {
    /// Transactions (timestamp order) and curve snapshots for the trailing window
    ///
    /// May return an empty transaction sequence.
    async fn fetch_window(
        &self,
        token_mint: &str,
        window_seconds: u64,
    ) -> Result<WindowData, IntelligenceError>;
}

#[async_trait]
impl<C: DataCollector + ?Sized> DataCollector for std::sync::Arc<C> {
    async fn fetch_window(
        &self,
        token_mint: &str,
        window_seconds: u64,
    ) -> Result<WindowData, IntelligenceError> {
        (**self).fetch_window(token_mint, window_seconds).await
    }
}

#[derive(Debug)]
pub struct ExponentialBackoff {
    initial_delay_ms: u64,
    max_delay_ms: u64,
    max_retries: u32,
    current_attempt: u32,
}

#[derive(Debug)]
pub struct MaxRetriesExceeded;

impl std::fmt::Display for MaxRetriesExceeded {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Maximum retry attempts exceeded")
    }
}

impl std::error::Error for MaxRetriesExceeded {}

impl ExponentialBackoff {
    pub fn new(initial_ms: u64, max_ms: u64, retries: u32) -> Self {
        Self {
            initial_delay_ms: initial_ms,
            max_delay_ms: max_ms,
            max_retries: retries,
            current_attempt: 0,
        }
    }

    /// Delay before the next retry, before jitter
    pub fn next_delay_ms(&self) -> u64 {
        let factor = 2_u64.saturating_pow(self.current_attempt);
        std::cmp::min(self.initial_delay_ms.saturating_mul(factor), self.max_delay_ms)
    }

    pub async fn sleep(&mut self) -> Result<(), MaxRetriesExceeded> {
        if self.current_attempt >= self.max_retries {
            return Err(MaxRetriesExceeded);
        }

        let delay = self.next_delay_ms();
        let jitter = if delay >= 4 {
            rand::thread_rng().gen_range(0..=delay / 4)
        } else {
            0
        };

        log::warn!(
            "⏳ Retry attempt {} of {} in {}ms",
            self.current_attempt + 1,
            self.max_retries,
            delay + jitter
        );

        sleep(Duration::from_millis(delay + jitter)).await;
        self.current_attempt += 1;
        Ok(())
    }

    pub fn reset(&mut self) {
        self.current_attempt = 0;
    }
}

/// Retries `DataUnavailable` from the inner collector; other errors pass through
pub struct RetryingCollector<C> {
    inner: C,
    max_attempts: u32,
    initial_delay_ms: u64,
    max_delay_ms: u64,
}

impl<C: DataCollector> RetryingCollector<C> {
    pub fn new(inner: C, max_attempts: u32, initial_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            inner,
            max_attempts: max_attempts.max(1),
            initial_delay_ms,
            max_delay_ms,
        }
    }

    /// 3 attempts, 250ms doubling up to 2s
    pub fn with_defaults(inner: C) -> Self {
        Self::new(inner, 3, 250, 2_000)
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }
}

#[async_trait]
impl<C: DataCollector> DataCollector for RetryingCollector<C> {
    async fn fetch_window(
        &self,
        token_mint: &str,
        window_seconds: u64,
    ) -> Result<WindowData, IntelligenceError> {
        let mut backoff =
            ExponentialBackoff::new(self.initial_delay_ms, self.max_delay_ms, self.max_attempts - 1);

        loop {
            match self.inner.fetch_window(token_mint, window_seconds).await {
                Ok(data) => return Ok(data),
                Err(IntelligenceError::DataUnavailable(reason)) => {
                    log::warn!("⚠️  Fetch failed for {}: {}", token_mint, reason);
                    if backoff.sleep().await.is_err() {
                        log::error!(
                            "❌ Giving up on {} after {} attempts",
                            token_mint,
                            self.max_attempts
                        );
                        return Err(IntelligenceError::DataUnavailable(format!(
                            "{} (after {} attempts)",
                            reason, self.max_attempts
                        )));
                    }
                }
                Err(other) => return Err(other),
            }
        }
    }
}

/// Reads a JSONL snapshot file on every fetch
///
/// Line format:
/// ```text
/// {"kind":"curve","mint":"...","timestamp":1700000000,"current_price":2.8e-8,"supply":1.0e15,"liquidity_pool":30.0,"market_cap":28.0}
/// {"kind":"transaction","mint":"...","wallet":"...","amount":0.4,"timestamp":1700000010,"price_impact":0.01,"side":"buy","price":2.9e-8}
/// ```
///
/// The window ends at the latest curve snapshot for the mint. The earliest snapshot
/// inside the window becomes the baseline for slope.
pub struct JsonlSnapshotCollector {
    path: PathBuf,
}

impl JsonlSnapshotCollector {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn parse(content: &str, token_mint: &str) -> (Vec<Transaction>, Vec<CurveState>) {
        let mut transactions = Vec::new();
        let mut curves = Vec::new();

        for (line_no, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let value: serde_json::Value = match serde_json::from_str(line) {
                Ok(v) => v,
                Err(e) => {
                    log::warn!("⚠️  Skipping malformed line {}: {}", line_no + 1, e);
                    continue;
                }
            };

            if value.get("mint").and_then(|m| m.as_str()) != Some(token_mint) {
                continue;
            }

            let kind = value.get("kind").and_then(|k| k.as_str()).unwrap_or_default().to_string();
            match kind.as_str() {
                "transaction" => match serde_json::from_value::<Transaction>(value) {
                    Ok(tx) => transactions.push(tx),
                    Err(e) => log::warn!("⚠️  Skipping bad transaction on line {}: {}", line_no + 1, e),
                },
                "curve" => match serde_json::from_value::<CurveState>(value) {
                    Ok(curve) => curves.push(curve),
                    Err(e) => log::warn!("⚠️  Skipping bad curve on line {}: {}", line_no + 1, e),
                },
                other => log::debug!("Ignoring record kind '{}' on line {}", other, line_no + 1),
            }
        }

        (transactions, curves)
    }
}

#[async_trait]
impl DataCollector for JsonlSnapshotCollector {
    async fn fetch_window(
        &self,
        token_mint: &str,
        window_seconds: u64,
    ) -> Result<WindowData, IntelligenceError> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            IntelligenceError::DataUnavailable(format!("{}: {}", self.path.display(), e))
        })?;

        let (transactions, mut curves) = Self::parse(&content, token_mint);
        curves.sort_by_key(|c| c.timestamp);

        let latest = curves.last().copied().ok_or_else(|| {
            IntelligenceError::DataUnavailable(format!("no curve snapshot for {}", token_mint))
        })?;

        let window_start = latest.timestamp.saturating_sub_unsigned(window_seconds);
        let baseline = curves
            .iter()
            .find(|c| c.timestamp >= window_start && c.timestamp < latest.timestamp)
            .copied();

        let in_window: Vec<Transaction> = transactions
            .into_iter()
            .filter(|t| t.timestamp >= window_start && t.timestamp <= latest.timestamp)
            .collect();

        let mut data = WindowData::new(in_window, latest);
        if let Some(baseline) = baseline {
            data = data.with_baseline(baseline);
        }
        data.sort_transactions();

        log::debug!(
            "📥 Loaded {} transactions for {} from {}",
            data.transactions.len(),
            token_mint,
            self.path.display()
        );

        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tempfile::NamedTempFile;

    const MINT: &str = "7GCihgDB8fe6KNjn2MYtkzZcRjQy3t9GHdC8uHYmW2hr";

    struct FlakyCollector {
        calls: AtomicU32,
        failures_before_success: u32,
        error: IntelligenceError,
    }

    impl FlakyCollector {
        fn new(failures_before_success: u32, error: IntelligenceError) -> Self {
            Self {
                calls: AtomicU32::new(0),
                failures_before_success,
                error,
            }
        }
    }

    #[async_trait]
    impl DataCollector for FlakyCollector {
        async fn fetch_window(&self, _: &str, _: u64) -> Result<WindowData, IntelligenceError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures_before_success {
                Err(self.error.clone())
            } else {
                Ok(WindowData::default())
            }
        }
    }

    fn unavailable() -> IntelligenceError {
        IntelligenceError::DataUnavailable("rpc timeout".to_string())
    }

    #[test]
    fn test_backoff_delays() {
        let mut backoff = ExponentialBackoff::new(250, 1_000, 5);
        assert_eq!(backoff.next_delay_ms(), 250);
        backoff.current_attempt = 1;
        assert_eq!(backoff.next_delay_ms(), 500);
        backoff.current_attempt = 3;
        assert_eq!(backoff.next_delay_ms(), 1_000);
        backoff.reset();
        assert_eq!(backoff.next_delay_ms(), 250);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_recovers() {
        let collector = RetryingCollector::with_defaults(FlakyCollector::new(2, unavailable()));
        assert!(collector.fetch_window(MINT, 300).await.is_ok());
        assert_eq!(collector.inner().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_exhausts_after_three_attempts() {
        let collector = RetryingCollector::with_defaults(FlakyCollector::new(10, unavailable()));
        let err = collector.fetch_window(MINT, 300).await.unwrap_err();

        assert!(err.is_data_unavailable());
        assert!(err.to_string().contains("after 3 attempts"));
        assert_eq!(collector.inner().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_transient_errors_not_retried() {
        let collector = RetryingCollector::with_defaults(FlakyCollector::new(
            10,
            IntelligenceError::InvalidToken("bad".to_string()),
        ));
        let err = collector.fetch_window(MINT, 300).await.unwrap_err();

        assert_eq!(err, IntelligenceError::InvalidToken("bad".to_string()));
        assert_eq!(collector.inner().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_jsonl_window_and_baseline() {
        let mut file = NamedTempFile::new().unwrap();
        let lines = [
            format!(r#"{{"kind":"curve","mint":"{}","timestamp":500,"current_price":1.0,"supply":10.0,"liquidity_pool":5.0,"market_cap":10.0}}"#, MINT),
            format!(r#"{{"kind":"curve","mint":"{}","timestamp":800,"current_price":1.5,"supply":20.0,"liquidity_pool":6.0,"market_cap":30.0}}"#, MINT),
            format!(r#"{{"kind":"curve","mint":"{}","timestamp":1000,"current_price":2.0,"supply":30.0,"liquidity_pool":7.0,"market_cap":60.0}}"#, MINT),
            format!(r#"{{"kind":"transaction","mint":"{}","wallet":"w1","amount":0.4,"timestamp":950,"price_impact":0.01,"side":"buy"}}"#, MINT),
            format!(r#"{{"kind":"transaction","mint":"{}","wallet":"w0","amount":0.2,"timestamp":900,"price_impact":0.02,"side":"sell","price":1.8}}"#, MINT),
            format!(r#"{{"kind":"transaction","mint":"{}","wallet":"old","amount":0.2,"timestamp":100,"price_impact":0.0,"side":"buy"}}"#, MINT),
            r#"{"kind":"transaction","mint":"other","wallet":"x","amount":1.0,"timestamp":990,"price_impact":0.0,"side":"buy"}"#.to_string(),
            "not json".to_string(),
        ];
        for line in &lines {
            writeln!(file, "{}", line).unwrap();
        }

        let collector = JsonlSnapshotCollector::new(file.path());
        let data = collector.fetch_window(MINT, 300).await.unwrap();

        assert_eq!(data.curve.timestamp, 1000);
        assert_eq!(data.baseline.map(|b| b.timestamp), Some(800));
        let wallets: Vec<&str> = data.transactions.iter().map(|t| t.wallet.as_str()).collect();
        assert_eq!(wallets, vec!["w0", "w1"]);
        assert_eq!(data.transactions[0].price, Some(1.8));
    }

    #[tokio::test]
    async fn test_jsonl_missing_curve_is_unavailable() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"kind":"transaction","mint":"{}","wallet":"w1","amount":0.4,"timestamp":950,"price_impact":0.01,"side":"buy"}}"#,
            MINT
        )
        .unwrap();

        let collector = JsonlSnapshotCollector::new(file.path());
        let err = collector.fetch_window(MINT, 300).await.unwrap_err();
        assert!(err.is_data_unavailable());
    }

    #[tokio::test]
    async fn test_jsonl_missing_file_is_unavailable() {
        let collector = JsonlSnapshotCollector::new("/nonexistent/snapshot.jsonl");
        let err = collector.fetch_window(MINT, 300).await.unwrap_err();
        assert!(err.is_data_unavailable());
    }
}
