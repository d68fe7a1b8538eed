//! Curve Intel - analyze one token from a JSONL snapshot file
//!
//! ## Usage
//!
//! ```bash
//! cargo run --release --bin curve_intel -- <snapshot.jsonl> <mint> [--intent buy|sell] [--amount 1.0]
//! ```
//!
//! Prints the analysis as JSON on stdout. With `--intent` (and optionally `--amount`),
//! also prints the optimal execution window and trade impact for that trade.
//!
//! ## Environment Variables
//!
//! - CURVE_* - analysis settings (see `IntelligenceConfig::from_env`)
//! - CURVE_WALLET_HISTORY_DB - SQLite path for first-seen wallet tracking (default: in-memory)
//! - RUST_LOG - Logging level (optional, default: info)

use curveintel::analysis_core::{TradeSide, WalletHistory};
use curveintel::pipeline::{
    InMemoryWalletHistory, IntelligenceConfig, IntelligenceEngine, JsonlSnapshotCollector,
    RetryingCollector, SqliteWalletHistory,
};
use serde_json::json;
use std::env;
use std::sync::Arc;

#[derive(Debug)]
struct CliArgs {
    snapshot_path: String,
    mint: String,
    intent: Option<TradeSide>,
    amount: f64,
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|idx| args.get(idx + 1))
        .map(|s| s.as_str())
}

fn parse_args() -> Result<CliArgs, Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().skip(1).collect();
    let positional: Vec<&String> = args
        .iter()
        .enumerate()
        .filter(|(i, a)| {
            !a.starts_with("--") && (*i == 0 || !args[*i - 1].starts_with("--"))
        })
        .map(|(_, a)| a)
        .collect();

    if positional.len() < 2 {
        return Err("usage: curve_intel <snapshot.jsonl> <mint> [--intent buy|sell] [--amount N]".into());
    }

    let intent = match flag_value(&args, "--intent") {
        Some(raw) => Some(
            TradeSide::from_str(raw).ok_or_else(|| format!("invalid --intent '{}'", raw))?,
        ),
        None => None,
    };
    let amount = match flag_value(&args, "--amount") {
        Some(raw) => raw.parse::<f64>().map_err(|e| format!("invalid --amount '{}': {}", raw, e))?,
        None => 1.0,
    };

    Ok(CliArgs {
        snapshot_path: positional[0].clone(),
        mint: positional[1].clone(),
        intent,
        amount,
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let args = parse_args()?;
    let config = IntelligenceConfig::from_env();
    config.validate()?;

    log::info!("🚀 Curve Intel");
    log::info!("   ├─ Snapshot: {}", args.snapshot_path);
    log::info!("   ├─ Mint: {}", args.mint);
    log::info!("   └─ Window: {}s", config.window_seconds);

    let history: Arc<dyn WalletHistory> = match config.wallet_history_db.as_deref() {
        Some(path) => {
            log::info!("💾 Wallet history: {}", path);
            Arc::new(SqliteWalletHistory::open(path)?)
        }
        None => Arc::new(InMemoryWalletHistory::new()),
    };

    let collector = RetryingCollector::new(
        JsonlSnapshotCollector::new(&args.snapshot_path),
        config.collector_max_attempts,
        config.retry_initial_delay_ms,
        config.retry_max_delay_ms,
    );

    let engine = IntelligenceEngine::new(config, Arc::new(collector), history)?;

    let analysis = engine.analyze(&args.mint).await?;
    log::info!(
        "✅ Risk {:.3} ({}) → {} mode",
        analysis.risk.risk_score,
        analysis.risk.risk_level.as_str(),
        analysis.risk.privacy_recommendation.as_str()
    );
    if analysis.low_confidence {
        log::warn!("⚠️  Result is low confidence: snapshot data was unavailable");
    }

    let output = match args.intent {
        Some(intent) => {
            let window = engine.optimal_window(&args.mint, intent, args.amount).await?;
            let impact = engine.assess_trade_impact(&args.mint, args.amount, intent).await?;
            json!({
                "analysis": &*analysis,
                "execution_window": window,
                "trade_impact": impact,
            })
        }
        None => json!({ "analysis": &*analysis }),
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
