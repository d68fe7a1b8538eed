//! Value objects shared by the normalizer, detectors and optimizer

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeSide {
    #[serde(rename = "buy")]
    Buy,
    #[serde(rename = "sell")]
    Sell,
}

impl TradeSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeSide::Buy => "buy",
            TradeSide::Sell => "sell",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "buy" => Some(TradeSide::Buy),
            "sell" => Some(TradeSide::Sell),
            _ => None,
        }
    }
}

/// One trade against the bonding curve, as delivered by the data collector
///
/// Never mutated after creation. Amounts are in the native unit (SOL).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub wallet: String,
    pub amount: f64,
    pub timestamp: i64,
    pub price_impact: f64,
    pub side: TradeSide,
    /// Execution price, when the collector could decode it
    #[serde(default)]
    pub price: Option<f64>,
}

impl Transaction {
    pub fn new(
        wallet: impl Into<String>,
        amount: f64,
        timestamp: i64,
        price_impact: f64,
        side: TradeSide,
    ) -> Self {
        Self {
            wallet: wallet.into(),
            amount,
            timestamp,
            price_impact,
            side,
            price: None,
        }
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    pub fn is_buy(&self) -> bool {
        matches!(self.side, TradeSide::Buy)
    }

    pub fn is_sell(&self) -> bool {
        matches!(self.side, TradeSide::Sell)
    }

    /// Reject records no analysis can be defined over (negative or non-finite numbers)
    pub fn validate(&self) -> Result<(), String> {
        if !self.amount.is_finite() || self.amount < 0.0 {
            return Err(format!(
                "transaction from {} has invalid amount {}",
                self.wallet, self.amount
            ));
        }
        if !self.price_impact.is_finite() || self.price_impact < 0.0 {
            return Err(format!(
                "transaction from {} has invalid price_impact {}",
                self.wallet, self.price_impact
            ));
        }
        if let Some(price) = self.price {
            if !price.is_finite() || price < 0.0 {
                return Err(format!(
                    "transaction from {} has invalid price {}",
                    self.wallet, price
                ));
            }
        }
        Ok(())
    }
}

/// Bonding-curve snapshot valid at a single timestamp
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CurveState {
    pub timestamp: i64,
    pub current_price: f64,
    pub supply: f64,
    pub liquidity_pool: f64,
    pub market_cap: f64,
}

impl CurveState {
    pub fn validate(&self) -> Result<(), String> {
        let fields = [
            ("current_price", self.current_price),
            ("supply", self.supply),
            ("liquidity_pool", self.liquidity_pool),
            ("market_cap", self.market_cap),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(format!("curve state has invalid {} {}", name, value));
            }
        }
        Ok(())
    }
}

/// Transactions and curve snapshots for one token over the active window
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WindowData {
    /// Ordered by timestamp; ties keep collector order
    pub transactions: Vec<Transaction>,
    /// Latest snapshot
    pub curve: CurveState,
    /// Earliest snapshot available inside the window, used for the slope
    pub baseline: Option<CurveState>,
}

impl WindowData {
    pub fn new(transactions: Vec<Transaction>, curve: CurveState) -> Self {
        Self {
            transactions,
            curve,
            baseline: None,
        }
    }

    pub fn with_baseline(mut self, baseline: CurveState) -> Self {
        self.baseline = Some(baseline);
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        self.curve.validate()?;
        if let Some(ref baseline) = self.baseline {
            baseline.validate()?;
        }
        for tx in &self.transactions {
            tx.validate()?;
        }
        Ok(())
    }

    /// Stable sort by timestamp; equal timestamps keep insertion order
    pub fn sort_transactions(&mut self) {
        self.transactions.sort_by_key(|t| t.timestamp);
    }
}
