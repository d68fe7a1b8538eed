//! Wallet history stores backing first-seen classification
//!
//! Two implementations of [`WalletHistory`]:
//! - `InMemoryWalletHistory` for tests and short-lived processes
//! - `SqliteWalletHistory` persisted in a `seen_wallets` table (WAL mode)

use crate::analysis_core::WalletHistory;
use crate::pipeline::error::IntelligenceError;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
pub struct InMemoryWalletHistory {
    seen: Mutex<HashSet<String>>,
}

impl InMemoryWalletHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        self.seen.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl WalletHistory for InMemoryWalletHistory {
    fn has_seen(&self, wallet: &str) -> bool {
        self.lock().contains(wallet)
    }

    fn record(&self, wallet: &str) {
        self.lock().insert(wallet.to_string());
    }
}

pub struct SqliteWalletHistory {
    conn: Mutex<Connection>,
}

impl SqliteWalletHistory {
    /// Open (or create) the store at `db_path`
    pub fn open(db_path: &str) -> Result<Self, IntelligenceError> {
        let conn = Connection::open(db_path)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        log::info!("📊 Wallet history {} (journal_mode={})", db_path, mode);
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self, IntelligenceError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, IntelligenceError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS seen_wallets (
                wallet          TEXT PRIMARY KEY,
                first_seen_at   INTEGER NOT NULL
            );
            "#,
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Number of wallets recorded so far
    pub fn count(&self) -> Result<usize, IntelligenceError> {
        let conn = self.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM seen_wallets", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// First-seen timestamp for a wallet, if recorded
    pub fn first_seen_at(&self, wallet: &str) -> Result<Option<i64>, IntelligenceError> {
        let conn = self.lock();
        let first_seen = conn
            .query_row(
                "SELECT first_seen_at FROM seen_wallets WHERE wallet = ?1",
                params![wallet],
                |row| row.get(0),
            )
            .optional()?;
        Ok(first_seen)
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl WalletHistory for SqliteWalletHistory {
    fn has_seen(&self, wallet: &str) -> bool {
        let conn = self.lock();
        let result = conn
            .prepare_cached("SELECT 1 FROM seen_wallets WHERE wallet = ?1")
            .and_then(|mut stmt| stmt.exists(params![wallet]));

        match result {
            Ok(seen) => seen,
            Err(e) => {
                log::warn!("⚠️  Wallet history lookup failed for {}: {}", wallet, e);
                false
            }
        }
    }

    fn record(&self, wallet: &str) {
        let now = chrono::Utc::now().timestamp();
        let conn = self.lock();
        if let Err(e) = conn.execute(
            "INSERT OR IGNORE INTO seen_wallets (wallet, first_seen_at) VALUES (?1, ?2)",
            params![wallet, now],
        ) {
            log::warn!("⚠️  Failed to record wallet {}: {}", wallet, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_in_memory_history() {
        let history = InMemoryWalletHistory::new();
        assert!(history.is_empty());
        assert!(!history.has_seen("wallet_a"));

        history.record("wallet_a");
        history.record("wallet_a");

        assert!(history.has_seen("wallet_a"));
        assert!(!history.has_seen("wallet_b"));
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_sqlite_history_records_once() {
        let history = SqliteWalletHistory::in_memory().unwrap();
        assert!(!history.has_seen("wallet_a"));

        history.record("wallet_a");
        let first = history.first_seen_at("wallet_a").unwrap();
        history.record("wallet_a");

        assert!(history.has_seen("wallet_a"));
        assert_eq!(history.count().unwrap(), 1);
        assert_eq!(history.first_seen_at("wallet_a").unwrap(), first);
        assert_eq!(history.first_seen_at("wallet_b").unwrap(), None);
    }

    #[test]
    fn test_sqlite_history_persists_across_reopen() {
        let temp_file = NamedTempFile::new().unwrap();
        let db_path = temp_file.path().to_str().unwrap();

        {
            let history = SqliteWalletHistory::open(db_path).unwrap();
            history.record("persisted_wallet");
        }

        let reopened = SqliteWalletHistory::open(db_path).unwrap();
        assert!(reopened.has_seen("persisted_wallet"));
        assert_eq!(reopened.count().unwrap(), 1);
    }
}
