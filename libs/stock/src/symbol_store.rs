use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::error::{Result, StockError};

const PENDING_DELETE_TTL: Duration = Duration::from_secs(300);

/// On-disk shape of `tracked_stocks.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackedStocksDocument {
    #[serde(default)]
    pub stocks: Vec<String>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Local>>,
    #[serde(default)]
    pub count: usize,
}

struct PendingDelete {
    symbols: Vec<String>,
    created_at: Instant,
}

/// Tracked symbols, held in memory and mirrored to a JSON file on every
/// change.
///
/// A failed write is reported to the caller but the in-memory list keeps the
/// change; the file catches up on the next successful write.
pub struct SymbolStore {
    path: PathBuf,
    symbols: Mutex<Vec<String>>,
    pending: std::sync::Mutex<HashMap<String, PendingDelete>>,
}

impl SymbolStore {
    /// Loads the list from `path`, creating an empty document when the file
    /// does not exist yet. An unreadable file starts an empty list.
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();

        let symbols = match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<TrackedStocksDocument>(&bytes) {
                Ok(doc) => dedup(doc.stocks),
                Err(e) => {
                    error!(path = %path.display(), error = %e, "tracked stocks file is not valid JSON");
                    Vec::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if let Err(e) = write_document(&path, &[]).await {
                    warn!(error = %e, "could not create tracked stocks file");
                }
                Vec::new()
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "could not read tracked stocks file");
                Vec::new()
            }
        };

        info!(path = %path.display(), count = symbols.len(), "loaded tracked stocks");

        Self {
            path,
            symbols: Mutex::new(symbols),
            pending: std::sync::Mutex::new(HashMap::new()),
        }
    }

    pub fn normalize(symbol: &str) -> String {
        symbol.trim().to_uppercase()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Add a stock symbol
    /// Returns true if it was newly added
    pub async fn add(&self, symbol: &str) -> Result<bool> {
        let symbol = Self::normalize(symbol);
        let mut symbols = self.symbols.lock().await;
        if symbols.contains(&symbol) {
            return Ok(false);
        }

        symbols.push(symbol);
        write_document(&self.path, &symbols).await?;
        Ok(true)
    }

    /// Remove a stock symbol
    /// Returns true if it existed
    pub async fn remove(&self, symbol: &str) -> Result<bool> {
        let symbol = Self::normalize(symbol);
        let mut symbols = self.symbols.lock().await;
        let Some(pos) = symbols.iter().position(|s| *s == symbol) else {
            return Ok(false);
        };

        symbols.remove(pos);
        write_document(&self.path, &symbols).await?;
        Ok(true)
    }

    pub async fn contains(&self, symbol: &str) -> bool {
        self.symbols.lock().await.contains(&Self::normalize(symbol))
    }

    /// All symbols in insertion order
    pub async fn list(&self) -> Vec<String> {
        self.symbols.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.symbols.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Remember symbols picked for deletion until the user confirms.
    /// Expires after five minutes.
    pub fn set_pending_delete(&self, id: String, symbols: Vec<String>) -> usize {
        let symbols: Vec<String> = dedup(symbols.iter().map(|s| Self::normalize(s)).collect());
        let count = symbols.len();

        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.retain(|_, p| p.created_at.elapsed() < PENDING_DELETE_TTL);
        pending.insert(
            id,
            PendingDelete {
                symbols,
                created_at: Instant::now(),
            },
        );
        count
    }

    /// Take a pending delete; `None` when unknown or expired.
    pub fn take_pending_delete(&self, id: &str) -> Option<Vec<String>> {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending
            .remove(id)
            .filter(|p| p.created_at.elapsed() < PENDING_DELETE_TTL && !p.symbols.is_empty())
            .map(|p| p.symbols)
    }
}

fn dedup(symbols: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(symbols.len());
    for s in symbols {
        let s = SymbolStore::normalize(&s);
        if !s.is_empty() && !out.contains(&s) {
            out.push(s);
        }
    }
    out
}

async fn write_document(path: &Path, symbols: &[String]) -> Result<()> {
    let doc = TrackedStocksDocument {
        stocks: symbols.to_vec(),
        last_updated: Some(Local::now()),
        count: symbols.len(),
    };

    let fail = |source: std::io::Error| StockError::PersistenceWriteFailure {
        path: path.to_path_buf(),
        source,
    };

    let body = serde_json::to_vec_pretty(&doc).map_err(|e| fail(e.into()))?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(fail)?;
    }
    tokio::fs::write(path, body).await.map_err(|e| {
        error!(path = %path.display(), error = %e, "saving tracked stocks failed");
        fail(e)
    })?;

    info!(count = symbols.len(), "saved tracked stocks");
    Ok(())
}

/// Reads the tracked stocks document as stored, for status reporting.
pub async fn read_document(path: &Path) -> std::io::Result<Option<TrackedStocksDocument>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(std::io::Error::other),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store(dir: &tempfile::TempDir) -> SymbolStore {
        SymbolStore::open(dir.path().join("data").join("tracked_stocks.json")).await
    }

    #[tokio::test]
    async fn open_creates_empty_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await;

        assert!(store.is_empty().await);
        let doc = read_document(store.path()).await.unwrap().unwrap();
        assert_eq!(doc.stocks, Vec::<String>::new());
        assert_eq!(doc.count, 0);
        assert!(doc.last_updated.is_some());
    }

    #[tokio::test]
    async fn add_then_remove_restores_previous_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await;
        store.add("msft").await.unwrap();
        let before = read_document(store.path()).await.unwrap().unwrap().stocks;

        assert!(store.add("aapl").await.unwrap());
        assert_eq!(store.list().await, vec!["MSFT", "AAPL"]);
        assert!(store.remove("AAPL").await.unwrap());

        assert_eq!(store.list().await, before);
        let doc = read_document(store.path()).await.unwrap().unwrap();
        assert_eq!(doc.stocks, before);
        assert_eq!(doc.count, 1);
    }

    #[tokio::test]
    async fn duplicates_and_missing_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await;

        assert!(store.add("TSLA").await.unwrap());
        assert!(!store.add(" tsla ").await.unwrap());
        assert!(!store.remove("NVDA").await.unwrap());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn reopen_reads_persisted_list() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = store(&dir).await;
            store.add("A").await.unwrap();
            store.add("B").await.unwrap();
        }
        let store = store(&dir).await;
        assert_eq!(store.list().await, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn failed_write_keeps_memory_state() {
        let dir = tempfile::tempdir().unwrap();
        // a directory where the file should be makes every write fail
        let path = dir.path().join("tracked_stocks.json");
        std::fs::create_dir(&path).unwrap();
        let store = SymbolStore::open(&path).await;

        let err = store.add("AMD").await.unwrap_err();
        assert!(matches!(err, StockError::PersistenceWriteFailure { .. }));
        assert!(store.contains("AMD").await);
    }

    #[tokio::test]
    async fn pending_delete_is_taken_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await;

        assert_eq!(
            store.set_pending_delete("42-1".into(), vec!["aapl".into(), "AAPL".into(), "msft".into()]),
            2
        );
        assert_eq!(
            store.take_pending_delete("42-1"),
            Some(vec!["AAPL".to_string(), "MSFT".to_string()])
        );
        assert_eq!(store.take_pending_delete("42-1"), None);
        assert_eq!(store.take_pending_delete("nope"), None);
    }
}
