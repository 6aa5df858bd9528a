use std::path::{Path, PathBuf};

use chrono::Local;
use serde_json::{Map, Value, json};
use tokio::sync::RwLock;
use tracing::{error, info};

use crate::error::{Result, StockError};

pub const NOTIFICATIONS_ENABLED: &str = "notifications_enabled";
pub const PREFERRED_TIMEFRAME: &str = "preferred_timeframe";

fn defaults() -> Map<String, Value> {
    let mut prefs = Map::new();
    prefs.insert("alert_threshold".into(), json!(2.0));
    prefs.insert("chart_style".into(), json!("dark"));
    prefs.insert(PREFERRED_TIMEFRAME.into(), json!("1mo"));
    prefs.insert(NOTIFICATIONS_ENABLED.into(), json!(true));
    prefs
}

/// Free-form user preferences persisted to `user_preferences.json`.
pub struct PreferenceStore {
    path: PathBuf,
    prefs: RwLock<Map<String, Value>>,
}

impl PreferenceStore {
    /// Loads preferences, writing the defaults when the file is missing.
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();

        let prefs = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<Map<String, Value>>(&bytes).unwrap_or_else(|e| {
                error!(path = %path.display(), error = %e, "preferences file is not a JSON object");
                Map::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let mut prefs = defaults();
                if let Err(e) = write_preferences(&path, &mut prefs).await {
                    error!(error = %e, "could not create preferences file");
                }
                prefs
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "could not read preferences file");
                Map::new()
            }
        };

        Self {
            path,
            prefs: RwLock::new(prefs),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        self.prefs.read().await.get(key).cloned()
    }

    pub async fn get_bool(&self, key: &str, default: bool) -> bool {
        self.get(key)
            .await
            .and_then(|v| v.as_bool())
            .unwrap_or(default)
    }

    pub async fn get_str(&self, key: &str) -> Option<String> {
        self.get(key).await.and_then(|v| v.as_str().map(str::to_owned))
    }

    /// Sets one key and saves. On a failed write the new value stays in
    /// memory.
    pub async fn set(&self, key: &str, value: Value) -> Result<()> {
        let mut prefs = self.prefs.write().await;
        prefs.insert(key.to_string(), value);
        write_preferences(&self.path, &mut prefs).await
    }

    pub async fn notifications_enabled(&self) -> bool {
        self.get_bool(NOTIFICATIONS_ENABLED, true).await
    }
}

async fn write_preferences(path: &Path, prefs: &mut Map<String, Value>) -> Result<()> {
    prefs.insert("last_updated".into(), json!(Local::now().to_rfc3339()));

    let fail = |source: std::io::Error| StockError::PersistenceWriteFailure {
        path: path.to_path_buf(),
        source,
    };

    let body = serde_json::to_vec_pretty(prefs).map_err(|e| fail(e.into()))?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(fail)?;
    }
    tokio::fs::write(path, body).await.map_err(fail)?;

    info!("saved user preferences");
    Ok(())
}
