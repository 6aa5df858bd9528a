use std::{path::PathBuf, sync::Arc};

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::{DateTime, Local};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::config::Config;

const SERVICE_NAME: &str = "Discord Stock Bot";

/// What the status routes need to know about the bot's files.
#[derive(Clone, Debug)]
pub struct WebState {
    pub version: String,
    pub data_dir: PathBuf,
    pub charts_dir: PathBuf,
    pub tracked_stocks_file: PathBuf,
    pub user_preferences_file: PathBuf,
}

impl WebState {
    pub fn from_config(config: &Config) -> Self {
        Self {
            version: config.version.clone(),
            data_dir: config.data_dir.clone(),
            charts_dir: config.charts_dir.clone(),
            tracked_stocks_file: config.tracked_stocks_file(),
            user_preferences_file: config.user_preferences_file(),
        }
    }
}

struct WebError(anyhow::Error);

impl<E: Into<anyhow::Error>> From<E> for WebError {
    fn from(e: E) -> Self {
        Self(e.into())
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        error!(error = ?self.0, "status request failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": self.0.to_string(), "timestamp": now() })),
        )
            .into_response()
    }
}

type WebResult = Result<Json<Value>, WebError>;

pub fn router(state: WebState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/ping", get(ping))
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/api/tracked-stocks", get(tracked_stocks))
        .fallback(not_found)
        .with_state(Arc::new(state))
}

pub async fn serve(host: &str, port: u16, state: WebState) -> anyhow::Result<()> {
    let listener = TcpListener::bind((host, port)).await?;
    info!(addr = %listener.local_addr()?, "status server listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

fn now() -> String {
    Local::now().to_rfc3339()
}

async fn home(State(state): State<Arc<WebState>>) -> Json<Value> {
    Json(json!({
        "status": "online",
        "service": SERVICE_NAME,
        "timestamp": now(),
        "version": state.version,
    }))
}

async fn ping() -> Json<Value> {
    Json(json!({ "status": "ok", "timestamp": now(), "uptime": true }))
}

async fn health(State(state): State<Arc<WebState>>) -> Json<Value> {
    let exists = |p: &PathBuf| p.exists();

    Json(json!({
        "status": "healthy",
        "timestamp": now(),
        "data_directory": exists(&state.data_dir),
        "charts_directory": exists(&state.charts_dir),
        "config_loaded": true,
        "tracked_stocks_file": exists(&state.tracked_stocks_file),
        "user_preferences_file": exists(&state.user_preferences_file),
    }))
}

async fn stats(State(state): State<Arc<WebState>>) -> WebResult {
    let mut body = json!({ "timestamp": now(), "tracked_stocks": 0, "data_files": [] });

    // an unreadable document only leaves the count at zero
    if let Ok(Some(doc)) = stock::read_document(&state.tracked_stocks_file).await {
        body["tracked_stocks"] = json!(doc.stocks.len());
        body["last_updated"] = json!(doc.last_updated);
    }

    let mut files = Vec::new();
    if state.data_dir.is_dir() {
        let mut dir = tokio::fs::read_dir(&state.data_dir).await?;
        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.ends_with(".json") {
                continue;
            }
            let meta = entry.metadata().await?;
            let modified = meta.modified().ok().map(DateTime::<Local>::from);
            files.push(json!({ "name": name, "size": meta.len(), "modified": modified }));
        }
    }
    body["data_files"] = Value::Array(files);

    Ok(Json(body))
}

async fn tracked_stocks(State(state): State<Arc<WebState>>) -> WebResult {
    match stock::read_document(&state.tracked_stocks_file).await? {
        Some(doc) => Ok(Json(serde_json::to_value(doc)?)),
        None => Ok(Json(json!({ "stocks": [], "count": 0 }))),
    }
}

async fn not_found() -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Not found", "timestamp": now() })),
    )
}

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use stock::SymbolStore;
    use tower::ServiceExt;

    use super::*;

    fn state(dir: &tempfile::TempDir) -> WebState {
        let data_dir = dir.path().join("data");
        WebState {
            version: "v1.2.3".into(),
            charts_dir: dir.path().join("charts"),
            tracked_stocks_file: data_dir.join("tracked_stocks.json"),
            user_preferences_file: data_dir.join("user_preferences.json"),
            data_dir,
        }
    }

    async fn get(state: WebState, uri: &str) -> (StatusCode, Value) {
        let res = router(state)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn ping_and_home() {
        let dir = tempfile::tempdir().unwrap();

        let (status, body) = get(state(&dir), "/ping").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        let (_, body) = get(state(&dir), "/").await;
        assert_eq!(body["status"], "online");
        assert_eq!(body["version"], "v1.2.3");
    }

    #[tokio::test]
    async fn health_reports_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = get(state(&dir), "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data_directory"], false);
        assert_eq!(body["tracked_stocks_file"], false);
    }

    #[tokio::test]
    async fn tracked_stocks_and_stats_read_the_document() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir);

        let (_, empty) = get(state.clone(), "/api/tracked-stocks").await;
        assert_eq!(empty, json!({ "stocks": [], "count": 0 }));

        let store = SymbolStore::open(&state.tracked_stocks_file).await;
        store.add("AAPL").await.unwrap();
        store.add("MSFT").await.unwrap();

        let (_, doc) = get(state.clone(), "/api/tracked-stocks").await;
        assert_eq!(doc["stocks"], json!(["AAPL", "MSFT"]));
        assert_eq!(doc["count"], 2);

        let (status, stats) = get(state, "/stats").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(stats["tracked_stocks"], 2);
        assert!(stats["last_updated"].is_string());
        let files = stats["data_files"].as_array().unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0]["name"], "tracked_stocks.json");
    }

    #[tokio::test]
    async fn unknown_route_is_json_404() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = get(state(&dir), "/nope").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Not found");
    }
}
