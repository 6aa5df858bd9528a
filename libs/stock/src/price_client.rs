use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue},
};
use serde::Deserialize;

use crate::{
    error::{Result, StockError},
    market::BarSource,
    series::{Bar, Period},
};

const PROVIDER: &str = "alpaca";
const BAR_LIMIT: usize = 1000;
const DAILY_TIMEFRAME: &str = "1Day";

/// Primary market-data provider: Alpaca daily bars.
#[derive(Clone)]
pub struct PriceClient {
    client: Client,
    base_api: String,
}

impl PriceClient {
    pub fn new(base_api: String, key_id: &str, secret: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "APCA-API-KEY-ID",
            HeaderValue::from_str(key_id).map_err(|e| StockError::upstream(PROVIDER, e))?,
        );
        headers.insert(
            "APCA-API-SECRET-KEY",
            HeaderValue::from_str(secret).map_err(|e| StockError::upstream(PROVIDER, e))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(StdDuration::from_secs(5))
            .build()
            .map_err(|e| StockError::upstream(PROVIDER, e))?;

        Ok(Self { client, base_api })
    }
}

#[async_trait]
impl BarSource for PriceClient {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn daily_bars(&self, symbol: &str, period: Period) -> Result<Vec<Bar>> {
        let url = format!(
            "{}/v2/stocks/{}/bars",
            self.base_api.trim_end_matches('/'),
            symbol
        );

        let res: BarsResponse = self
            .client
            .get(url)
            .query(&bars_query(period, Utc::now()))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| StockError::upstream(PROVIDER, e))?
            .json()
            .await
            .map_err(|e| StockError::upstream(PROVIDER, e))?;

        Ok(res.bars.unwrap_or_default())
    }
}

/// Query for one page of raw daily bars ending at `end`.
fn bars_query(period: Period, end: DateTime<Utc>) -> Vec<(&'static str, String)> {
    let start = end - period.duration();
    vec![
        ("feed", "iex".to_string()),
        ("adjustment", "raw".to_string()),
        ("timeframe", DAILY_TIMEFRAME.to_string()),
        ("start", start.to_rfc3339()),
        ("end", end.to_rfc3339()),
        ("limit", BAR_LIMIT.to_string()),
    ]
}

/// `bars` is `null` when the symbol has no data in the window.
#[derive(Debug, Deserialize, Clone)]
struct BarsResponse {
    bars: Option<Vec<Bar>>,
}
