use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::{
    error::{Result, StockError},
    market::SnapshotSource,
    quote::{Quote, QuoteFields, QuoteOrigin},
};

const PROVIDER: &str = "alpha_vantage";
const DEFAULT_BASE_API: &str = "https://www.alphavantage.co";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Fallback quote provider: Alpha Vantage `GLOBAL_QUOTE` snapshots.
#[derive(Clone)]
pub struct AlphaVantageClient {
    client: Client,
    base_api: String,
    api_key: String,
}

impl AlphaVantageClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_base_api(DEFAULT_BASE_API, api_key)
    }

    pub fn with_base_api(base_api: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| StockError::upstream(PROVIDER, e))?;

        Ok(Self {
            client,
            base_api: base_api.into(),
            api_key: api_key.into(),
        })
    }

    pub async fn global_quote(&self, symbol: &str) -> Result<Quote> {
        let url = format!("{}/query", self.base_api.trim_end_matches('/'));

        let res = self
            .client
            .get(url)
            .query(&[
                ("function", "GLOBAL_QUOTE"),
                ("symbol", symbol),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    StockError::ProviderTimeout {
                        provider: PROVIDER,
                        timeout: REQUEST_TIMEOUT,
                    }
                } else {
                    StockError::upstream(PROVIDER, e)
                }
            })?
            .error_for_status()
            .map_err(|e| StockError::upstream(PROVIDER, e))?;

        let body: GlobalQuoteResponse = res
            .json()
            .await
            .map_err(|e| StockError::upstream(PROVIDER, e))?;

        parse_global_quote(symbol, body)
    }
}

#[async_trait]
impl SnapshotSource for AlphaVantageClient {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn snapshot(&self, symbol: &str) -> Result<Quote> {
        self.global_quote(symbol).await
    }
}

fn parse_global_quote(symbol: &str, body: GlobalQuoteResponse) -> Result<Quote> {
    if let Some(note) = body.note.or(body.information) {
        return Err(StockError::upstream(PROVIDER, note));
    }

    let quote = match body.quote {
        Some(q) if q.price.is_some() => q,
        _ => return Err(StockError::upstream(PROVIDER, "empty Global Quote")),
    };

    let num = |field: &str, v: Option<String>| -> Result<f64> {
        v.as_deref()
            .map(str::trim)
            .and_then(|s| s.parse::<f64>().ok())
            .filter(|x| x.is_finite())
            .ok_or_else(|| StockError::upstream(PROVIDER, format!("bad field {field}")))
    };

    let current_price = num("05. price", quote.price)?;
    let previous_close = num("08. previous close", quote.previous_close)?;
    let open = num("02. open", quote.open)?;
    let high = num("03. high", quote.high)?;
    let low = num("04. low", quote.low)?;
    let volume = quote.volume.and_then(|v| v.trim().parse::<u64>().ok());

    Ok(Quote::new(
        symbol,
        QuoteFields {
            current_price,
            previous_close,
            open,
            high,
            low,
            volume,
        },
        QuoteOrigin::Fallback,
    ))
}

#[derive(Debug, Deserialize)]
struct GlobalQuoteResponse {
    #[serde(rename = "Global Quote", default)]
    quote: Option<GlobalQuote>,

    #[serde(rename = "Note", default)]
    note: Option<String>,

    #[serde(rename = "Information", default)]
    information: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GlobalQuote {
    #[serde(rename = "02. open")]
    open: Option<String>,

    #[serde(rename = "03. high")]
    high: Option<String>,

    #[serde(rename = "04. low")]
    low: Option<String>,

    #[serde(rename = "05. price")]
    price: Option<String>,

    #[serde(rename = "06. volume")]
    volume: Option<String>,

    #[serde(rename = "08. previous close")]
    previous_close: Option<String>,
}
