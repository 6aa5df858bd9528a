use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::{
    cache::{CacheKey, DEFAULT_TTL, FreshnessCache},
    error::{Result, StockError},
    quote::Quote,
    series::{Bar, HistoricalSeries, Period},
};

pub const DEFAULT_PRIMARY_TIMEOUT: Duration = Duration::from_secs(15);

/// Provider of daily bar history.
#[async_trait]
pub trait BarSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn daily_bars(&self, symbol: &str, period: Period) -> Result<Vec<Bar>>;
}

/// Provider of single quote snapshots.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn snapshot(&self, symbol: &str) -> Result<Quote>;
}

/// Quotes and daily series behind a freshness cache.
///
/// Quotes come from the primary bar source with a snapshot fallback; series
/// come from the primary only. Callers only ever see
/// [`StockError::NoDataAvailable`] or [`StockError::ProviderTimeout`].
pub struct MarketData {
    primary: Arc<dyn BarSource>,
    fallback: Option<Arc<dyn SnapshotSource>>,
    quotes: FreshnessCache<CacheKey, Quote>,
    series: FreshnessCache<CacheKey, Arc<HistoricalSeries>>,
    ttl: Duration,
    primary_timeout: Duration,
}

impl MarketData {
    pub fn new(primary: Arc<dyn BarSource>, fallback: Option<Arc<dyn SnapshotSource>>) -> Self {
        Self {
            primary,
            fallback,
            quotes: FreshnessCache::new(),
            series: FreshnessCache::new(),
            ttl: DEFAULT_TTL,
            primary_timeout: DEFAULT_PRIMARY_TIMEOUT,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_primary_timeout(mut self, timeout: Duration) -> Self {
        self.primary_timeout = timeout;
        self
    }

    pub async fn get_quote(&self, symbol: &str) -> Result<Quote> {
        let symbol = normalize(symbol);
        self.quotes
            .get_or_fetch(CacheKey::quote(&symbol), self.ttl, || {
                self.fetch_quote(&symbol)
            })
            .await
    }

    pub async fn get_series(&self, symbol: &str, period: Period) -> Result<Arc<HistoricalSeries>> {
        let symbol = normalize(symbol);
        self.series
            .get_or_fetch(CacheKey::series(&symbol, period), self.ttl, || {
                self.fetch_series(&symbol, period)
            })
            .await
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<Quote> {
        match self.primary_bars(symbol, Period::Day5).await {
            Ok(bars) => match quote_from_bars(symbol, &bars) {
                Some(quote) => return Ok(quote),
                None => debug!(
                    symbol,
                    provider = self.primary.name(),
                    bars = bars.len(),
                    "primary data unusable"
                ),
            },
            Err(e) => warn!(symbol, provider = self.primary.name(), error = %e, "primary quote failed"),
        }

        let Some(fallback) = &self.fallback else {
            return Err(StockError::no_data(symbol));
        };

        match fallback.snapshot(symbol).await {
            Ok(quote) => Ok(quote),
            Err(e) => {
                warn!(symbol, provider = fallback.name(), error = %e, "fallback quote failed");
                Err(StockError::no_data(symbol))
            }
        }
    }

    async fn fetch_series(&self, symbol: &str, period: Period) -> Result<Arc<HistoricalSeries>> {
        let bars = self.primary_bars(symbol, period).await.map_err(|e| {
            warn!(symbol, period = period.as_str(), error = %e, "series fetch failed");
            match e {
                StockError::ProviderTimeout { .. } => e,
                _ => StockError::no_data(symbol),
            }
        })?;

        let series = HistoricalSeries::new(symbol, bars);
        if series.is_empty() {
            return Err(StockError::no_data(symbol));
        }

        Ok(Arc::new(series))
    }

    async fn primary_bars(&self, symbol: &str, period: Period) -> Result<Vec<Bar>> {
        tokio::time::timeout(self.primary_timeout, self.primary.daily_bars(symbol, period))
            .await
            .map_err(|_| StockError::ProviderTimeout {
                provider: self.primary.name(),
                timeout: self.primary_timeout,
            })?
    }
}

fn normalize(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

/// Latest bar is current, the one before it is previous. `None` when there
/// are no bars or the previous close cannot anchor a percentage.
fn quote_from_bars(symbol: &str, bars: &[Bar]) -> Option<Quote> {
    let series = HistoricalSeries::new(symbol, bars.to_vec());
    let bars = series.bars();
    let latest = bars.last()?;
    let previous = bars.len().checked_sub(2).map(|i| &bars[i]);

    let previous_close = previous.map_or(latest.close, |b| b.close);
    if !previous_close.is_finite() || previous_close <= 0.0 || !latest.close.is_finite() {
        return None;
    }

    Some(Quote::from_bars(symbol, latest, previous))
}
