mod advisor;
mod alpha_vantage;
mod cache;
mod chart;
mod error;
mod market;
mod monitor;
mod pool;
mod preferences;
mod price_client;
mod quote;
mod series;
mod symbol_store;

pub mod indicators;

pub use advisor::{Advisor, DEFAULT_GROQ_MODEL, build_prompt};
pub use alpha_vantage::AlphaVantageClient;
pub use cache::{CacheKey, DEFAULT_TTL, DataKind, FreshnessCache};
pub use chart::{CHART_BARS, ChartRenderer, render_candlestick};
pub use error::{Result, StockError};
pub use market::{BarSource, DEFAULT_PRIMARY_TIMEOUT, MarketData, SnapshotSource};
pub use monitor::{AlertSink, DEFAULT_THRESHOLD_PERCENT, PriceAlert, PriceMonitor, TickReport};
pub use pool::{DEFAULT_POOL_SIZE, WorkerPool};
pub use preferences::{NOTIFICATIONS_ENABLED, PREFERRED_TIMEFRAME, PreferenceStore};
pub use price_client::PriceClient;
pub use quote::{Quote, QuoteFields, QuoteOrigin};
pub use series::{Bar, HistoricalSeries, Period};
pub use symbol_store::{SymbolStore, TrackedStocksDocument, read_document};
