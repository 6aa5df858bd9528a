use std::sync::Arc;

use stock::{
    Advisor, AlphaVantageClient, BarSource, ChartRenderer, MarketData, PreferenceStore,
    PriceClient, PriceMonitor, SnapshotSource, SymbolStore, WorkerPool,
};

use crate::config::Config;

pub mod alerts;
pub mod command;
pub mod config;
pub mod web;

#[derive(Clone)]
pub struct Data {
    pub symbol_store: Arc<SymbolStore>,
    pub preferences: Arc<PreferenceStore>,
    pub market: Arc<MarketData>,
    pub monitor: Arc<PriceMonitor>,
    pub advisor: Arc<Advisor>,
    pub charts: Arc<ChartRenderer>,
}

impl Data {
    pub async fn from_config(config: &Config) -> Result<Self, Error> {
        let primary: Arc<dyn BarSource> = Arc::new(PriceClient::new(
            config.alpaca_base_api.clone(),
            &config.alpaca_key_id,
            &config.alpaca_secret,
        )?);
        let fallback: Arc<dyn SnapshotSource> =
            Arc::new(AlphaVantageClient::new(config.alpha_vantage_key.clone())?);

        let market = MarketData::new(primary, Some(fallback))
            .with_ttl(config.cache_ttl)
            .with_primary_timeout(config.primary_timeout);

        let advisor = Advisor::new(
            config.groq_api_key.clone(),
            config.groq_model.clone(),
            config.max_response_tokens,
        )?;

        let pool = WorkerPool::new(config.worker_pool_size);

        Ok(Self {
            symbol_store: Arc::new(SymbolStore::open(config.tracked_stocks_file()).await),
            preferences: Arc::new(PreferenceStore::open(config.user_preferences_file()).await),
            market: Arc::new(market),
            monitor: Arc::new(PriceMonitor::new(config.alert_threshold)),
            advisor: Arc::new(advisor),
            charts: Arc::new(ChartRenderer::new(config.charts_dir.clone(), pool)),
        })
    }
}

pub type Error = anyhow::Error;
pub type Context<'a> = poise::Context<'a, Data, Error>;
