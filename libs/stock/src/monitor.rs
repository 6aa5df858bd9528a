use std::{collections::HashMap, sync::Mutex};

use async_trait::async_trait;
use futures::{StreamExt, stream};
use tracing::{debug, info, instrument, warn};
use tracing_futures::Instrument;

use crate::{market::MarketData, quote::Quote};

pub const DEFAULT_THRESHOLD_PERCENT: f64 = 2.0;
const CONCURRENCY: usize = 8;

/// A move at or beyond the threshold since the last observation.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceAlert {
    pub symbol: String,
    pub quote: Quote,
    pub pct_change: f64,
}

/// Delivers alerts somewhere a human will see them.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn deliver(&self, alert: &PriceAlert) -> anyhow::Result<()>;
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub evaluated: usize,
    pub alerts: usize,
    pub failures: usize,
}

/// Compares each tick's quote with the previously observed price.
///
/// Baselines live only in memory: after a restart the first observation of a
/// symbol seeds its baseline and cannot alert.
pub struct PriceMonitor {
    threshold: f64,
    baselines: Mutex<HashMap<String, f64>>,
}

impl PriceMonitor {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold: threshold.abs(),
            baselines: Mutex::new(HashMap::new()),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn baseline(&self, symbol: &str) -> Option<f64> {
        self.lock().get(&symbol.to_uppercase()).copied()
    }

    /// Drops the baseline of a symbol that is no longer tracked.
    pub fn forget(&self, symbol: &str) {
        self.lock().remove(&symbol.to_uppercase());
    }

    /// Records `price` as the new baseline and returns the percentage change
    /// from the old one when it reaches the threshold.
    pub fn observe(&self, symbol: &str, price: f64) -> Option<f64> {
        let mut baselines = self.lock();
        let previous = baselines
            .insert(symbol.to_uppercase(), price)
            .unwrap_or(price);

        if previous == 0.0 {
            return None;
        }

        let pct_change = (price - previous) / previous * 100.0;
        (pct_change.abs() >= self.threshold).then_some(pct_change)
    }

    /// One pass over `symbols`. Each symbol is fetched and judged on its own;
    /// a failed fetch or delivery is logged and the tick carries on.
    #[instrument(name = "monitor_tick", skip_all, fields(symbols = symbols.len()))]
    pub async fn tick(
        &self,
        market: &MarketData,
        symbols: &[String],
        sink: &dyn AlertSink,
    ) -> TickReport {
        let mut report = TickReport::default();
        if symbols.is_empty() {
            debug!("no tracked symbols");
            return report;
        }

        let mut quotes = stream::iter(symbols.iter().cloned())
            .map(|symbol| {
                let span = tracing::info_span!("monitor_symbol", symbol = %symbol);
                async move {
                    let res = market.get_quote(&symbol).await;
                    (symbol, res)
                }
                .instrument(span)
            })
            .buffer_unordered(CONCURRENCY);

        while let Some((symbol, res)) = quotes.next().await {
            let quote = match res {
                Ok(q) => q,
                Err(e) => {
                    report.failures += 1;
                    warn!(symbol = %symbol, error = %e, "quote unavailable");
                    continue;
                }
            };

            report.evaluated += 1;
            let Some(pct_change) = self.observe(&symbol, quote.current_price()) else {
                continue;
            };

            report.alerts += 1;
            let alert = PriceAlert {
                symbol: symbol.to_uppercase(),
                quote,
                pct_change,
            };
            info!(symbol = %alert.symbol, pct_change, price = alert.quote.current_price(), "price alert");

            if let Err(e) = sink.deliver(&alert).await {
                warn!(symbol = %alert.symbol, error = ?e, "alert delivery failed");
            }
        }

        info!(
            evaluated = report.evaluated,
            alerts = report.alerts,
            failures = report.failures,
            "monitor tick complete"
        );
        report
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, f64>> {
        self.baselines.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for PriceMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD_PERCENT)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::market::fakes::{FakeBars, FakeSnapshots};
    use crate::series::fixtures::bars_from_closes;

    #[derive(Default)]
    struct Collect(Mutex<Vec<PriceAlert>>);

    #[async_trait]
    impl AlertSink for Collect {
        async fn deliver(&self, alert: &PriceAlert) -> anyhow::Result<()> {
            self.0.lock().unwrap().push(alert.clone());
            Ok(())
        }
    }

    struct Broken;

    #[async_trait]
    impl AlertSink for Broken {
        async fn deliver(&self, _alert: &PriceAlert) -> anyhow::Result<()> {
            anyhow::bail!("channel gone")
        }
    }

    #[test]
    fn first_observation_never_alerts() {
        let monitor = PriceMonitor::default();
        assert_eq!(monitor.observe("AAPL", 100.0), None);
        assert_eq!(monitor.baseline("aapl"), Some(100.0));
    }

    #[test]
    fn three_percent_fires_and_moves_baseline() {
        let monitor = PriceMonitor::default();
        monitor.observe("AAPL", 100.0);

        let pct = monitor.observe("AAPL", 103.0).unwrap();
        assert!((pct - 3.0).abs() < 1e-9);
        assert_eq!(monitor.baseline("AAPL"), Some(103.0));
    }

    #[test]
    fn one_percent_is_quiet_but_moves_baseline() {
        let monitor = PriceMonitor::default();
        monitor.observe("AAPL", 100.0);

        assert_eq!(monitor.observe("AAPL", 101.0), None);
        assert_eq!(monitor.baseline("AAPL"), Some(101.0));
    }

    #[test]
    fn drops_alert_too() {
        let monitor = PriceMonitor::default();
        monitor.observe("X", 50.0);
        let pct = monitor.observe("X", 48.0).unwrap();
        assert!((pct + 4.0).abs() < 1e-9);
    }

    #[test]
    fn threshold_is_inclusive() {
        let monitor = PriceMonitor::new(2.0);
        monitor.observe("X", 100.0);
        assert!(monitor.observe("X", 102.0).is_some());
    }

    #[test]
    fn zero_baseline_cannot_alert() {
        let monitor = PriceMonitor::default();
        monitor.observe("X", 0.0);
        assert_eq!(monitor.observe("X", 5.0), None);
        assert_eq!(monitor.baseline("X"), Some(5.0));
    }

    #[test]
    fn forget_resets_baseline() {
        let monitor = PriceMonitor::default();
        monitor.observe("X", 10.0);
        monitor.forget("x");
        assert_eq!(monitor.baseline("X"), None);
        assert_eq!(monitor.observe("X", 20.0), None);
    }

    #[tokio::test]
    async fn failing_symbol_does_not_block_others() {
        // A has no data anywhere, B comes from the primary
        let market = MarketData::new(
            Arc::new(FakeBars::with("B", bars_from_closes(&[99.0, 103.0]))),
            Some(Arc::new(FakeSnapshots::default())),
        );
        let monitor = PriceMonitor::default();
        monitor.observe("B", 100.0);
        let sink = Collect::default();

        let report = monitor
            .tick(&market, &["A".to_string(), "B".to_string()], &sink)
            .await;

        assert_eq!(report, TickReport { evaluated: 1, alerts: 1, failures: 1 });
        assert_eq!(monitor.baseline("B"), Some(103.0));
        assert_eq!(monitor.baseline("A"), None);

        let alerts = sink.0.lock().unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].symbol, "B");
        assert!((alerts[0].pct_change - 3.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn empty_tick_is_noop() {
        let market = MarketData::new(Arc::new(FakeBars::default()), None);
        let report = PriceMonitor::default()
            .tick(&market, &[], &Collect::default())
            .await;
        assert_eq!(report, TickReport::default());
    }

    #[tokio::test]
    async fn delivery_failure_still_updates_baseline() {
        let market = MarketData::new(
            Arc::new(FakeBars::with("C", bars_from_closes(&[10.0, 20.0]))),
            None,
        );
        let monitor = PriceMonitor::default();
        monitor.observe("C", 10.0);

        let report = monitor.tick(&market, &["C".to_string()], &Broken).await;

        assert_eq!(report.alerts, 1);
        assert_eq!(monitor.baseline("C"), Some(20.0));
    }
}
