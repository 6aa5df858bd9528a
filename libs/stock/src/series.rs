use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Deserialize;

//
// Field names match the Alpaca bars payload
// https://docs.alpaca.markets/reference/stockbars
//
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Bar {
    #[serde(rename = "t")]
    pub timestamp: DateTime<Utc>,

    #[serde(rename = "o")]
    pub open: f64,

    #[serde(rename = "h")]
    pub high: f64,

    #[serde(rename = "l")]
    pub low: f64,

    #[serde(rename = "c")]
    pub close: f64,

    #[serde(rename = "v")]
    pub volume: u64,
}

impl Bar {
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }
}

/// Lookback window for daily history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Period {
    Day5,
    Month1,
    Month3,
    Month6,
    Year1,
}

impl Period {
    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Day5 => "5d",
            Period::Month1 => "1mo",
            Period::Month3 => "3mo",
            Period::Month6 => "6mo",
            Period::Year1 => "1y",
        }
    }

    /// Calendar span requested upstream. Weekends and holidays mean fewer
    /// bars than days.
    pub fn duration(&self) -> Duration {
        match self {
            Period::Day5 => Duration::days(7),
            Period::Month1 => Duration::days(31),
            Period::Month3 => Duration::days(92),
            Period::Month6 => Duration::days(183),
            Period::Year1 => Duration::days(366),
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "5d" => Some(Period::Day5),
            "1mo" => Some(Period::Month1),
            "3mo" => Some(Period::Month3),
            "6mo" => Some(Period::Month6),
            "1y" => Some(Period::Year1),
            _ => None,
        }
    }
}

/// Daily OHLCV bars for one symbol, ascending by date with no duplicate dates.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoricalSeries {
    symbol: String,
    bars: Vec<Bar>,
}

impl HistoricalSeries {
    /// Sorts by date and keeps the last bar seen for any repeated date.
    pub fn new(symbol: &str, mut bars: Vec<Bar>) -> Self {
        bars.sort_by_key(|b| b.timestamp);

        let mut deduped: Vec<Bar> = Vec::with_capacity(bars.len());
        for bar in bars {
            match deduped.last_mut() {
                Some(last) if last.date() == bar.date() => *last = bar,
                _ => deduped.push(bar),
            }
        }

        Self {
            symbol: symbol.trim().to_uppercase(),
            bars: deduped,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    /// The most recent `n` bars as a new series.
    pub fn tail(&self, n: usize) -> HistoricalSeries {
        let start = self.bars.len().saturating_sub(n);
        Self {
            symbol: self.symbol.clone(),
            bars: self.bars[start..].to_vec(),
        }
    }
}
