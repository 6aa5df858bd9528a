use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::series::Bar;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteOrigin {
    Primary,
    Fallback,
}

impl QuoteOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuoteOrigin::Primary => "primary",
            QuoteOrigin::Fallback => "fallback",
        }
    }
}

/// Normalized snapshot of a symbol's price and daily change.
///
/// `change` and `change_percent` are always derived from `current_price` and
/// `previous_close`, so the two can never disagree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quote {
    symbol: String,
    current_price: f64,
    change: f64,
    change_percent: f64,
    open: f64,
    high: f64,
    low: f64,
    volume: Option<u64>,
    previous_close: f64,
    source: QuoteOrigin,
    timestamp: DateTime<Utc>,
}

/// Raw fields a provider hands over; the rest is derived.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteFields {
    pub current_price: f64,
    pub previous_close: f64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub volume: Option<u64>,
}

impl Quote {
    pub fn new(symbol: &str, fields: QuoteFields, source: QuoteOrigin) -> Self {
        let change = fields.current_price - fields.previous_close;
        let change_percent = if fields.previous_close != 0.0 {
            change / fields.previous_close * 100.0
        } else {
            0.0
        };

        Self {
            symbol: symbol.trim().to_uppercase(),
            current_price: fields.current_price,
            change,
            change_percent,
            open: fields.open,
            high: fields.high,
            low: fields.low,
            volume: fields.volume,
            previous_close: fields.previous_close,
            source,
            timestamp: Utc::now(),
        }
    }

    /// Builds a quote from the latest bar, using `previous` for the prior
    /// close. With no previous bar the quote shows zero change.
    pub fn from_bars(symbol: &str, latest: &Bar, previous: Option<&Bar>) -> Self {
        let previous_close = previous.map_or(latest.close, |b| b.close);
        Self::new(
            symbol,
            QuoteFields {
                current_price: latest.close,
                previous_close,
                open: latest.open,
                high: latest.high,
                low: latest.low,
                volume: Some(latest.volume),
            },
            QuoteOrigin::Primary,
        )
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn current_price(&self) -> f64 {
        self.current_price
    }

    pub fn change(&self) -> f64 {
        self.change
    }

    pub fn change_percent(&self) -> f64 {
        self.change_percent
    }

    pub fn open(&self) -> f64 {
        self.open
    }

    pub fn high(&self) -> f64 {
        self.high
    }

    pub fn low(&self) -> f64 {
        self.low
    }

    pub fn volume(&self) -> Option<u64> {
        self.volume
    }

    pub fn previous_close(&self) -> f64 {
        self.previous_close
    }

    pub fn source(&self) -> QuoteOrigin {
        self.source
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(current: f64, previous: f64) -> QuoteFields {
        QuoteFields {
            current_price: current,
            previous_close: previous,
            open: previous,
            high: current.max(previous),
            low: current.min(previous),
            volume: None,
        }
    }

    #[test]
    fn change_is_derived_from_previous_close() {
        for (current, previous) in [(103.0, 100.0), (97.25, 101.5), (0.5, 0.45), (250.0, 250.0)] {
            let q = Quote::new("aapl", fields(current, previous), QuoteOrigin::Fallback);
            let expected = (current - previous) / previous * 100.0;

            assert!((q.change() - (current - previous)).abs() < 1e-9);
            assert!((q.change_percent() - expected).abs() <= 1e-6 * expected.abs().max(1.0));
        }
    }

    #[test]
    fn zero_previous_close_gives_zero_percent() {
        let q = Quote::new("x", fields(12.0, 0.0), QuoteOrigin::Fallback);
        assert_eq!(q.change_percent(), 0.0);
        assert_eq!(q.change(), 12.0);
    }

    #[test]
    fn symbol_is_normalized() {
        let q = Quote::new(" msft ", fields(1.0, 1.0), QuoteOrigin::Primary);
        assert_eq!(q.symbol(), "MSFT");
    }
}
