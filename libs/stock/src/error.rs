use std::{path::PathBuf, time::Duration};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StockError {
    /// Every source failed or returned nothing usable for the symbol.
    #[error("no data available for {symbol}")]
    NoDataAvailable { symbol: String },

    #[error("{provider} did not answer within {timeout:?}")]
    ProviderTimeout {
        provider: &'static str,
        timeout: Duration,
    },

    /// Raw failure of a single upstream provider. Never crosses the
    /// `MarketData` boundary.
    #[error("{provider}: {message}")]
    Upstream {
        provider: &'static str,
        message: String,
    },

    #[error("failed to write {}: {source}", path.display())]
    PersistenceWriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("advisor request failed: {0}")]
    Advisor(String),

    #[error("worker task failed: {0}")]
    Worker(String),
}

impl StockError {
    pub fn no_data(symbol: impl Into<String>) -> Self {
        Self::NoDataAvailable {
            symbol: symbol.into(),
        }
    }

    pub fn upstream(provider: &'static str, message: impl ToString) -> Self {
        Self::Upstream {
            provider,
            message: message.to_string(),
        }
    }

    /// Timeouts and missing data read the same to callers.
    pub fn is_no_data(&self) -> bool {
        matches!(
            self,
            Self::NoDataAvailable { .. } | Self::ProviderTimeout { .. }
        )
    }
}

pub type Result<T, E = StockError> = std::result::Result<T, E>;
