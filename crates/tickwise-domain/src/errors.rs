use thiserror::Error;

/// Error kinds surfaced by the domain core.
///
/// Every variant carries enough context (ticker, timestamp, parameters) to reproduce the
/// failing call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TickwiseError {
    #[error("data integrity error for {ticker} at {timestamp}: {reason}")]
    DataIntegrity {
        ticker: String,
        timestamp: i64,
        reason: String,
    },

    #[error("insufficient data for {ticker}: {available} bars available, {required} required")]
    InsufficientData {
        ticker: String,
        available: usize,
        required: usize,
    },

    #[error("insufficient shares for {ticker}: requested {requested}, held {held}")]
    InsufficientShares {
        ticker: String,
        requested: f64,
        held: f64,
    },

    #[error("indicator computation failed for {indicator} at {timestamp}: {reason}")]
    IndicatorComputation {
        indicator: String,
        timestamp: i64,
        reason: String,
    },

    #[error("market data provider unavailable for {ticker}: {reason}")]
    ProviderUnavailable { ticker: String, reason: String },

    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("unknown strategy: {0}")]
    UnknownStrategy(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl TickwiseError {
    pub fn data_integrity(ticker: &str, timestamp: i64, reason: impl Into<String>) -> Self {
        TickwiseError::DataIntegrity {
            ticker: ticker.to_string(),
            timestamp,
            reason: reason.into(),
        }
    }

    /// Insufficient data is a policy outcome, not a failure of the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, TickwiseError::InsufficientData { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::TickwiseError;

    #[test]
    fn messages_carry_reproduction_context() {
        let err = TickwiseError::InsufficientShares {
            ticker: "AAPL".to_string(),
            requested: 15.0,
            held: 10.0,
        };
        let msg = err.to_string();
        assert!(msg.contains("AAPL"));
        assert!(msg.contains("15"));
        assert!(msg.contains("10"));

        let err = TickwiseError::data_integrity("SPY", 1_700_000_000, "timestamp not increasing");
        assert!(err.to_string().contains("1700000000"));
        assert!(!err.is_recoverable());
    }
}
