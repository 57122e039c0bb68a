use super::{BandsValue, MacdValue, StochasticValue};
use crate::errors::TickwiseError;
use serde::Serialize;

/// Indicator readings for one bar. Fields a strategy does not use stay `None`, as do fields
/// still inside their lookback.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IndicatorSnapshot {
    pub timestamp: i64,
    pub close: f64,
    pub volume: f64,
    pub fast_ma: Option<f64>,
    pub slow_ma: Option<f64>,
    pub rsi: Option<f64>,
    pub macd: Option<MacdValue>,
    pub bands: Option<BandsValue>,
    pub stochastic: Option<StochasticValue>,
}

impl IndicatorSnapshot {
    pub fn new(timestamp: i64, close: f64, volume: f64) -> Self {
        Self {
            timestamp,
            close,
            volume,
            ..Self::default()
        }
    }

    /// MA spread `fast - slow`, when both averages are defined.
    pub fn ma_spread(&self) -> Option<f64> {
        Some(self.fast_ma? - self.slow_ma?)
    }

    pub fn ensure_finite(&self) -> Result<(), TickwiseError> {
        let mut checks: Vec<(&str, f64)> = Vec::new();
        if let Some(v) = self.fast_ma {
            checks.push(("fast_ma", v));
        }
        if let Some(v) = self.slow_ma {
            checks.push(("slow_ma", v));
        }
        if let Some(v) = self.rsi {
            checks.push(("rsi", v));
        }
        if let Some(v) = self.macd {
            checks.extend([("macd", v.macd), ("macd_signal", v.signal)]);
        }
        if let Some(v) = self.bands {
            checks.extend([("bb_upper", v.upper), ("bb_middle", v.middle), ("bb_lower", v.lower)]);
        }
        if let Some(v) = self.stochastic {
            checks.extend([("stoch_k", v.k), ("stoch_d", v.d)]);
        }
        match checks.into_iter().find(|(_, value)| !value.is_finite()) {
            Some((indicator, value)) => Err(TickwiseError::IndicatorComputation {
                indicator: indicator.to_string(),
                timestamp: self.timestamp,
                reason: format!("non-finite value {}", value),
            }),
            None => Ok(()),
        }
    }
}
