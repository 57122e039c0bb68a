use crate::value_objects::bar::Bar;
use serde::Serialize;

/// Return of buying at the first close and holding to the last close, before costs.
pub fn buy_and_hold_return(bars: &[Bar]) -> Option<f64> {
    let first = bars.first()?;
    let last = bars.last()?;
    if !(first.close.is_finite() && first.close > 0.0) {
        return None;
    }
    Some(last.close / first.close - 1.0)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkComparison {
    pub ticker: String,
    pub benchmark_return: f64,
    pub strategy_return: f64,
    pub excess_return: f64,
}

impl BenchmarkComparison {
    pub fn new(ticker: &str, bars: &[Bar], strategy_return: f64) -> Option<Self> {
        let benchmark_return = buy_and_hold_return(bars)?;
        Some(Self {
            ticker: ticker.to_string(),
            benchmark_return,
            strategy_return,
            excess_return: strategy_return - benchmark_return,
        })
    }
}
