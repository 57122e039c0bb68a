use crate::config::Config;
use crate::shared::{build_query, load_bars};
use serde::Serialize;
use tickwise_domain::errors::TickwiseError;
use tickwise_domain::repositories::market_data::MarketDataRepository;
use tickwise_domain::services::indicators::{IndicatorSpec, IndicatorValue};
use tickwise_domain::services::ohlcv::validate_bars;
use tracing::info_span;

#[derive(Debug, Clone, Serialize)]
pub struct IndicatorRow {
    pub timestamp: i64,
    pub close: f64,
    /// `None` until the indicator's lookback is filled.
    pub value: Option<IndicatorValue>,
}

/// The named indicator evaluated over the ticker's bars, one row per bar.
pub fn indicator_series(
    config: &Config,
    ticker: &str,
    spec: &IndicatorSpec,
    market_data: &dyn MarketDataRepository,
) -> Result<Vec<IndicatorRow>, TickwiseError> {
    let _span = info_span!("indicator_series", ticker = %ticker, indicator = %spec).entered();

    let query = build_query(config, ticker)?;
    let (bars, _report) = load_bars(market_data, &query)?;
    validate_bars(&query.ticker, &bars)?;
    let rows = spec
        .series(&bars)?
        .map(|(bar, value)| IndicatorRow {
            timestamp: bar.timestamp,
            close: bar.close,
            value,
        })
        .collect();
    Ok(rows)
}
