//! Live advisory mode: the signal a strategy gives on the most recent bar.

use crate::config::Config;
use crate::shared::{build_query, load_bars};
use tickwise_domain::errors::TickwiseError;
use tickwise_domain::repositories::market_data::MarketDataRepository;
use tickwise_domain::services::ohlcv::validate_bars;
use tickwise_domain::services::strategy::{SignalEngine, Strategy};
use tickwise_domain::value_objects::signal::Signal;
use tracing::{debug, info_span};

/// Replays the configured strategy over the ticker's history and returns the signal of the
/// last bar. Short histories yield HOLD with reason `insufficient data`; only an empty
/// history is an error, as there is no bar to attach a signal to.
pub fn evaluate_signal(
    config: &Config,
    ticker: &str,
    market_data: &dyn MarketDataRepository,
) -> Result<Signal, TickwiseError> {
    let _span = info_span!(
        "evaluate_signal",
        ticker = %ticker,
        strategy = %config.strategy.name()
    )
    .entered();

    let strategy = config.strategy.build()?;
    let query = build_query(config, ticker)?;
    let (bars, _report) = load_bars(market_data, &query)?;
    if bars.is_empty() {
        return Err(TickwiseError::InsufficientData {
            ticker: query.ticker,
            available: 0,
            required: strategy.lookback(),
        });
    }
    validate_bars(&query.ticker, &bars)?;

    let mut engine = SignalEngine::new(strategy);
    let mut last = None;
    for bar in &bars {
        last = Some(engine.on_bar(bar)?);
    }
    metrics::counter!("tickwise.signal.evaluations").increment(1);
    let signal = last.ok_or_else(|| TickwiseError::InsufficientData {
        ticker: query.ticker.clone(),
        available: 0,
        required: engine.strategy().lookback(),
    })?;
    debug!(action = %signal.action, reason = %signal.reason, "signal evaluated");
    Ok(signal)
}

/// One result per ticker, in input order. A failure on one ticker does not stop the rest.
pub fn evaluate_watchlist(
    config: &Config,
    tickers: &[String],
    market_data: &dyn MarketDataRepository,
) -> Vec<(String, Result<Signal, TickwiseError>)> {
    tickers
        .iter()
        .map(|ticker| (ticker.clone(), evaluate_signal(config, ticker, market_data)))
        .collect()
}
