use crate::config::Config;
use crate::shared::{build_query, load_bars};
use std::time::Instant;
use tickwise_domain::entities::ledger::normalize_ticker;
use tickwise_domain::errors::TickwiseError;
use tickwise_domain::repositories::market_data::MarketDataRepository;
use tickwise_domain::services::ohlcv::DataQualityReport;
use tracing::{info_span, warn};

/// Data-quality report for the run ticker, the benchmark and the watchlist. In strict mode
/// the first ticker with duplicates, ordering faults or invalid prices fails the call.
pub fn validate(
    config: &Config,
    strict: bool,
    market_data: &dyn MarketDataRepository,
) -> Result<serde_json::Value, TickwiseError> {
    let _span = info_span!(
        "validate",
        strict = strict,
        run_id = %config.run.run_id,
        ticker = %config.run.ticker
    )
    .entered();

    let mut reports = Vec::new();
    for ticker in tickers_to_check(config) {
        let stage_start = Instant::now();
        let query = build_query(config, &ticker)?;
        let (_bars, report) = load_bars(market_data, &query)?;
        metrics::histogram!("tickwise.validate.load_ohlcv_ms")
            .record(stage_start.elapsed().as_millis() as f64);

        if report.has_integrity_issues() {
            warn!(ticker = %ticker, duplicates = report.duplicates, out_of_order = report.out_of_order,
                invalid_prices = report.invalid_prices, "data integrity issues");
            if strict {
                return Err(integrity_error(&ticker, &report));
            }
        }
        reports.push(serde_json::json!({
            "ticker": ticker,
            "ok": !report.has_integrity_issues(),
            "report": report,
        }));
    }

    Ok(serde_json::json!({
        "strict": strict,
        "max_gap_seconds": crate::shared::max_gap_seconds(config),
        "tickers": reports,
    }))
}

fn tickers_to_check(config: &Config) -> Vec<String> {
    let mut tickers: Vec<String> = Vec::new();
    let candidates = std::iter::once(config.run.ticker.clone())
        .chain(config.benchmark_ticker().map(str::to_string))
        .chain(config.watchlist());
    for ticker in candidates {
        let ticker = normalize_ticker(&ticker);
        if !ticker.is_empty() && !tickers.contains(&ticker) {
            tickers.push(ticker);
        }
    }
    tickers
}

fn integrity_error(ticker: &str, report: &DataQualityReport) -> TickwiseError {
    let (timestamp, reason) = if let Some(ts) = report.first_duplicate {
        (ts, "duplicate timestamp")
    } else if let Some(ts) = report.first_out_of_order {
        (ts, "timestamp out of order")
    } else if let Some(ts) = report.first_invalid_price {
        (ts, "invalid price")
    } else {
        (report.first_timestamp.unwrap_or(0), "integrity issue")
    };
    TickwiseError::data_integrity(
        ticker,
        timestamp,
        format!(
            "{reason} (duplicates={}, out_of_order={}, invalid_prices={})",
            report.duplicates, report.out_of_order, report.invalid_prices
        ),
    )
}
