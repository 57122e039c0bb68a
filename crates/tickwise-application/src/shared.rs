use crate::config::Config;
use tickwise_domain::entities::ledger::normalize_ticker;
use tickwise_domain::entities::metrics::MetricsConfig;
use tickwise_domain::errors::TickwiseError;
use tickwise_domain::repositories::market_data::{MarketDataRepository, OhlcvQuery};
use tickwise_domain::services::audit::AuditEvent;
use tickwise_domain::services::engine::backtest::BacktestConfig;
use tickwise_domain::services::ohlcv::DataQualityReport;
use tickwise_domain::value_objects::bar::Bar;
use tickwise_domain::value_objects::equity_point::EquityPoint;
use tickwise_domain::value_objects::timestamp::parse_timestamp;

const SECONDS_PER_DAY: i64 = 86_400;
const DEFAULT_MAX_GAP_DAYS: u32 = 5;

/// Inclusive `[start, end]` bounds of the run, epoch seconds.
pub fn resolve_date_range(config: &Config) -> Result<(Option<i64>, Option<i64>), TickwiseError> {
    let parse = |field: &str, raw: Option<&str>| -> Result<Option<i64>, TickwiseError> {
        raw.map(|value| {
            parse_timestamp(value)
                .map_err(|err| TickwiseError::Config(format!("run.{field}: {err}")))
        })
        .transpose()
    };
    let start = parse("start", config.run.start.as_deref())?;
    let end = parse("end", config.run.end.as_deref())?;
    if let (Some(s), Some(e)) = (start, end) {
        if s > e {
            return Err(TickwiseError::Config(format!(
                "run.start ({s}) is after run.end ({e})"
            )));
        }
    }
    Ok((start, end))
}

pub fn max_gap_seconds(config: &Config) -> i64 {
    let days = config
        .data_quality
        .as_ref()
        .and_then(|dq| dq.max_gap_days)
        .unwrap_or(DEFAULT_MAX_GAP_DAYS);
    i64::from(days.max(1)) * SECONDS_PER_DAY
}

pub fn build_query(config: &Config, ticker: &str) -> Result<OhlcvQuery, TickwiseError> {
    let (start, end) = resolve_date_range(config)?;
    Ok(OhlcvQuery {
        ticker: normalize_ticker(ticker),
        start,
        end,
        max_gap_seconds: Some(max_gap_seconds(config)),
    })
}

/// Loads bars through the market-data port. Port failures are terminal for the call.
pub fn load_bars(
    market_data: &dyn MarketDataRepository,
    query: &OhlcvQuery,
) -> Result<(Vec<Bar>, DataQualityReport), TickwiseError> {
    market_data
        .load_ohlcv(query)
        .map_err(|reason| TickwiseError::ProviderUnavailable {
            ticker: query.ticker.clone(),
            reason,
        })
}

pub fn build_metrics_config(config: &Config) -> MetricsConfig {
    let defaults = MetricsConfig::default();
    let metrics = config.metrics.as_ref();
    MetricsConfig {
        risk_free_rate: metrics
            .and_then(|m| m.risk_free_rate)
            .unwrap_or(defaults.risk_free_rate),
        annualization_factor: metrics
            .and_then(|m| m.annualization_factor)
            .unwrap_or(defaults.annualization_factor),
    }
}

pub fn resolve_backtest_config(config: &Config) -> Result<BacktestConfig, TickwiseError> {
    let fee_bps = config.costs.fee_bps;
    if !fee_bps.is_finite() || fee_bps < 0.0 {
        return Err(TickwiseError::Config(
            "costs.fee_bps must be finite and >= 0".to_string(),
        ));
    }
    let initial_capital = config.run.initial_capital;
    if !initial_capital.is_finite() || initial_capital <= 0.0 {
        return Err(TickwiseError::Config(
            "run.initial_capital must be finite and > 0".to_string(),
        ));
    }
    let metrics = build_metrics_config(config);
    if !metrics.annualization_factor.is_finite() || metrics.annualization_factor <= 0.0 {
        return Err(TickwiseError::Config(
            "metrics.annualization_factor must be finite and > 0".to_string(),
        ));
    }
    let execution = config.execution.as_ref();
    Ok(BacktestConfig {
        initial_capital,
        fee_bps,
        fill_policy: execution.and_then(|e| e.fill).unwrap_or_default(),
        liquidate_at_end: execution.and_then(|e| e.liquidate_at_end).unwrap_or(false),
        metrics,
    })
}

pub fn summary_meta_json_from_equity(
    config: &Config,
    strategy: &str,
    equity: &[EquityPoint],
) -> Option<serde_json::Value> {
    let start = equity.first()?.timestamp;
    let end = equity.last()?.timestamp;
    Some(serde_json::json!({
        "run_id": config.run.run_id,
        "ticker": config.run.ticker,
        "strategy": strategy,
        "start": start,
        "end": end,
    }))
}

pub fn config_snapshot_json(config: &Config, backtest: &BacktestConfig) -> serde_json::Value {
    serde_json::json!({
        "costs": {
            "fee_bps": backtest.fee_bps,
        },
        "execution": {
            "fill": backtest.fill_policy.as_str(),
            "liquidate_at_end": backtest.liquidate_at_end,
        },
        "strategy": config.strategy,
        "metrics": {
            "risk_free_rate": backtest.metrics.risk_free_rate,
            "annualization_factor": backtest.metrics.annualization_factor,
        },
        "benchmark": config.benchmark_ticker(),
        "range": {
            "start": config.run.start,
            "end": config.run.end,
        },
    })
}

pub fn timing_event(
    run_id: &str,
    ticker: &str,
    action: &str,
    duration_ms: u64,
    details: serde_json::Value,
) -> AuditEvent {
    AuditEvent::new(run_id, 0, "timing", ticker, action).with_details(serde_json::json!({
        "duration_ms": duration_ms,
        "details": details,
    }))
}
