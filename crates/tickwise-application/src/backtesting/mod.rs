use crate::config::Config;
use crate::shared::{
    build_query, config_snapshot_json, load_bars, resolve_backtest_config,
    summary_meta_json_from_equity, timing_event,
};
use std::path::PathBuf;
use std::time::Instant;
use tickwise_domain::entities::ledger::normalize_ticker;
use tickwise_domain::entities::metrics::MetricsSummary;
use tickwise_domain::errors::TickwiseError;
use tickwise_domain::repositories::artifacts::ArtifactWriter;
use tickwise_domain::repositories::market_data::{MarketDataRepository, OhlcvQuery};
use tickwise_domain::services::audit::{sort_events, AuditEvent};
use tickwise_domain::services::engine::backtest::{
    BacktestConfig, BacktestResults, BacktestRunner, OpenPosition, PositionState,
};
use tickwise_domain::services::engine::benchmark::BenchmarkComparison;
use tickwise_domain::services::market_data_source::VecBarSource;
use tickwise_domain::services::strategy::Strategy;
use tickwise_domain::value_objects::bar::Bar;
use tickwise_domain::value_objects::trade::Trade;
use tracing::{info, info_span, warn};

/// What a caller gets back from one backtest; the full artifacts live under `run_dir`.
#[derive(Debug, Clone)]
pub struct BacktestOutcome {
    pub run_id: String,
    pub ticker: String,
    pub strategy: String,
    pub run_dir: PathBuf,
    pub summary: MetricsSummary,
    pub trades: Vec<Trade>,
    pub benchmark: Option<BenchmarkComparison>,
    pub open_position: Option<OpenPosition>,
    pub final_state: PositionState,
}

pub fn run_backtest(
    config: &Config,
    config_toml: &str,
    out: Option<PathBuf>,
    market_data: &dyn MarketDataRepository,
    artifacts: &dyn ArtifactWriter,
) -> Result<BacktestOutcome, TickwiseError> {
    let _span = info_span!(
        "run_backtest",
        run_id = %config.run.run_id,
        ticker = %config.run.ticker,
        strategy = %config.strategy.name()
    )
    .entered();

    let backtest_config = resolve_backtest_config(config)?;
    let strategy = config.strategy.build()?;
    let strategy_name = strategy.name().to_string();
    let query = build_query(config, &config.run.ticker)?;
    let mut audit_extras: Vec<AuditEvent> = Vec::new();

    let stage_start = Instant::now();
    let (bars, data_report) = load_bars(market_data, &query)?;
    metrics::histogram!("tickwise.backtest.load_ohlcv_ms")
        .record(stage_start.elapsed().as_millis() as f64);
    audit_extras.push(timing_event(
        &config.run.run_id,
        &query.ticker,
        "load_ohlcv",
        stage_start.elapsed().as_millis() as u64,
        serde_json::json!({
            "rows": bars.len(),
            "duplicates": data_report.duplicates,
            "gaps": data_report.gaps,
            "out_of_order": data_report.out_of_order,
            "invalid_prices": data_report.invalid_prices,
        }),
    ));

    let data = VecBarSource::validated(&query.ticker, bars.clone())?;
    let stage_start = Instant::now();
    let mut runner = BacktestRunner::new(
        config.run.run_id.clone(),
        query.ticker.clone(),
        strategy,
        data,
        backtest_config.clone(),
    );
    let results = runner.run()?;
    let engine_ms = stage_start.elapsed().as_millis() as f64;
    metrics::histogram!("tickwise.backtest.engine_ms").record(engine_ms);
    metrics::gauge!("tickwise.backtest.bars_processed").set(results.summary.bars_processed as f64);
    metrics::gauge!("tickwise.backtest.trades").set(results.summary.trades as f64);
    metrics::gauge!("tickwise.backtest.engine_bars_per_sec").set(if engine_ms > 0.0 {
        (results.summary.bars_processed as f64) / (engine_ms / 1000.0)
    } else {
        0.0
    });
    audit_extras.push(timing_event(
        &config.run.run_id,
        &query.ticker,
        "run_engine",
        stage_start.elapsed().as_millis() as u64,
        serde_json::json!({}),
    ));

    let benchmark = resolve_benchmark(
        config,
        &query,
        &bars,
        results.summary.total_return,
        market_data,
        &mut audit_extras,
    );

    info!(
        trades = results.summary.trades,
        total_return = results.summary.total_return,
        final_state = ?results.final_state,
        "backtest finished"
    );

    write_outputs(
        config,
        config_toml,
        out,
        &strategy_name,
        results,
        benchmark,
        &backtest_config,
        artifacts,
        audit_extras,
    )
}

/// Buy-and-hold over the same range, on the configured benchmark ticker or else on the
/// traded ticker itself. A benchmark that cannot be loaded is logged and skipped.
fn resolve_benchmark(
    config: &Config,
    query: &OhlcvQuery,
    own_bars: &[Bar],
    strategy_return: f64,
    market_data: &dyn MarketDataRepository,
    audit_extras: &mut Vec<AuditEvent>,
) -> Option<BenchmarkComparison> {
    let ticker = config
        .benchmark_ticker()
        .map(normalize_ticker)
        .unwrap_or_else(|| query.ticker.clone());
    if ticker == query.ticker {
        return BenchmarkComparison::new(&ticker, own_bars, strategy_return);
    }

    let benchmark_query = OhlcvQuery {
        ticker: ticker.clone(),
        ..query.clone()
    };
    match load_bars(market_data, &benchmark_query) {
        Ok((bars, _report)) => BenchmarkComparison::new(&ticker, &bars, strategy_return),
        Err(err) => {
            warn!(benchmark = %ticker, error = %err, "benchmark unavailable");
            audit_extras.push(
                AuditEvent::new(&config.run.run_id, 0, "benchmark", &ticker, "load")
                    .with_error(err.to_string()),
            );
            None
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn write_outputs(
    config: &Config,
    config_toml: &str,
    out: Option<PathBuf>,
    strategy_name: &str,
    results: BacktestResults,
    benchmark: Option<BenchmarkComparison>,
    backtest_config: &BacktestConfig,
    artifacts: &dyn ArtifactWriter,
    mut audit_extras: Vec<AuditEvent>,
) -> Result<BacktestOutcome, TickwiseError> {
    let base_dir = out.unwrap_or_else(|| PathBuf::from(&config.paths.out_dir));
    let run_dir = base_dir.join(&config.run.run_id);
    artifacts.ensure_dir(&run_dir).map_err(TickwiseError::Storage)?;

    artifacts
        .write_trades_csv(run_dir.join("trades.csv").as_path(), &results.trades)
        .map_err(TickwiseError::Storage)?;
    artifacts
        .write_fills_csv(run_dir.join("fills.csv").as_path(), &results.fills)
        .map_err(TickwiseError::Storage)?;
    artifacts
        .write_equity_csv(run_dir.join("equity.csv").as_path(), &results.equity)
        .map_err(TickwiseError::Storage)?;

    let meta = summary_meta_json_from_equity(config, strategy_name, &results.equity);
    let summary_json = serde_json::json!({
        "summary": results.summary,
        "meta": meta,
        "benchmark": benchmark,
        "open_position": results.open_position,
        "final_state": results.final_state,
        "config_snapshot": config_snapshot_json(config, backtest_config),
    });
    artifacts
        .write_summary_json(run_dir.join("summary.json").as_path(), &summary_json)
        .map_err(TickwiseError::Storage)?;

    let mut audit_events = results.audit_events;
    audit_events.append(&mut audit_extras);
    sort_events(&mut audit_events);
    artifacts
        .write_audit_jsonl(run_dir.join("logs.jsonl").as_path(), &audit_events)
        .map_err(TickwiseError::Storage)?;

    if config
        .report
        .as_ref()
        .and_then(|report| report.html)
        .unwrap_or(false)
    {
        artifacts
            .write_summary_html(
                run_dir.join("summary.html").as_path(),
                &results.summary,
                meta.as_ref(),
            )
            .map_err(TickwiseError::Storage)?;
    }

    artifacts
        .write_config_snapshot_toml(run_dir.join("config_snapshot.toml").as_path(), config_toml)
        .map_err(TickwiseError::Storage)?;

    Ok(BacktestOutcome {
        run_id: config.run.run_id.clone(),
        ticker: normalize_ticker(&config.run.ticker),
        strategy: strategy_name.to_string(),
        run_dir,
        summary: results.summary,
        trades: results.trades,
        benchmark,
        open_position: results.open_position,
        final_state: results.final_state,
    })
}
