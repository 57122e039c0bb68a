use std::path::PathBuf;
use tickwise_domain::services::engine::backtest::FillPolicy;

pub(super) fn run_backtest(
    config_path: PathBuf,
    out: Option<PathBuf>,
    ticker: Option<String>,
    strategy: Option<String>,
    fill: Option<FillPolicy>,
) -> Result<(), String> {
    let (mut config, source_toml) = super::common::load(&config_path)?;

    let overridden = ticker.is_some() || strategy.is_some() || fill.is_some();
    if let Some(ticker) = ticker {
        config.run.ticker = ticker;
    }
    if let Some(name) = strategy.as_deref() {
        config.override_strategy(name).map_err(|e| e.to_string())?;
    }
    if let Some(fill) = fill {
        config.override_fill(fill);
    }
    // The snapshot has to describe what actually ran.
    let config_toml = if overridden {
        tickwise_application::config::to_toml_pretty(&config)?
    } else {
        source_toml
    };

    super::common::print_config_summary("backtest", &config, out.as_ref());
    let overall_start = std::time::Instant::now();

    let crate::infra::EngineDeps {
        market_data,
        artifacts,
    } = crate::infra::build_engine_deps(&config);

    let outcome = tickwise_application::backtesting::run_backtest(
        &config,
        &config_toml,
        out,
        &market_data,
        &artifacts,
    )
    .map_err(|e| e.to_string())?;

    crate::output::print_backtest(&outcome);
    let total_ms = overall_start.elapsed().as_millis();
    metrics::histogram!("tickwise.cli.backtest_ms").record(total_ms as f64);
    println!("tickwise cli: backtest total_ms={}", total_ms);
    Ok(())
}
