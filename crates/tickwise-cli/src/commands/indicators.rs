use std::path::PathBuf;
use tickwise_domain::services::indicators::IndicatorSpec;

pub(super) fn run_indicators(
    config_path: PathBuf,
    ticker: Option<String>,
    indicator: String,
    tail: Option<usize>,
) -> Result<(), String> {
    let (config, _source) = super::common::load(&config_path)?;
    let spec = IndicatorSpec::parse(&indicator).map_err(|e| e.to_string())?;
    let ticker = ticker.unwrap_or_else(|| config.run.ticker.clone());

    let market_data = crate::infra::build_market_data_repo(&config);
    let rows = tickwise_application::indicators::indicator_series(
        &config,
        &ticker,
        &spec,
        &market_data,
    )
    .map_err(|e| e.to_string())?;

    let skip = tail.map_or(0, |n| rows.len().saturating_sub(n));
    crate::output::print_indicator_rows(&spec.to_string(), &rows[skip..]);
    Ok(())
}
