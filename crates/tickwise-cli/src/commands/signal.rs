use std::path::PathBuf;
use tracing::warn;

pub(super) fn run_signal(
    config_path: PathBuf,
    tickers: Vec<String>,
    strategy: Option<String>,
) -> Result<(), String> {
    let (mut config, _source) = super::common::load(&config_path)?;
    if let Some(name) = strategy.as_deref() {
        config.override_strategy(name).map_err(|e| e.to_string())?;
    }

    let tickers = if !tickers.is_empty() {
        tickers
    } else if !config.watchlist().is_empty() {
        config.watchlist()
    } else {
        vec![config.run.ticker.clone()]
    };

    let market_data = crate::infra::build_market_data_repo(&config);
    let results =
        tickwise_application::advisory::evaluate_watchlist(&config, &tickers, &market_data);

    let mut failures = 0usize;
    for (ticker, result) in &results {
        match result {
            Ok(signal) => println!("{}", crate::output::signal_line(signal)),
            Err(err) => {
                failures += 1;
                warn!(ticker = %ticker, error = %err, "signal evaluation failed");
                println!("{:<8} error: {}", ticker, err);
            }
        }
    }

    if failures == results.len() {
        return Err(format!("no signal could be evaluated ({} tickers)", failures));
    }
    Ok(())
}
