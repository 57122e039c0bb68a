use std::path::PathBuf;
use tickwise_application::config::Config;
use tickwise_domain::services::engine::backtest::FillPolicy;

pub(super) fn print_config_summary(command: &str, config: &Config, out: Option<&PathBuf>) {
    println!(
        "tickwise cli: {} (run_id={}, ticker={}, initial_capital={})",
        command, config.run.run_id, config.run.ticker, config.run.initial_capital
    );
    println!(
        "data: data_dir={}, range={}..{}, out_dir={}",
        config.paths.data_dir,
        config.run.start.as_deref().unwrap_or("start"),
        config.run.end.as_deref().unwrap_or("end"),
        config.paths.out_dir
    );
    let fill = config
        .execution
        .as_ref()
        .and_then(|e| e.fill)
        .unwrap_or(FillPolicy::SameBarClose);
    println!(
        "strategy: {}  fill: {}  fee_bps: {}  benchmark: {}",
        config.strategy.name(),
        fill.as_str(),
        config.costs.fee_bps,
        config.benchmark_ticker().unwrap_or(&config.run.ticker)
    );
    if let Some(out_dir) = out {
        println!("output dir: {}", out_dir.display());
    }
}

pub(super) fn load(config_path: &PathBuf) -> Result<(Config, String), String> {
    tickwise_application::config::load_config_with_source(config_path)
}
