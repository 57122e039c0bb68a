mod backtest;
mod common;
mod indicators;
mod portfolio;
mod signal;
mod sweep;
mod validate;

use std::path::PathBuf;
use tickwise_domain::entities::valuation::Period;
use tickwise_domain::services::engine::backtest::FillPolicy;
use tickwise_domain::value_objects::side::Side;

pub enum Command {
    Backtest {
        config: PathBuf,
        out: Option<PathBuf>,
        ticker: Option<String>,
        strategy: Option<String>,
        fill: Option<FillPolicy>,
    },
    Signal {
        config: PathBuf,
        tickers: Vec<String>,
        strategy: Option<String>,
    },
    Trade {
        config: PathBuf,
        action: Side,
        ticker: String,
        qty: f64,
        price: f64,
        date: Option<String>,
        notes: Option<String>,
    },
    Portfolio {
        config: PathBuf,
        prices: Vec<String>,
        record: bool,
        period: Period,
    },
    Transactions {
        config: PathBuf,
        limit: Option<usize>,
    },
    Validate {
        config: PathBuf,
        strict: bool,
        out: Option<PathBuf>,
    },
    Sweep {
        sweep_config: PathBuf,
    },
    Indicators {
        config: PathBuf,
        ticker: Option<String>,
        indicator: String,
        tail: Option<usize>,
    },
}

pub fn run(command: Command) -> Result<(), String> {
    match command {
        Command::Backtest {
            config,
            out,
            ticker,
            strategy,
            fill,
        } => backtest::run_backtest(config, out, ticker, strategy, fill),
        Command::Signal {
            config,
            tickers,
            strategy,
        } => signal::run_signal(config, tickers, strategy),
        Command::Trade {
            config,
            action,
            ticker,
            qty,
            price,
            date,
            notes,
        } => portfolio::run_trade(config, action, ticker, qty, price, date, notes),
        Command::Portfolio {
            config,
            prices,
            record,
            period,
        } => portfolio::run_portfolio(config, prices, record, period),
        Command::Transactions { config, limit } => portfolio::run_transactions(config, limit),
        Command::Validate {
            config,
            strict,
            out,
        } => validate::run_validate(config, strict, out),
        Command::Sweep { sweep_config } => sweep::run_sweep(sweep_config),
        Command::Indicators {
            config,
            ticker,
            indicator,
            tail,
        } => indicators::run_indicators(config, ticker, indicator, tail),
    }
}
