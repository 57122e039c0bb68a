mod commands;
mod infra;
mod obs;
mod output;

use clap::{Args, Parser, Subcommand, ValueEnum};
use commands::Command;
use std::path::PathBuf;
use tickwise_domain::entities::valuation::Period;
use tickwise_domain::services::engine::backtest::FillPolicy;
use tickwise_domain::value_objects::side::Side;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (git ",
    env!("TICKWISE_GIT_SHA"),
    ", ",
    env!("TICKWISE_TARGET"),
    ", ",
    env!("TICKWISE_RUSTC_VERSION"),
    ")"
);

#[derive(Parser)]
#[command(name = "tickwise")]
#[command(
    about = "Indicators, strategy signals, backtests and a portfolio ledger over daily OHLCV data",
    version,
    long_version = LONG_VERSION,
    arg_required_else_help = true
)]
#[command(
    after_help = "Examples:\n  tickwise backtest --config configs/sample.toml\n  tickwise signal --config configs/sample.toml --ticker AAPL --ticker MSFT\n  tickwise trade buy --config configs/sample.toml --ticker AAPL --qty 10 --price 185.2\n  tickwise portfolio --config configs/sample.toml --record --period month\n  tickwise sweep --sweep-config configs/sweep.toml\n"
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Args)]
struct GlobalArgs {
    /// Log filter (overridden by env TICKWISE_LOG).
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Log format: pretty | json.
    #[arg(long, global = true, default_value = "pretty")]
    log_format: String,

    /// Expose Prometheus metrics on host:port while the command runs.
    #[arg(long, global = true)]
    metrics_addr: Option<String>,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Backtest the configured strategy and write run artifacts.
    Backtest {
        #[arg(long)]
        config: PathBuf,
        #[arg(long)]
        out: Option<PathBuf>,
        /// Override `run.ticker`.
        #[arg(long)]
        ticker: Option<String>,
        /// Override the strategy (its defaults apply unless it is the configured one).
        #[arg(long)]
        strategy: Option<String>,
        #[arg(long, value_enum)]
        fill: Option<FillArg>,
    },
    /// Latest signal per ticker.
    Signal {
        #[arg(long)]
        config: PathBuf,
        /// Repeatable. Defaults to the watchlist, then `run.ticker`.
        #[arg(long = "ticker")]
        tickers: Vec<String>,
        #[arg(long)]
        strategy: Option<String>,
    },
    /// Record a BUY or SELL in the ledger.
    Trade {
        #[arg(value_enum)]
        action: TradeAction,
        #[arg(long)]
        config: PathBuf,
        #[arg(long)]
        ticker: String,
        #[arg(long)]
        qty: f64,
        #[arg(long)]
        price: f64,
        /// Trade date (RFC3339, YYYY-MM-DD or epoch seconds). Defaults to now.
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Positions, totals and performance.
    Portfolio {
        #[arg(long)]
        config: PathBuf,
        /// Price override as TICKER=VALUE. Repeatable.
        #[arg(long = "price")]
        prices: Vec<String>,
        /// Append the current totals to the valuation history.
        #[arg(long, default_value_t = false)]
        record: bool,
        #[arg(long, value_enum, default_value_t = PeriodArg::All)]
        period: PeriodArg,
    },
    /// Stored transactions, oldest first.
    Transactions {
        #[arg(long)]
        config: PathBuf,
        /// Show only the most recent N.
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Data quality report for the run ticker, benchmark and watchlist.
    Validate {
        #[arg(long)]
        config: PathBuf,
        #[arg(long, default_value_t = false)]
        strict: bool,
        /// Also write the JSON report here.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Backtest every combination of a parameter grid.
    Sweep {
        #[arg(long)]
        sweep_config: PathBuf,
    },
    /// Evaluate one indicator over a ticker's bars.
    Indicators {
        #[arg(long)]
        config: PathBuf,
        #[arg(long)]
        ticker: Option<String>,
        /// e.g. `rsi:14`, `macd:12,26,9`, `bollinger:20,2`.
        #[arg(long)]
        indicator: String,
        /// Print only the last N rows.
        #[arg(long)]
        tail: Option<usize>,
    },
}

#[derive(ValueEnum, Clone, Copy)]
enum FillArg {
    SameBarClose,
    NextBarOpen,
}

impl From<FillArg> for FillPolicy {
    fn from(value: FillArg) -> Self {
        match value {
            FillArg::SameBarClose => FillPolicy::SameBarClose,
            FillArg::NextBarOpen => FillPolicy::NextBarOpen,
        }
    }
}

#[derive(ValueEnum, Clone, Copy)]
enum TradeAction {
    Buy,
    Sell,
}

impl From<TradeAction> for Side {
    fn from(value: TradeAction) -> Self {
        match value {
            TradeAction::Buy => Side::Buy,
            TradeAction::Sell => Side::Sell,
        }
    }
}

#[derive(ValueEnum, Clone, Copy)]
enum PeriodArg {
    Day,
    Week,
    Month,
    Year,
    All,
}

impl From<PeriodArg> for Period {
    fn from(value: PeriodArg) -> Self {
        match value {
            PeriodArg::Day => Period::Day,
            PeriodArg::Week => Period::Week,
            PeriodArg::Month => Period::Month,
            PeriodArg::Year => Period::Year,
            PeriodArg::All => Period::All,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    if let Err(err) = obs::init_tracing(&cli.global.log_level, &cli.global.log_format) {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
    if let Err(err) = obs::init_metrics(cli.global.metrics_addr.as_deref()) {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }

    let command = match cli.command {
        CliCommand::Backtest {
            config,
            out,
            ticker,
            strategy,
            fill,
        } => Command::Backtest {
            config,
            out,
            ticker,
            strategy,
            fill: fill.map(FillPolicy::from),
        },
        CliCommand::Signal {
            config,
            tickers,
            strategy,
        } => Command::Signal {
            config,
            tickers,
            strategy,
        },
        CliCommand::Trade {
            action,
            config,
            ticker,
            qty,
            price,
            date,
            notes,
        } => Command::Trade {
            config,
            action: action.into(),
            ticker,
            qty,
            price,
            date,
            notes,
        },
        CliCommand::Portfolio {
            config,
            prices,
            record,
            period,
        } => Command::Portfolio {
            config,
            prices,
            record,
            period: period.into(),
        },
        CliCommand::Transactions { config, limit } => Command::Transactions { config, limit },
        CliCommand::Validate {
            config,
            strict,
            out,
        } => Command::Validate {
            config,
            strict,
            out,
        },
        CliCommand::Sweep { sweep_config } => Command::Sweep { sweep_config },
        CliCommand::Indicators {
            config,
            ticker,
            indicator,
            tail,
        } => Command::Indicators {
            config,
            ticker,
            indicator,
            tail,
        },
    };

    if let Err(err) = commands::run(command) {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}
