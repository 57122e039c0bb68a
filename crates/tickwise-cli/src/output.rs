//! Human-readable rendering for terminal output.

use tickwise_application::backtesting::BacktestOutcome;
use tickwise_application::experiments::sweep::SweepResult;
use tickwise_application::indicators::IndicatorRow;
use tickwise_application::portfolio::PortfolioSnapshot;
use tickwise_domain::entities::valuation::PerformanceReport;
use tickwise_domain::value_objects::signal::Signal;
use tickwise_domain::value_objects::timestamp::format_timestamp;
use tickwise_domain::value_objects::transaction::Transaction;

fn date(timestamp: i64) -> String {
    let formatted = format_timestamp(timestamp);
    match formatted.strip_suffix(" 00:00:00") {
        Some(day) => day.to_string(),
        None => formatted,
    }
}

fn pct(value: f64) -> String {
    format!("{:+.2}%", value * 100.0)
}

fn opt(value: Option<f64>, digits: usize) -> String {
    match value {
        Some(v) => format!("{:.*}", digits, v),
        None => "n/a".to_string(),
    }
}

pub fn print_backtest(outcome: &BacktestOutcome) {
    let s = &outcome.summary;
    println!(
        "backtest {} ({} / {}): {} bars, {} trades, final state {:?}",
        outcome.run_id, outcome.ticker, outcome.strategy, s.bars_processed, s.trades,
        outcome.final_state
    );
    println!(
        "  equity {:.2} -> {:.2} ({}), net profit {:.2}",
        s.initial_equity,
        s.final_equity,
        pct(s.total_return),
        s.net_profit
    );
    println!(
        "  cagr {}  sharpe {}  volatility {}  max drawdown {}",
        opt(s.cagr.map(|v| v * 100.0), 2),
        opt(s.sharpe, 3),
        opt(s.volatility, 4),
        pct(-s.max_drawdown)
    );
    println!(
        "  win rate {}  profit factor {}  avg trade {}  exposure {:.1}%",
        opt(s.win_rate.map(|v| v * 100.0), 1),
        opt(s.profit_factor, 3),
        opt(s.avg_trade, 2),
        s.exposure * 100.0
    );
    if let Some(benchmark) = &outcome.benchmark {
        println!(
            "  benchmark {} buy-and-hold {}, excess {}",
            benchmark.ticker,
            pct(benchmark.benchmark_return),
            pct(benchmark.excess_return)
        );
    }
    if let Some(open) = &outcome.open_position {
        println!(
            "  open position: {:.4} @ {:.2} since {}, marked {:.2}, unrealized {:.2}",
            open.quantity,
            open.entry_price,
            date(open.entry_timestamp),
            open.mark_price,
            open.unrealized_pnl
        );
    }
    println!("run output: {}", outcome.run_dir.display());
}

pub fn signal_line(signal: &Signal) -> String {
    format!(
        "{:<8} {}  {:<4} {:<8} @ {:>10.2}  [{}] {}",
        signal.ticker,
        date(signal.timestamp),
        signal.action,
        signal.strength.as_str(),
        signal.price,
        signal.strategy,
        signal.reason
    )
}

pub fn transaction_line(tx: &Transaction) -> String {
    format!(
        "#{:<5} {}  {:<4} {:<8} {:>12.4} @ {:>10.2}{}",
        tx.id,
        date(tx.timestamp),
        tx.action,
        tx.ticker,
        tx.quantity,
        tx.price,
        tx.notes
            .as_deref()
            .map(|n| format!("  {n}"))
            .unwrap_or_default()
    )
}

pub fn print_portfolio(snapshot: &PortfolioSnapshot) {
    if snapshot.positions.is_empty() {
        println!("no open positions");
    } else {
        println!(
            "{:<8} {:>12} {:>10} {:>10} {:>12} {:>12} {:>9}  {}",
            "ticker", "shares", "cost", "price", "value", "p/l", "p/l %", "since"
        );
        for p in &snapshot.positions {
            println!(
                "{:<8} {:>12.4} {:>10.2} {:>10} {:>12.2} {:>12.2} {:>8.2}%  {}",
                p.ticker,
                p.shares,
                p.cost_basis,
                opt(p.current_price, 2),
                p.current_value,
                p.pl,
                p.pl_pct,
                date(p.purchase_date)
            );
        }
    }
    let t = &snapshot.totals;
    println!(
        "total value {:.2}  cost {:.2}  p/l {:.2} ({:.2}%)  realized {:.2}",
        t.total_value, t.total_cost, t.total_pl, t.total_pl_pct, snapshot.realized_pnl
    );
    if !snapshot.missing_prices.is_empty() {
        println!(
            "no price for {}; carried at cost",
            snapshot.missing_prices.join(", ")
        );
    }
    match &snapshot.metrics {
        Some(report) => print_performance(report),
        None => println!("performance: not enough valuation history"),
    }
}

fn print_performance(report: &PerformanceReport) {
    println!(
        "performance ({}): {} -> {} over {} days",
        report.period,
        date(report.start_timestamp),
        date(report.end_timestamp),
        report.days_held
    );
    println!(
        "  value {:.2} -> {:.2}  return {:.2} ({:.2}%)  annualized {:.2}%",
        report.start_value,
        report.end_value,
        report.absolute_return,
        report.percent_return,
        report.annualized_return * 100.0
    );
    println!(
        "  volatility {}  sharpe {}",
        opt(report.volatility, 4),
        opt(report.sharpe, 3)
    );
}

pub fn print_validation(report: &serde_json::Value) {
    let strict = report["strict"].as_bool().unwrap_or(false);
    println!("validate (strict={})", strict);
    let Some(tickers) = report["tickers"].as_array() else {
        return;
    };
    for entry in tickers {
        let r = &entry["report"];
        println!(
            "{:<8} {}  bars={} duplicates={} out_of_order={} invalid_prices={} gaps={} largest_gap_s={}",
            entry["ticker"].as_str().unwrap_or("?"),
            if entry["ok"].as_bool().unwrap_or(false) { "ok  " } else { "FAIL" },
            r["bars"],
            r["duplicates"],
            r["out_of_order"],
            r["invalid_prices"],
            r["gaps"],
            r["largest_gap_seconds"]
        );
    }
}

pub fn print_sweep(result: &SweepResult) {
    let ok = result.runs.iter().filter(|r| r.status == "ok").count();
    println!(
        "sweep {}: {} runs ({} ok, {} failed)",
        result.sweep_id,
        result.runs.len(),
        ok,
        result.runs.len() - ok
    );
    for run in result.runs.iter().filter(|r| r.status != "ok") {
        println!(
            "  {} failed: {}",
            run.run_id,
            run.error.as_deref().unwrap_or("unknown error")
        );
    }
    println!("sweep output: {}", result.sweep_dir.display());
    println!("leaderboard: {}", result.sweep_dir.join("leaderboard.csv").display());
}

pub fn print_indicator_rows(indicator: &str, rows: &[IndicatorRow]) {
    let labels = rows
        .iter()
        .find_map(|row| row.value.map(|v| v.labels()))
        .unwrap_or(&["value"]);
    println!("# {}", indicator);
    println!("date,close,{}", labels.join(","));
    for row in rows {
        let values = match row.value {
            Some(value) => value
                .columns()
                .iter()
                .map(|v| format!("{:.6}", v))
                .collect::<Vec<_>>()
                .join(","),
            None => vec![""; labels.len()].join(","),
        };
        println!("{},{},{}", date(row.timestamp), row.close, values);
    }
}
