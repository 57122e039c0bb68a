use serde_json::Value;
use std::fs;
use std::io::Write;
use std::path::Path;
use tickwise_domain::entities::metrics::MetricsSummary;
use tickwise_domain::services::audit::AuditEvent;
use tickwise_domain::value_objects::equity_point::EquityPoint;
use tickwise_domain::value_objects::fill::Fill;
use tickwise_domain::value_objects::timestamp::format_timestamp;
use tickwise_domain::value_objects::trade::Trade;

pub fn write_audit_jsonl(path: &Path, events: &[AuditEvent]) -> Result<(), String> {
    let mut file =
        fs::File::create(path).map_err(|err| format!("failed to create logs: {}", err))?;
    for event in events {
        let line = serde_json::to_string(event)
            .map_err(|err| format!("failed to serialize audit event: {}", err))?;
        file.write_all(line.as_bytes())
            .and_then(|_| file.write_all(b"\n"))
            .map_err(|err| format!("failed to write audit event: {}", err))?;
    }
    Ok(())
}

pub fn write_trades_csv(path: &Path, trades: &[Trade]) -> Result<(), String> {
    let mut wtr = csv::Writer::from_path(path)
        .map_err(|err| format!("failed to create trades csv {}: {}", path.display(), err))?;
    wtr.write_record([
        "symbol",
        "entry_timestamp",
        "entry_price",
        "exit_timestamp",
        "exit_price",
        "quantity",
        "pnl",
        "pnl_pct",
        "reason",
    ])
    .map_err(|err| format!("failed to write trades csv header: {}", err))?;

    for trade in trades {
        wtr.write_record([
            trade.symbol.clone(),
            format_timestamp(trade.entry_timestamp),
            trade.entry_price.to_string(),
            format_timestamp(trade.exit_timestamp),
            trade.exit_price.to_string(),
            trade.quantity.to_string(),
            trade.pnl.to_string(),
            trade.pnl_pct.to_string(),
            trade.reason.clone(),
        ])
        .map_err(|err| format!("failed to write trades row: {}", err))?;
    }

    wtr.flush()
        .map_err(|err| format!("failed to flush trades csv: {}", err))
}

pub fn write_fills_csv(path: &Path, fills: &[Fill]) -> Result<(), String> {
    let mut wtr = csv::Writer::from_path(path)
        .map_err(|err| format!("failed to create fills csv {}: {}", path.display(), err))?;
    wtr.write_record(["timestamp", "symbol", "side", "quantity", "price", "fee", "reason"])
        .map_err(|err| format!("failed to write fills csv header: {}", err))?;

    for fill in fills {
        wtr.write_record([
            format_timestamp(fill.timestamp),
            fill.symbol.clone(),
            fill.side.as_str().to_string(),
            fill.quantity.to_string(),
            fill.price.to_string(),
            fill.fee.to_string(),
            fill.reason.clone(),
        ])
        .map_err(|err| format!("failed to write fills row: {}", err))?;
    }

    wtr.flush()
        .map_err(|err| format!("failed to flush fills csv: {}", err))
}

pub fn write_equity_csv(path: &Path, points: &[EquityPoint]) -> Result<(), String> {
    let mut wtr = csv::Writer::from_path(path)
        .map_err(|err| format!("failed to create equity csv {}: {}", path.display(), err))?;
    wtr.write_record([
        "timestamp",
        "equity",
        "cash",
        "position_qty",
        "unrealized_pnl",
        "realized_pnl",
    ])
    .map_err(|err| format!("failed to write equity csv header: {}", err))?;

    for point in points {
        wtr.write_record([
            format_timestamp(point.timestamp),
            point.equity.to_string(),
            point.cash.to_string(),
            point.position_qty.to_string(),
            point.unrealized_pnl.to_string(),
            point.realized_pnl.to_string(),
        ])
        .map_err(|err| format!("failed to write equity row: {}", err))?;
    }

    wtr.flush()
        .map_err(|err| format!("failed to flush equity csv: {}", err))
}

pub fn write_summary_json(path: &Path, summary: &Value) -> Result<(), String> {
    let json = serde_json::to_string_pretty(summary)
        .map_err(|err| format!("failed to serialize summary: {}", err))?;
    let mut file =
        fs::File::create(path).map_err(|err| format!("failed to create summary: {}", err))?;
    file.write_all(json.as_bytes())
        .map_err(|err| format!("failed to write summary: {}", err))
}

fn meta_str<'a>(meta: Option<&'a Value>, key: &str) -> &'a str {
    meta.and_then(|m| m.get(key))
        .and_then(Value::as_str)
        .unwrap_or("unknown")
}

fn meta_time(meta: Option<&Value>, key: &str) -> String {
    meta.and_then(|m| m.get(key))
        .and_then(Value::as_i64)
        .map(format_timestamp)
        .unwrap_or_else(|| "unknown".to_string())
}

fn opt(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.4}", v))
}

fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub fn write_summary_html(
    path: &Path,
    summary: &MetricsSummary,
    meta: Option<&Value>,
) -> Result<(), String> {
    let run_id = escape_html(meta_str(meta, "run_id"));
    let ticker = escape_html(meta_str(meta, "ticker"));
    let strategy = escape_html(meta_str(meta, "strategy"));
    let start = meta_time(meta, "start");
    let end = meta_time(meta, "end");

    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8"/>
  <title>tickwise backtest summary</title>
  <style>
    body {{ font-family: ui-sans-serif, system-ui; padding: 24px; }}
    table {{ border-collapse: collapse; width: 520px; }}
    th, td {{ border: 1px solid #ddd; padding: 8px; }}
    th {{ background: #f6f6f6; text-align: left; }}
    code {{ background: #f2f2f2; padding: 2px 6px; border-radius: 4px; }}
  </style>
</head>
<body>
  <h1>Backtest summary</h1>
  <p><strong>run_id:</strong> <code>{run_id}</code></p>
  <p><strong>ticker:</strong> <code>{ticker}</code></p>
  <p><strong>strategy:</strong> <code>{strategy}</code></p>
  <p><strong>start:</strong> <code>{start}</code></p>
  <p><strong>end:</strong> <code>{end}</code></p>
  <h2>Metrics</h2>
  <table>
    <tr><th>bars_processed</th><td>{bars}</td></tr>
    <tr><th>trades</th><td>{trades}</td></tr>
    <tr><th>initial_equity</th><td>{initial:.2}</td></tr>
    <tr><th>final_equity</th><td>{final_equity:.2}</td></tr>
    <tr><th>net_profit</th><td>{net_profit:.2}</td></tr>
    <tr><th>total_return</th><td>{total_return:.4}</td></tr>
    <tr><th>cagr</th><td>{cagr}</td></tr>
    <tr><th>sharpe</th><td>{sharpe}</td></tr>
    <tr><th>volatility</th><td>{volatility}</td></tr>
    <tr><th>max_drawdown</th><td>{max_drawdown:.4}</td></tr>
    <tr><th>win_rate</th><td>{win_rate}</td></tr>
    <tr><th>profit_factor</th><td>{profit_factor}</td></tr>
    <tr><th>avg_trade</th><td>{avg_trade}</td></tr>
    <tr><th>exposure</th><td>{exposure:.4}</td></tr>
  </table>
</body>
</html>"#,
        bars = summary.bars_processed,
        trades = summary.trades,
        initial = summary.initial_equity,
        final_equity = summary.final_equity,
        net_profit = summary.net_profit,
        total_return = summary.total_return,
        cagr = opt(summary.cagr),
        sharpe = opt(summary.sharpe),
        volatility = opt(summary.volatility),
        max_drawdown = summary.max_drawdown,
        win_rate = opt(summary.win_rate),
        profit_factor = opt(summary.profit_factor),
        avg_trade = opt(summary.avg_trade),
        exposure = summary.exposure,
    );

    let mut file =
        fs::File::create(path).map_err(|err| format!("failed to create html: {}", err))?;
    file.write_all(html.as_bytes())
        .map_err(|err| format!("failed to write html: {}", err))
}
