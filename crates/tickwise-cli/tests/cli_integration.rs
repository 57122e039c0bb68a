use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

fn unique_tmp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("{prefix}_{}_{nanos}", std::process::id()));
    fs::create_dir_all(&dir).expect("create tmp dir");
    dir
}

fn write_bars(data_dir: &Path, ticker: &str, count: usize, drift: f64) {
    let mut csv = String::from("timestamp,open,high,low,close,volume\n");
    let start = 1_704_153_600i64; // 2024-01-02
    for i in 0..count {
        let close = 100.0 + 8.0 * ((i as f64) / 4.0).sin() + i as f64 * drift;
        let open = close - 0.5;
        csv.push_str(&format!(
            "{},{:.4},{:.4},{:.4},{:.4},{}\n",
            start + i as i64 * 86_400,
            open,
            close + 1.0,
            open - 1.0,
            close,
            10_000 + i * 10
        ));
    }
    fs::write(data_dir.join(format!("{ticker}.csv")), csv).expect("write bars");
}

fn setup(prefix: &str) -> (PathBuf, PathBuf) {
    let dir = unique_tmp_dir(prefix);
    let data_dir = dir.join("data");
    fs::create_dir_all(&data_dir).expect("data dir");
    write_bars(&data_dir, "SPY", 80, 0.1);
    write_bars(&data_dir, "QQQ", 80, 0.3);

    let config_path = dir.join("config.toml");
    let config = format!(
        r#"
[run]
run_id = "cli_run"
ticker = "SPY"
initial_capital = 10000.0

[paths]
data_dir = "{data}"
out_dir = "{out}"

[costs]
fee_bps = 5.0

[strategy]
name = "ma_crossover"
fast_period = 3
slow_period = 8
rsi_period = 5

[benchmark]
ticker = "QQQ"

[watchlist]
tickers = ["SPY", "QQQ"]
"#,
        data = data_dir.display(),
        out = dir.join("runs").display()
    );
    fs::write(&config_path, config).expect("write config");
    (dir, config_path)
}

fn tickwise(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_tickwise"))
        .args(args)
        .env_remove("TICKWISE_LOG")
        .output()
        .expect("run tickwise")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn backtest_writes_run_artifacts() {
    let (dir, config) = setup("tickwise_cli_backtest");
    let output = tickwise(&["backtest", "--config", config.to_str().unwrap()]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let run_dir = dir.join("runs").join("cli_run");
    for file in [
        "summary.json",
        "trades.csv",
        "fills.csv",
        "equity.csv",
        "logs.jsonl",
        "config_snapshot.toml",
    ] {
        assert!(run_dir.join(file).exists(), "missing {file}");
    }
    let summary: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(run_dir.join("summary.json")).unwrap()).unwrap();
    assert!(summary.is_object());
    assert!(stdout(&output).contains("run output:"));
}

#[test]
fn backtest_overrides_land_in_snapshot() {
    let (dir, config) = setup("tickwise_cli_override");
    let output = tickwise(&[
        "backtest",
        "--config",
        config.to_str().unwrap(),
        "--strategy",
        "bollinger",
        "--fill",
        "next-bar-open",
    ]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let snapshot =
        fs::read_to_string(dir.join("runs").join("cli_run").join("config_snapshot.toml")).unwrap();
    assert!(snapshot.contains("bollinger"));
    assert!(snapshot.contains("next_bar_open"));
}

#[test]
fn unknown_strategy_exits_with_error() {
    let (_dir, config) = setup("tickwise_cli_unknown");
    let output = tickwise(&[
        "backtest",
        "--config",
        config.to_str().unwrap(),
        "--strategy",
        "moon_phase",
    ]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("unknown strategy"));
}

#[test]
fn oversell_is_rejected_and_ledger_unchanged() {
    let (_dir, config) = setup("tickwise_cli_trade");
    let config = config.to_str().unwrap();

    let buy = tickwise(&[
        "trade", "buy", "--config", config, "--ticker", "spy", "--qty", "10", "--price", "100",
        "--date", "2024-03-01",
    ]);
    assert!(buy.status.success(), "stderr: {}", stderr(&buy));
    assert!(stdout(&buy).contains("SPY"));

    let sell = tickwise(&[
        "trade", "sell", "--config", config, "--ticker", "SPY", "--qty", "15", "--price", "110",
        "--date", "2024-03-05",
    ]);
    assert_eq!(sell.status.code(), Some(1));
    assert!(stderr(&sell).contains("insufficient shares"));

    let list = tickwise(&["transactions", "--config", config]);
    assert!(list.status.success());
    let listed = stdout(&list);
    assert_eq!(listed.lines().count(), 1, "{listed}");
    assert!(listed.contains("BUY"));
}

#[test]
fn portfolio_values_positions_and_records_history() {
    let (dir, config) = setup("tickwise_cli_portfolio");
    let config = config.to_str().unwrap();

    let buy = tickwise(&[
        "trade", "buy", "--config", config, "--ticker", "SPY", "--qty", "10", "--price", "100",
        "--date", "2024-03-01",
    ]);
    assert!(buy.status.success(), "stderr: {}", stderr(&buy));

    let output = tickwise(&[
        "portfolio",
        "--config",
        config,
        "--price",
        "SPY=120",
        "--record",
    ]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let printed = stdout(&output);
    assert!(printed.contains("SPY"));
    assert!(printed.contains("total value 1200.00"));
    assert!(dir.join("runs").join("valuations.csv").exists());
}

#[test]
fn validate_writes_json_report() {
    let (dir, config) = setup("tickwise_cli_validate");
    let report_path = dir.join("report.json");
    let output = tickwise(&[
        "validate",
        "--config",
        config.to_str().unwrap(),
        "--strict",
        "--out",
        report_path.to_str().unwrap(),
    ]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let report: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(report["strict"], serde_json::Value::Bool(true));
    let tickers = report["tickers"].as_array().unwrap();
    assert!(tickers.iter().any(|t| t["ticker"] == "SPY"));
    assert!(tickers.iter().all(|t| t["ok"] == serde_json::Value::Bool(true)));
}

#[test]
fn signal_reports_each_ticker_and_survives_missing_data() {
    let (_dir, config) = setup("tickwise_cli_signal");
    let config = config.to_str().unwrap();

    let output = tickwise(&["signal", "--config", config]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let printed = stdout(&output);
    assert!(printed.contains("SPY"));
    assert!(printed.contains("QQQ"));

    let partial = tickwise(&["signal", "--config", config, "--ticker", "SPY", "--ticker", "NOPE"]);
    assert!(partial.status.success(), "stderr: {}", stderr(&partial));
    assert!(stdout(&partial).contains("NOPE     error:"));

    let none = tickwise(&["signal", "--config", config, "--ticker", "NOPE"]);
    assert_eq!(none.status.code(), Some(1));
}

#[test]
fn indicators_print_csv_rows() {
    let (_dir, config) = setup("tickwise_cli_indicators");
    let output = tickwise(&[
        "indicators",
        "--config",
        config.to_str().unwrap(),
        "--indicator",
        "macd:12,26,9",
        "--tail",
        "5",
    ]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let printed = stdout(&output);
    let lines: Vec<&str> = printed.lines().collect();
    assert_eq!(lines[1], "date,close,macd,signal,histogram");
    assert_eq!(lines.len(), 2 + 5);
}
