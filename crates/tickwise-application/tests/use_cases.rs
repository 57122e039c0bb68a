use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tickwise_application::advisory::{evaluate_signal, evaluate_watchlist};
use tickwise_application::backtesting::run_backtest;
use tickwise_application::config::Config;
use tickwise_application::indicators::indicator_series;
use tickwise_application::portfolio::{
    get_portfolio_snapshot, latest_prices, list_transactions, record_trade, store_valuation,
};
use tickwise_application::validation::validate;
use tickwise_domain::entities::metrics::MetricsSummary;
use tickwise_domain::entities::valuation::{Period, ValuationRecord, ValuationTotals};
use tickwise_domain::errors::TickwiseError;
use tickwise_domain::repositories::artifacts::ArtifactWriter;
use tickwise_domain::repositories::ledger::LedgerRepository;
use tickwise_domain::repositories::market_data::{MarketDataRepository, OhlcvQuery};
use tickwise_domain::repositories::valuation::ValuationRepository;
use tickwise_domain::services::audit::AuditEvent;
use tickwise_domain::services::engine::backtest::PositionState;
use tickwise_domain::services::indicators::IndicatorSpec;
use tickwise_domain::services::ohlcv::{data_quality_from_bars, DataQualityReport};
use tickwise_domain::value_objects::action_type::ActionType;
use tickwise_domain::value_objects::bar::Bar;
use tickwise_domain::value_objects::equity_point::EquityPoint;
use tickwise_domain::value_objects::fill::Fill;
use tickwise_domain::value_objects::trade::Trade;
use tickwise_domain::value_objects::transaction::{NewTransaction, Transaction};

#[derive(Default)]
struct FakeMarketDataRepo {
    series: BTreeMap<String, Vec<Bar>>,
    queries: RefCell<Vec<OhlcvQuery>>,
}

impl FakeMarketDataRepo {
    fn with(mut self, ticker: &str, bars: Vec<Bar>) -> Self {
        self.series.insert(ticker.to_string(), bars);
        self
    }
}

impl MarketDataRepository for FakeMarketDataRepo {
    fn load_ohlcv(&self, query: &OhlcvQuery) -> Result<(Vec<Bar>, DataQualityReport), String> {
        self.queries.borrow_mut().push(query.clone());
        let bars = self
            .series
            .get(&query.ticker)
            .ok_or_else(|| format!("no data for {}", query.ticker))?;
        let bars: Vec<Bar> = bars
            .iter()
            .filter(|b| query.contains(b.timestamp))
            .cloned()
            .collect();
        let report = data_quality_from_bars(&bars, query.max_gap_seconds);
        Ok((bars, report))
    }
}

#[derive(Default)]
struct FakeLedgerRepo {
    stored: RefCell<Vec<Transaction>>,
}

impl LedgerRepository for FakeLedgerRepo {
    fn load_transactions(&self) -> Result<Vec<Transaction>, String> {
        Ok(self.stored.borrow().clone())
    }

    fn append_transaction(&self, transaction: &Transaction) -> Result<(), String> {
        self.stored.borrow_mut().push(transaction.clone());
        Ok(())
    }
}

#[derive(Default)]
struct FakeValuationRepo {
    stored: RefCell<Vec<ValuationRecord>>,
}

impl ValuationRepository for FakeValuationRepo {
    fn load_valuations(&self) -> Result<Vec<ValuationRecord>, String> {
        Ok(self.stored.borrow().clone())
    }

    fn append_valuation(&self, record: &ValuationRecord) -> Result<(), String> {
        self.stored.borrow_mut().push(record.clone());
        Ok(())
    }
}

#[derive(Default)]
struct RecordingWriter {
    ensured_dirs: RefCell<Vec<PathBuf>>,
    trades_written: RefCell<Option<usize>>,
    fills_written: RefCell<Option<usize>>,
    equity_written: RefCell<Option<usize>>,
    summary_written: RefCell<Option<serde_json::Value>>,
    summary_html_written: RefCell<bool>,
    audit_written: RefCell<Vec<AuditEvent>>,
    config_snapshot: RefCell<Option<String>>,
}

impl ArtifactWriter for RecordingWriter {
    fn ensure_dir(&self, path: &Path) -> Result<(), String> {
        self.ensured_dirs.borrow_mut().push(path.to_path_buf());
        Ok(())
    }

    fn write_trades_csv(&self, _path: &Path, trades: &[Trade]) -> Result<(), String> {
        *self.trades_written.borrow_mut() = Some(trades.len());
        Ok(())
    }

    fn write_fills_csv(&self, _path: &Path, fills: &[Fill]) -> Result<(), String> {
        *self.fills_written.borrow_mut() = Some(fills.len());
        Ok(())
    }

    fn write_equity_csv(&self, _path: &Path, points: &[EquityPoint]) -> Result<(), String> {
        *self.equity_written.borrow_mut() = Some(points.len());
        Ok(())
    }

    fn write_summary_json(&self, _path: &Path, summary: &serde_json::Value) -> Result<(), String> {
        *self.summary_written.borrow_mut() = Some(summary.clone());
        Ok(())
    }

    fn write_summary_html(
        &self,
        _path: &Path,
        _summary: &MetricsSummary,
        _meta: Option<&serde_json::Value>,
    ) -> Result<(), String> {
        *self.summary_html_written.borrow_mut() = true;
        Ok(())
    }

    fn write_audit_jsonl(&self, _path: &Path, events: &[AuditEvent]) -> Result<(), String> {
        *self.audit_written.borrow_mut() = events.to_vec();
        Ok(())
    }

    fn write_config_snapshot_toml(&self, _path: &Path, contents: &str) -> Result<(), String> {
        *self.config_snapshot.borrow_mut() = Some(contents.to_string());
        Ok(())
    }
}

const DAY: i64 = 86_400;

fn bars_from_closes(ticker: &str, closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, close)| Bar {
            symbol: ticker.to_string(),
            timestamp: DAY * (i as i64 + 1),
            open: *close,
            high: close + 1.0,
            low: close - 1.0,
            close: *close,
            volume: 1_000.0,
        })
        .collect()
}

fn wave(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 100.0 + 8.0 * ((i as f64) / 4.0).sin() + i as f64 * 0.1)
        .collect()
}

fn config(extra: &str) -> Config {
    let toml_str = format!(
        r#"
[run]
run_id = "test_run"
ticker = "SPY"
initial_capital = 1000.0

[paths]
data_dir = "data"
out_dir = "runs"

[costs]
fee_bps = 0.0

[strategy]
name = "ma_crossover"
fast_period = 3
slow_period = 8
rsi_period = 5
{extra}
"#
    );
    toml::from_str(&toml_str).expect("config should parse")
}

#[test]
fn run_backtest_writes_all_artifacts() {
    let cfg = config("\n[report]\nhtml = true\n");
    let market = FakeMarketDataRepo::default().with("SPY", bars_from_closes("SPY", &wave(80)));
    let writer = RecordingWriter::default();

    let outcome =
        run_backtest(&cfg, "raw = true", None, &market, &writer).expect("backtest should run");

    assert_eq!(outcome.run_dir, PathBuf::from("runs").join("test_run"));
    assert_eq!(outcome.summary.bars_processed, 80);
    assert_eq!(outcome.strategy, "ma_crossover");
    assert_eq!(*writer.equity_written.borrow(), Some(80));
    assert_eq!(*writer.trades_written.borrow(), Some(outcome.trades.len()));
    assert!(writer.fills_written.borrow().is_some());
    assert!(*writer.summary_html_written.borrow());
    assert_eq!(writer.config_snapshot.borrow().as_deref(), Some("raw = true"));

    let summary = writer.summary_written.borrow().clone().expect("summary written");
    assert_eq!(summary["summary"]["bars_processed"], 80);
    assert_eq!(summary["benchmark"]["ticker"], "SPY");
    assert_eq!(summary["config_snapshot"]["execution"]["fill"], "same_bar_close");
    assert!(summary.get("final_state").is_some());

    let audit = writer.audit_written.borrow();
    assert!(audit.iter().any(|e| e.stage == "engine" && e.action == "start"));
    assert!(audit.iter().any(|e| e.stage == "timing" && e.action == "load_ohlcv"));
    assert!(audit.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
}

#[test]
fn short_history_runs_without_trades() {
    let cfg = config("");
    let market = FakeMarketDataRepo::default()
        .with("SPY", bars_from_closes("SPY", &[100.0, 101.0, 102.0]));
    let writer = RecordingWriter::default();

    let outcome = run_backtest(&cfg, "", None, &market, &writer).expect("not an error");
    assert!(outcome.trades.is_empty());
    assert_eq!(outcome.summary.total_return, 0.0);
    assert_eq!(outcome.final_state, PositionState::AwaitingEntry);
    assert!(writer
        .audit_written
        .borrow()
        .iter()
        .any(|e| e.action == "insufficient_data"));
}

#[test]
fn malformed_bars_fail_before_any_output() {
    let mut bars = bars_from_closes("SPY", &wave(20));
    bars.swap(4, 5);
    let market = FakeMarketDataRepo::default().with("SPY", bars);
    let writer = RecordingWriter::default();

    let err = run_backtest(&config(""), "", None, &market, &writer).unwrap_err();
    assert!(matches!(err, TickwiseError::DataIntegrity { ref ticker, .. } if ticker == "SPY"));
    assert!(writer.ensured_dirs.borrow().is_empty());
}

#[test]
fn provider_failure_is_terminal() {
    let market = FakeMarketDataRepo::default();
    let err = run_backtest(&config(""), "", None, &market, &RecordingWriter::default())
        .unwrap_err();
    assert!(matches!(err, TickwiseError::ProviderUnavailable { .. }));
}

#[test]
fn unavailable_benchmark_is_skipped() {
    let cfg = config("\n[benchmark]\nticker = \"QQQ\"\n");
    let market = FakeMarketDataRepo::default().with("SPY", bars_from_closes("SPY", &wave(40)));
    let writer = RecordingWriter::default();

    let outcome = run_backtest(&cfg, "", None, &market, &writer).expect("backtest");
    assert!(outcome.benchmark.is_none());
    assert!(writer
        .audit_written
        .borrow()
        .iter()
        .any(|e| e.stage == "benchmark" && e.error.is_some()));
}

#[test]
fn benchmark_uses_the_same_date_range() {
    let mut cfg = config("\n[benchmark]\nticker = \"qqq\"\n");
    cfg.run.start = Some((DAY * 5).to_string());
    let market = FakeMarketDataRepo::default()
        .with("SPY", bars_from_closes("SPY", &wave(40)))
        .with("QQQ", bars_from_closes("QQQ", &wave(40)));

    let outcome = run_backtest(&cfg, "", None, &market, &RecordingWriter::default()).unwrap();
    let benchmark = outcome.benchmark.expect("benchmark");
    assert_eq!(benchmark.ticker, "QQQ");
    assert!(market
        .queries
        .borrow()
        .iter()
        .all(|q| q.start == Some(DAY * 5)));
    assert!(
        (benchmark.excess_return - (outcome.summary.total_return - benchmark.benchmark_return))
            .abs()
            < 1e-12
    );
}

#[test]
fn evaluate_signal_degrades_to_hold_then_reports_last_bar() {
    let cfg = config("");
    let short = FakeMarketDataRepo::default().with("SPY", bars_from_closes("SPY", &[1.0, 2.0]));
    let signal = evaluate_signal(&cfg, "spy", &short).unwrap();
    assert_eq!(signal.action, ActionType::Hold);
    assert_eq!(signal.reason, "insufficient data");

    let long = FakeMarketDataRepo::default().with("SPY", bars_from_closes("SPY", &wave(50)));
    let signal = evaluate_signal(&cfg, "SPY", &long).unwrap();
    assert_eq!(signal.timestamp, 50 * DAY);
    assert_eq!(signal.strategy, "ma_crossover");

    let empty = FakeMarketDataRepo::default().with("SPY", Vec::new());
    assert!(matches!(
        evaluate_signal(&cfg, "SPY", &empty),
        Err(TickwiseError::InsufficientData { available: 0, .. })
    ));
}

#[test]
fn watchlist_keeps_going_past_failures() {
    let cfg = config("");
    let market = FakeMarketDataRepo::default().with("SPY", bars_from_closes("SPY", &wave(30)));
    let results = evaluate_watchlist(&cfg, &["SPY".to_string(), "NOPE".to_string()], &market);
    assert_eq!(results.len(), 2);
    assert!(results[0].1.is_ok());
    assert!(results[1].1.is_err());
}

#[test]
fn oversell_is_rejected_and_not_stored() {
    let repo = FakeLedgerRepo::default();
    let bought = record_trade(&repo, NewTransaction::buy("aapl", 10.0, 100.0, DAY)).unwrap();
    assert_eq!(bought.id, 1);
    assert_eq!(bought.ticker, "AAPL");

    let err = record_trade(&repo, NewTransaction::sell("AAPL", 15.0, 110.0, 2 * DAY)).unwrap_err();
    match err {
        TickwiseError::InsufficientShares {
            requested, held, ..
        } => {
            assert_eq!(requested, 15.0);
            assert_eq!(held, 10.0);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(repo.stored.borrow().len(), 1);

    let sold = record_trade(
        &repo,
        NewTransaction::sell("AAPL", 4.0, 110.0, 2 * DAY).with_notes("trim"),
    )
    .unwrap();
    assert_eq!(sold.id, 2);
    assert_eq!(list_transactions(&repo, Some(1)).unwrap(), vec![sold]);
    assert_eq!(list_transactions(&repo, None).unwrap().len(), 2);
}

#[test]
fn portfolio_snapshot_values_positions_and_history() {
    let ledger = FakeLedgerRepo::default();
    record_trade(&ledger, NewTransaction::buy("AAPL", 10.0, 100.0, DAY)).unwrap();
    record_trade(&ledger, NewTransaction::buy("MSFT", 2.0, 50.0, DAY)).unwrap();

    let valuations = FakeValuationRepo::default();
    let prices = BTreeMap::from([("aapl".to_string(), 120.0)]);
    let snapshot = get_portfolio_snapshot(&ledger, Some(&valuations), &prices, Period::All)
        .expect("snapshot");
    assert_eq!(snapshot.positions.len(), 2);
    assert_eq!(snapshot.missing_prices, vec!["MSFT".to_string()]);
    assert!((snapshot.totals.total_value - 1_300.0).abs() < 1e-9);
    assert!((snapshot.totals.total_pl - 200.0).abs() < 1e-9);
    assert!(snapshot.metrics.is_none());

    store_valuation(&valuations, DAY, &ValuationTotals {
        total_value: 1_000.0,
        total_cost: 1_000.0,
        total_pl: 0.0,
        total_pl_pct: 0.0,
    })
    .unwrap();
    store_valuation(&valuations, 11 * DAY, &snapshot.totals).unwrap();
    let snapshot = get_portfolio_snapshot(&ledger, Some(&valuations), &prices, Period::All)
        .expect("snapshot");
    let metrics = snapshot.metrics.expect("two points give a report");
    assert_eq!(metrics.days_held, 10);
    assert!((metrics.absolute_return - 300.0).abs() < 1e-9);
}

#[test]
fn latest_prices_prefer_overrides() {
    let market = FakeMarketDataRepo::default()
        .with("AAPL", bars_from_closes("AAPL", &[10.0, 11.0, 12.0]))
        .with("MSFT", bars_from_closes("MSFT", &[20.0]));
    let overrides = BTreeMap::from([("msft".to_string(), 25.0)]);
    let prices = latest_prices(
        &market,
        &["AAPL".to_string(), "MSFT".to_string(), "TSLA".to_string()],
        &overrides,
    );
    assert_eq!(prices.get("AAPL"), Some(&12.0));
    assert_eq!(prices.get("MSFT"), Some(&25.0));
    assert!(!prices.contains_key("TSLA"));
}

#[test]
fn strict_validation_fails_on_duplicates() {
    let mut bars = bars_from_closes("SPY", &wave(10));
    bars[3].timestamp = bars[2].timestamp;
    let market = FakeMarketDataRepo::default().with("SPY", bars);
    let cfg = config("");

    let report = validate(&cfg, false, &market).expect("lenient validation");
    assert_eq!(report["tickers"][0]["ticker"], "SPY");
    assert_eq!(report["tickers"][0]["ok"], false);

    let err = validate(&cfg, true, &market).unwrap_err();
    assert!(matches!(err, TickwiseError::DataIntegrity { timestamp, .. } if timestamp == 3 * DAY));
}

#[test]
fn indicator_series_is_aligned_with_bars() {
    let market = FakeMarketDataRepo::default().with("SPY", bars_from_closes("SPY", &wave(20)));
    let spec = IndicatorSpec::parse("sma:5").unwrap();
    let rows = indicator_series(&config(""), "SPY", &spec, &market).unwrap();
    assert_eq!(rows.len(), 20);
    assert!(rows[..4].iter().all(|r| r.value.is_none()));
    assert!(rows[4..].iter().all(|r| r.value.is_some()));
}
