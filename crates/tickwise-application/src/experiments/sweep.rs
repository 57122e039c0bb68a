//! Grid search over strategy parameters. Bars are loaded once and every combination is
//! backtested against the same in-memory copy.

use crate::config::Config;
use crate::shared::build_query;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tickwise_domain::entities::metrics::MetricsSummary;
use tickwise_domain::errors::TickwiseError;
use tickwise_domain::repositories::artifacts::ArtifactWriter;
use tickwise_domain::repositories::market_data::{MarketDataRepository, OhlcvQuery};
use tickwise_domain::services::ohlcv::DataQualityReport;
use tickwise_domain::value_objects::bar::Bar;
use tracing::{info, info_span, warn};

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SweepFile {
    pub base: SweepBase,
    pub sweep: SweepMeta,
    #[serde(default)]
    pub params: Vec<SweepParam>,
    pub leaderboard: Option<LeaderboardConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SweepBase {
    /// Path to the base run config, relative to the sweep file.
    pub config: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SweepMeta {
    pub id: String,
    pub parallelism: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SweepParam {
    pub path: String,
    pub values: Vec<toml::Value>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LeaderboardConfig {
    pub sort_by: Option<String>,
    pub descending: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SweepRunEntry {
    pub run_id: String,
    pub params: BTreeMap<String, toml::Value>,
    pub status: String,
    pub error: Option<String>,
    pub metrics: Option<RunMetrics>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct RunMetrics {
    pub bars_processed: usize,
    pub trades: usize,
    pub total_return: f64,
    pub net_profit: f64,
    pub sharpe: Option<f64>,
    pub max_drawdown: f64,
    pub win_rate: Option<f64>,
    pub profit_factor: Option<f64>,
}

impl From<&MetricsSummary> for RunMetrics {
    fn from(summary: &MetricsSummary) -> Self {
        Self {
            bars_processed: summary.bars_processed,
            trades: summary.trades,
            total_return: summary.total_return,
            net_profit: summary.net_profit,
            sharpe: summary.sharpe,
            max_drawdown: summary.max_drawdown,
            win_rate: summary.win_rate,
            profit_factor: summary.profit_factor,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SweepResult {
    pub sweep_id: String,
    pub sweep_dir: PathBuf,
    pub base_config: String,
    pub runs: Vec<SweepRunEntry>,
}

/// Parameters that would change what is being compared rather than how.
const FORBIDDEN_PREFIXES: &[&str] = &[
    "run.",
    "paths.",
    "benchmark.",
    "watchlist.",
    "strategy.name",
];

pub fn run_sweep(
    sweep_path: &Path,
    market_data: &dyn MarketDataRepository,
    artifacts: &(dyn ArtifactWriter + Sync),
) -> Result<SweepResult, TickwiseError> {
    let (sweep, base_config) = load_sweep_file(sweep_path)?;
    let _span = info_span!("run_sweep", sweep_id = %sweep.sweep.id).entered();

    validate_param_paths(&sweep.params).map_err(TickwiseError::Config)?;

    // Round-trip through the typed config so every defaulted parameter is addressable.
    let base_toml_str =
        crate::config::to_toml_pretty(&base_config).map_err(TickwiseError::Config)?;
    let base_toml_value: toml::Value = toml::from_str(&base_toml_str).map_err(|err| {
        TickwiseError::Config(format!("failed to parse base config TOML as value: {err}"))
    })?;

    let in_memory_market = preload_bars(&base_config, market_data)?;

    let sweep_dir = PathBuf::from(&base_config.paths.out_dir)
        .join("sweeps")
        .join(&sweep.sweep.id);
    std::fs::create_dir_all(&sweep_dir).map_err(|err| {
        TickwiseError::Storage(format!(
            "failed to create sweep dir {}: {err}",
            sweep_dir.display()
        ))
    })?;
    let runs_dir = sweep_dir.join("runs");

    let plans = expand_grid(&sweep.params)
        .into_iter()
        .enumerate()
        .map(|(order_idx, assignment)| {
            plan_run(&sweep.sweep.id, &base_toml_value, order_idx, assignment)
        })
        .collect::<Result<Vec<_>, _>>()
        .map_err(TickwiseError::Config)?;

    let workers = sweep.sweep.parallelism.unwrap_or(1).clamp(1, plans.len().max(1));
    info!(runs = plans.len(), workers, "sweep planned");
    let runs = execute_plans(&plans, workers, &runs_dir, &in_memory_market, artifacts);
    if runs.len() != plans.len() {
        return Err(TickwiseError::Config(format!(
            "sweep lost runs: planned {}, finished {}",
            plans.len(),
            runs.len()
        )));
    }

    let result = SweepResult {
        sweep_id: sweep.sweep.id.clone(),
        sweep_dir: sweep_dir.clone(),
        base_config: resolve_base_config_path(sweep_path, &sweep.base.config)
            .display()
            .to_string(),
        runs,
    };
    metrics::counter!("tickwise.sweep.runs").increment(result.runs.len() as u64);

    write_manifest(&sweep_dir, &result).map_err(TickwiseError::Storage)?;
    write_results_csv(&sweep_dir, &result).map_err(TickwiseError::Storage)?;
    write_leaderboard_csv(&sweep_dir, &result, sweep.leaderboard.as_ref())
        .map_err(TickwiseError::Storage)?;

    Ok(result)
}

#[derive(Debug, Clone)]
struct SweepRunPlan {
    order_idx: usize,
    run_id: String,
    params: BTreeMap<String, toml::Value>,
    config: Config,
    config_toml: String,
}

/// Applies one grid point to the base config and re-parses it, so a value of the wrong
/// type fails here rather than inside the run.
fn plan_run(
    sweep_id: &str,
    base: &toml::Value,
    order_idx: usize,
    params: BTreeMap<String, toml::Value>,
) -> Result<SweepRunPlan, String> {
    let run_id = format!("{}__{}", sweep_id, assignment_hash(&params));
    let mut doc = base.clone();
    for (path, value) in &params {
        set_path_value(&mut doc, path, value.clone())?;
    }
    set_path_value(&mut doc, "run.run_id", toml::Value::String(run_id.clone()))?;

    let config_toml = toml::to_string_pretty(&doc)
        .map_err(|err| format!("failed to serialize config for {run_id}: {err}"))?;
    let config: Config = toml::from_str(&config_toml)
        .map_err(|err| format!("invalid config for {run_id}: {err}"))?;
    Ok(SweepRunPlan {
        order_idx,
        run_id,
        params,
        config,
        config_toml,
    })
}

/// Loads the traded ticker (and the benchmark, when it loads) once for all runs.
fn preload_bars(
    config: &Config,
    market_data: &dyn MarketDataRepository,
) -> Result<InMemoryMarketDataRepository, TickwiseError> {
    let mut repo = InMemoryMarketDataRepository::default();
    let query = build_query(config, &config.run.ticker)?;
    let loaded = market_data
        .load_ohlcv(&query)
        .map_err(|reason| TickwiseError::ProviderUnavailable {
            ticker: query.ticker.clone(),
            reason,
        })?;
    repo.series.insert(query.ticker.clone(), loaded);

    if let Some(benchmark) = config.benchmark_ticker() {
        let query = build_query(config, benchmark)?;
        if !repo.series.contains_key(&query.ticker) {
            match market_data.load_ohlcv(&query) {
                Ok(loaded) => {
                    repo.series.insert(query.ticker.clone(), loaded);
                }
                Err(err) => warn!(benchmark = %query.ticker, error = %err, "benchmark unavailable"),
            }
        }
    }
    Ok(repo)
}

/// A failed run is recorded in the results, it does not abort the sweep.
fn execute_run_plan(
    plan: &SweepRunPlan,
    runs_dir: &Path,
    market_data: &(dyn MarketDataRepository + Sync),
    artifacts: &(dyn ArtifactWriter + Sync),
) -> SweepRunEntry {
    match crate::backtesting::run_backtest(
        &plan.config,
        &plan.config_toml,
        Some(runs_dir.to_path_buf()),
        market_data,
        artifacts,
    ) {
        Ok(outcome) => SweepRunEntry {
            run_id: plan.run_id.clone(),
            params: plan.params.clone(),
            status: "ok".to_string(),
            error: None,
            metrics: Some(RunMetrics::from(&outcome.summary)),
        },
        Err(err) => {
            warn!(run_id = %plan.run_id, error = %err, "sweep run failed");
            SweepRunEntry {
                run_id: plan.run_id.clone(),
                params: plan.params.clone(),
                status: "error".to_string(),
                error: Some(err.to_string()),
                metrics: None,
            }
        }
    }
}

/// Runs the plans on `workers` scoped threads, plan `i` going to worker `i % workers`.
/// Results come back in plan order.
fn execute_plans(
    plans: &[SweepRunPlan],
    workers: usize,
    runs_dir: &Path,
    market_data: &(dyn MarketDataRepository + Sync),
    artifacts: &(dyn ArtifactWriter + Sync),
) -> Vec<SweepRunEntry> {
    if workers <= 1 {
        return plans
            .iter()
            .map(|plan| execute_run_plan(plan, runs_dir, market_data, artifacts))
            .collect();
    }

    let mut finished: Vec<(usize, SweepRunEntry)> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..workers)
            .map(|worker| {
                scope.spawn(move || {
                    plans
                        .iter()
                        .skip(worker)
                        .step_by(workers)
                        .map(|plan| {
                            (
                                plan.order_idx,
                                execute_run_plan(plan, runs_dir, market_data, artifacts),
                            )
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .filter_map(|handle| match handle.join() {
                Ok(done) => Some(done),
                Err(_) => {
                    warn!("sweep worker panicked");
                    None
                }
            })
            .flatten()
            .collect()
    });
    finished.sort_by_key(|(order_idx, _)| *order_idx);
    finished.into_iter().map(|(_, entry)| entry).collect()
}

/// Parses a sweep file together with the base config it points at. A relative base path is
/// resolved against the sweep file's directory.
pub fn load_sweep_file(sweep_path: &Path) -> Result<(SweepFile, Config), TickwiseError> {
    let raw = std::fs::read_to_string(sweep_path).map_err(|err| {
        TickwiseError::Config(format!(
            "failed to read sweep config {}: {err}",
            sweep_path.display()
        ))
    })?;
    let sweep: SweepFile = toml::from_str(&raw).map_err(|err| {
        TickwiseError::Config(format!(
            "failed to parse sweep TOML {}: {err}",
            sweep_path.display()
        ))
    })?;
    let base_config_path = resolve_base_config_path(sweep_path, &sweep.base.config);
    let (base_config, _source) = crate::config::load_config_with_source(&base_config_path)
        .map_err(TickwiseError::Config)?;
    Ok((sweep, base_config))
}

fn resolve_base_config_path(sweep_path: &Path, base: &str) -> PathBuf {
    let p = PathBuf::from(base);
    if p.is_absolute() {
        p
    } else {
        sweep_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(p)
    }
}

fn validate_param_paths(params: &[SweepParam]) -> Result<(), String> {
    for p in params {
        let path = p.path.trim();
        if path.is_empty() {
            return Err("sweep param path cannot be empty".to_string());
        }
        if FORBIDDEN_PREFIXES.iter().any(|pre| path.starts_with(pre)) {
            return Err(format!("sweep param path not allowed: {}", p.path));
        }
        if p.values.is_empty() {
            return Err(format!("sweep param has no values: {}", p.path));
        }
    }
    Ok(())
}

/// Cartesian product of all parameter values; the last parameter varies fastest.
fn expand_grid(params: &[SweepParam]) -> Vec<BTreeMap<String, toml::Value>> {
    params.iter().fold(vec![BTreeMap::new()], |grid, param| {
        grid.iter()
            .flat_map(|point| {
                param.values.iter().map(move |value| {
                    let mut next = point.clone();
                    next.insert(param.path.trim().to_string(), value.clone());
                    next
                })
            })
            .collect()
    })
}

/// First 12 hex chars of the SHA-256 of the assignment's JSON form.
fn assignment_hash(assignment: &BTreeMap<String, toml::Value>) -> String {
    let canonical = serde_json::to_string(assignment).unwrap_or_default();
    let digest = Sha256::digest(canonical.as_bytes());
    digest
        .iter()
        .take(6)
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

/// Overwrites an existing dotted key. Unknown keys are an error so typos do not silently
/// produce identical runs.
fn set_path_value(root: &mut toml::Value, path: &str, value: toml::Value) -> Result<(), String> {
    let mut keys = path.split('.').map(str::trim).filter(|k| !k.is_empty()).peekable();
    let mut node = root;
    while let Some(key) = keys.next() {
        let table = node
            .as_table_mut()
            .ok_or_else(|| format!("path is not a table: {path}"))?;
        let slot = table
            .get_mut(key)
            .ok_or_else(|| format!("path not found: {path}"))?;
        if keys.peek().is_none() {
            *slot = value;
            return Ok(());
        }
        node = slot;
    }
    Err("empty path".to_string())
}

fn write_manifest(dir: &Path, result: &SweepResult) -> Result<(), String> {
    let path = dir.join("manifest.json");
    let json = serde_json::to_string_pretty(result)
        .map_err(|err| format!("failed to serialize manifest: {err}"))?;
    std::fs::write(&path, json)
        .map_err(|err| format!("failed to write {}: {err}", path.display()))?;
    Ok(())
}

fn params_label(params: &BTreeMap<String, toml::Value>) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(";")
}

#[derive(Serialize)]
struct ResultRow<'a> {
    run_id: &'a str,
    params: String,
    status: &'a str,
    bars_processed: Option<usize>,
    trades: Option<usize>,
    total_return: Option<f64>,
    net_profit: Option<f64>,
    sharpe: Option<f64>,
    max_drawdown: Option<f64>,
    win_rate: Option<f64>,
    profit_factor: Option<f64>,
    error: Option<&'a str>,
}

#[derive(Serialize)]
struct LeaderboardRow<'a> {
    rank: usize,
    run_id: &'a str,
    params: String,
    trades: usize,
    total_return: f64,
    sharpe: Option<f64>,
    max_drawdown: f64,
    win_rate: Option<f64>,
    profit_factor: Option<f64>,
}

fn write_rows<T: Serialize>(path: &Path, rows: impl IntoIterator<Item = T>) -> Result<(), String> {
    let mut wtr = csv::Writer::from_path(path)
        .map_err(|err| format!("failed to create {}: {err}", path.display()))?;
    for row in rows {
        wtr.serialize(row)
            .map_err(|err| format!("failed to write {}: {err}", path.display()))?;
    }
    wtr.flush()
        .map_err(|err| format!("failed to flush {}: {err}", path.display()))
}

fn write_results_csv(dir: &Path, result: &SweepResult) -> Result<(), String> {
    let rows = result.runs.iter().map(|r| {
        let m = r.metrics;
        ResultRow {
            run_id: &r.run_id,
            params: params_label(&r.params),
            status: &r.status,
            bars_processed: m.map(|m| m.bars_processed),
            trades: m.map(|m| m.trades),
            total_return: m.map(|m| m.total_return),
            net_profit: m.map(|m| m.net_profit),
            sharpe: m.and_then(|m| m.sharpe),
            max_drawdown: m.map(|m| m.max_drawdown),
            win_rate: m.and_then(|m| m.win_rate),
            profit_factor: m.and_then(|m| m.profit_factor),
            error: r.error.as_deref(),
        }
    });
    write_rows(&dir.join("results.csv"), rows)
}

/// Successful runs ordered by the chosen metric. Runs where the metric is undefined rank
/// last regardless of direction.
fn leaderboard<'a>(
    result: &'a SweepResult,
    cfg: Option<&LeaderboardConfig>,
) -> Vec<(&'a SweepRunEntry, RunMetrics)> {
    let sort_by = cfg
        .and_then(|c| c.sort_by.as_deref())
        .unwrap_or("sharpe")
        .trim()
        .to_lowercase();
    let descending = cfg.and_then(|c| c.descending).unwrap_or(true);

    let mut rows: Vec<(&SweepRunEntry, RunMetrics)> = result
        .runs
        .iter()
        .filter(|r| r.status == "ok")
        .filter_map(|r| r.metrics.map(|m| (r, m)))
        .collect();
    rows.sort_by(|(_, a), (_, b)| {
        match (metric_value(a, &sort_by), metric_value(b, &sort_by)) {
            (Some(av), Some(bv)) => {
                let ord = av.partial_cmp(&bv).unwrap_or(std::cmp::Ordering::Equal);
                if descending {
                    ord.reverse()
                } else {
                    ord
                }
            }
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        }
    });
    rows
}

fn write_leaderboard_csv(
    dir: &Path,
    result: &SweepResult,
    cfg: Option<&LeaderboardConfig>,
) -> Result<(), String> {
    let rows = leaderboard(result, cfg)
        .into_iter()
        .enumerate()
        .map(|(idx, (r, m))| LeaderboardRow {
            rank: idx + 1,
            run_id: &r.run_id,
            params: params_label(&r.params),
            trades: m.trades,
            total_return: m.total_return,
            sharpe: m.sharpe,
            max_drawdown: m.max_drawdown,
            win_rate: m.win_rate,
            profit_factor: m.profit_factor,
        });
    write_rows(&dir.join("leaderboard.csv"), rows)
}

fn metric_value(m: &RunMetrics, key: &str) -> Option<f64> {
    match key {
        "total_return" | "return" => Some(m.total_return),
        "net_profit" => Some(m.net_profit),
        "max_drawdown" | "max_dd" => Some(m.max_drawdown),
        "trades" => Some(m.trades as f64),
        "win_rate" => m.win_rate,
        "profit_factor" => m.profit_factor,
        _ => m.sharpe,
    }
}

#[derive(Default)]
struct InMemoryMarketDataRepository {
    series: BTreeMap<String, (Vec<Bar>, DataQualityReport)>,
}

impl MarketDataRepository for InMemoryMarketDataRepository {
    fn load_ohlcv(&self, query: &OhlcvQuery) -> Result<(Vec<Bar>, DataQualityReport), String> {
        self.series
            .get(&query.ticker)
            .cloned()
            .ok_or_else(|| format!("{} was not preloaded for this sweep", query.ticker))
    }
}
