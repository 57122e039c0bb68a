use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tickwise_domain::errors::TickwiseError;
use tickwise_domain::services::engine::backtest::FillPolicy;
use tickwise_domain::services::strategy::registry::describe;
use tickwise_domain::services::strategy::StrategyParams;

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub run: RunConfig,
    pub paths: PathsConfig,
    #[serde(default)]
    pub costs: CostsConfig,
    pub execution: Option<ExecutionConfig>,
    #[serde(default)]
    pub strategy: StrategyParams,
    pub benchmark: Option<BenchmarkConfig>,
    pub metrics: Option<MetricsConfig>,
    pub data_quality: Option<DataQualityConfig>,
    pub watchlist: Option<WatchlistConfig>,
    pub report: Option<ReportConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    pub run_id: String,
    pub ticker: String,
    pub initial_capital: f64,
    /// RFC3339, `YYYY-MM-DD` or epoch seconds; inclusive.
    pub start: Option<String>,
    pub end: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct PathsConfig {
    /// Holds one `<TICKER>.csv` per ticker.
    pub data_dir: String,
    pub out_dir: String,
    pub ledger_path: Option<String>,
    pub valuation_path: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct CostsConfig {
    pub fee_bps: f64,
}

impl Default for CostsConfig {
    fn default() -> Self {
        Self { fee_bps: 10.0 }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ExecutionConfig {
    pub fill: Option<FillPolicy>,
    pub liquidate_at_end: Option<bool>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct BenchmarkConfig {
    pub ticker: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    pub risk_free_rate: Option<f64>,
    pub annualization_factor: Option<f64>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct DataQualityConfig {
    /// Largest spacing between consecutive bars not reported as a gap.
    pub max_gap_days: Option<u32>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct WatchlistConfig {
    pub tickers: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ReportConfig {
    pub html: Option<bool>,
}

impl Config {
    /// Replaces the strategy section with the defaults of `name`, unless the configured
    /// strategy already is `name` (then its parameters are kept).
    pub fn override_strategy(&mut self, name: &str) -> Result<(), TickwiseError> {
        let descriptor = describe(name)?;
        if descriptor.name != self.strategy.name() {
            self.strategy = StrategyParams::defaults_for(descriptor.name)?;
        }
        Ok(())
    }

    pub fn override_fill(&mut self, fill: FillPolicy) {
        let execution = self.execution.get_or_insert(ExecutionConfig {
            fill: None,
            liquidate_at_end: None,
        });
        execution.fill = Some(fill);
    }

    pub fn benchmark_ticker(&self) -> Option<&str> {
        self.benchmark
            .as_ref()
            .and_then(|b| b.ticker.as_deref())
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    pub fn watchlist(&self) -> Vec<String> {
        self.watchlist
            .as_ref()
            .map(|w| w.tickers.clone())
            .unwrap_or_default()
    }
}

pub fn load_config(path: &Path) -> Result<Config, String> {
    let (config, _source) = load_config_with_source(path)?;
    Ok(config)
}

pub fn load_config_with_source(path: &Path) -> Result<(Config, String), String> {
    let contents = fs::read_to_string(path)
        .map_err(|err| format!("failed to read config {}: {}", path.display(), err))?;
    let config = toml::from_str(&contents)
        .map_err(|err| format!("failed to parse TOML {}: {}", path.display(), err))?;
    Ok((config, contents))
}

pub fn to_toml_pretty(config: &Config) -> Result<String, String> {
    toml::to_string_pretty(config)
        .map_err(|err| format!("failed to serialize config as TOML: {err}"))
}
