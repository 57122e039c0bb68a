use serde::Deserialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tickwise_domain::entities::ledger::normalize_ticker;
use tickwise_domain::repositories::market_data::{MarketDataRepository, OhlcvQuery};
use tickwise_domain::services::ohlcv::{data_quality_from_bars, DataQualityReport};
use tickwise_domain::value_objects::bar::Bar;
use tickwise_domain::value_objects::timestamp::parse_timestamp;

#[derive(Debug, Deserialize)]
pub struct OhlcvRecord {
    pub timestamp: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Daily bars stored one file per ticker as `<data_dir>/<TICKER>.csv`.
#[derive(Debug, Clone)]
pub struct CsvMarketDataRepository {
    data_dir: PathBuf,
}

impl CsvMarketDataRepository {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn path_for(&self, ticker: &str) -> PathBuf {
        self.data_dir.join(format!("{}.csv", normalize_ticker(ticker)))
    }
}

impl MarketDataRepository for CsvMarketDataRepository {
    fn load_ohlcv(&self, query: &OhlcvQuery) -> Result<(Vec<Bar>, DataQualityReport), String> {
        let ticker = normalize_ticker(&query.ticker);
        let path = self.path_for(&ticker);
        let start = Instant::now();
        let _span = tracing::info_span!(
            "infra.csv.load_ohlcv",
            ticker = %ticker,
            path = %path.display()
        )
        .entered();

        match load_csv(&path, &ticker) {
            Ok(bars) => {
                let bars: Vec<Bar> = bars
                    .into_iter()
                    .filter(|bar| query.contains(bar.timestamp))
                    .collect();
                let report = data_quality_from_bars(&bars, query.max_gap_seconds);
                metrics::counter!("tickwise.infra.csv.load_ohlcv.calls_total", "result" => "ok")
                    .increment(1);
                metrics::histogram!("tickwise.infra.csv.load_ohlcv_ms")
                    .record(start.elapsed().as_secs_f64() * 1000.0);
                tracing::debug!(bars = bars.len(), "loaded OHLCV");
                Ok((bars, report))
            }
            Err(err) => {
                metrics::counter!("tickwise.infra.csv.load_ohlcv.calls_total", "result" => "err")
                    .increment(1);
                tracing::warn!(error = %err, "failed to load OHLCV");
                Err(err)
            }
        }
    }
}

/// Reads every row of an OHLCV file in stored order. Ordering and duplicate checks are
/// left to the quality report so that callers can see them.
pub fn load_csv(path: &Path, ticker: &str) -> Result<Vec<Bar>, String> {
    let file = File::open(path)
        .map_err(|err| format!("failed to open OHLCV CSV {}: {}", path.display(), err))?;
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(file);

    let mut bars = Vec::new();
    for (idx, result) in reader.deserialize::<OhlcvRecord>().enumerate() {
        let record = result.map_err(|err| {
            format!("failed to parse {} row {}: {}", path.display(), idx + 2, err)
        })?;
        let timestamp = parse_timestamp(&record.timestamp)
            .map_err(|err| format!("{} row {}: {}", path.display(), idx + 2, err))?;
        bars.push(Bar {
            symbol: ticker.to_string(),
            timestamp,
            open: record.open,
            high: record.high,
            low: record.low,
            close: record.close,
            volume: record.volume,
        });
    }
    Ok(bars)
}
