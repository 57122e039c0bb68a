use crate::services::ohlcv::DataQualityReport;
use crate::value_objects::bar::Bar;

#[derive(Debug, Clone)]
pub struct OhlcvQuery {
    pub ticker: String,
    /// Inclusive bounds, epoch seconds.
    pub start: Option<i64>,
    pub end: Option<i64>,
    pub max_gap_seconds: Option<i64>,
}

impl OhlcvQuery {
    pub fn ticker(ticker: &str) -> Self {
        Self {
            ticker: ticker.to_string(),
            start: None,
            end: None,
            max_gap_seconds: None,
        }
    }

    pub fn contains(&self, timestamp: i64) -> bool {
        self.start.map_or(true, |start| timestamp >= start)
            && self.end.map_or(true, |end| timestamp <= end)
    }
}

pub trait MarketDataRepository {
    /// Bars in stored order (not re-sorted) together with their quality report.
    fn load_ohlcv(&self, query: &OhlcvQuery) -> Result<(Vec<Bar>, DataQualityReport), String>;
}
