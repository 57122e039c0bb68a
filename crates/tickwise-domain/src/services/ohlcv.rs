use crate::errors::TickwiseError;
use crate::value_objects::bar::Bar;
use serde::Serialize;

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct DataQualityReport {
    pub bars: usize,
    pub duplicates: usize,
    pub gaps: usize,
    pub out_of_order: usize,
    pub invalid_prices: usize,
    pub first_timestamp: Option<i64>,
    pub last_timestamp: Option<i64>,
    pub first_gap: Option<i64>,
    pub first_duplicate: Option<i64>,
    pub first_out_of_order: Option<i64>,
    pub first_invalid_price: Option<i64>,
    pub largest_gap_seconds: Option<i64>,
}

impl DataQualityReport {
    /// Duplicates, ordering faults and invalid prices. Gaps are reported but are not
    /// integrity faults on their own (weekends and holidays).
    pub fn has_integrity_issues(&self) -> bool {
        self.duplicates + self.out_of_order + self.invalid_prices > 0
    }
}

/// Scans bars in stored order. `max_gap_seconds` is the largest spacing that is not
/// reported as a gap; `None` disables gap detection.
pub fn data_quality_from_bars(bars: &[Bar], max_gap_seconds: Option<i64>) -> DataQualityReport {
    let mut report = DataQualityReport {
        bars: bars.len(),
        ..DataQualityReport::default()
    };
    let (Some(first), Some(last)) = (bars.first(), bars.last()) else {
        return report;
    };
    report.first_timestamp = Some(first.timestamp);
    report.last_timestamp = Some(last.timestamp);

    let mut last_ts: Option<i64> = None;
    for bar in bars {
        let ts = bar.timestamp;
        if invalid_price_reason(bar).is_some() {
            report.invalid_prices += 1;
            report.first_invalid_price.get_or_insert(ts);
        }

        if let Some(prev) = last_ts {
            if ts == prev {
                report.duplicates += 1;
                report.first_duplicate.get_or_insert(ts);
            } else if ts < prev {
                report.out_of_order += 1;
                report.first_out_of_order.get_or_insert(ts);
            } else if let Some(limit) = max_gap_seconds {
                let diff = ts - prev;
                if diff > limit.max(1) {
                    report.gaps += 1;
                    report.first_gap.get_or_insert(ts);
                    report.largest_gap_seconds =
                        Some(report.largest_gap_seconds.map_or(diff, |cur| cur.max(diff)));
                }
            }
        }
        last_ts = Some(ts);
    }
    report
}

fn invalid_price_reason(bar: &Bar) -> Option<String> {
    let prices = [bar.open, bar.high, bar.low, bar.close];
    if prices.iter().any(|p| !p.is_finite() || *p <= 0.0) {
        return Some(format!(
            "non-positive or non-finite price (o={} h={} l={} c={})",
            bar.open, bar.high, bar.low, bar.close
        ));
    }
    if bar.high < bar.low {
        return Some(format!("high {} below low {}", bar.high, bar.low));
    }
    if !bar.volume.is_finite() || bar.volume < 0.0 {
        return Some(format!("invalid volume {}", bar.volume));
    }
    None
}

/// Fails on the first bar that breaks strict timestamp order or carries an invalid price.
pub fn validate_bars(ticker: &str, bars: &[Bar]) -> Result<(), TickwiseError> {
    let mut prev: Option<i64> = None;
    for bar in bars {
        if let Some(prev) = prev {
            if bar.timestamp == prev {
                return Err(TickwiseError::data_integrity(
                    ticker,
                    bar.timestamp,
                    "duplicate bar timestamp",
                ));
            }
            if bar.timestamp < prev {
                return Err(TickwiseError::data_integrity(
                    ticker,
                    bar.timestamp,
                    format!("bar out of order (previous timestamp {})", prev),
                ));
            }
        }
        if let Some(reason) = invalid_price_reason(bar) {
            return Err(TickwiseError::data_integrity(ticker, bar.timestamp, reason));
        }
        prev = Some(bar.timestamp);
    }
    Ok(())
}
