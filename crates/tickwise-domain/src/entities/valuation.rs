use super::metrics::{period_returns, sample_std};
use crate::value_objects::position::Position;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

const SECONDS_PER_DAY: i64 = 86_400;
const TRADING_DAYS: f64 = 252.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionValuation {
    pub ticker: String,
    pub shares: f64,
    pub cost_basis: f64,
    pub purchase_date: i64,
    /// `None` when no price was supplied; the position is then carried at cost.
    pub current_price: Option<f64>,
    pub cost: f64,
    pub current_value: f64,
    pub pl: f64,
    pub pl_pct: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValuationTotals {
    pub total_value: f64,
    pub total_cost: f64,
    pub total_pl: f64,
    pub total_pl_pct: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PortfolioValuation {
    pub positions: Vec<PositionValuation>,
    pub totals: ValuationTotals,
    pub missing_prices: Vec<String>,
}

/// Marks positions to the supplied prices. The ledger holds no prices of its own.
pub fn value_positions<'a>(
    positions: impl IntoIterator<Item = &'a Position>,
    prices: &BTreeMap<String, f64>,
) -> PortfolioValuation {
    let mut valuation = PortfolioValuation::default();
    for pos in positions {
        let cost = pos.total_cost();
        let price = prices
            .get(&pos.ticker)
            .copied()
            .filter(|p| p.is_finite() && *p > 0.0);
        let current_value = match price {
            Some(price) => pos.shares * price,
            None => {
                valuation.missing_prices.push(pos.ticker.clone());
                cost
            }
        };
        let pl = current_value - cost;
        valuation.totals.total_value += current_value;
        valuation.totals.total_cost += cost;
        valuation.positions.push(PositionValuation {
            ticker: pos.ticker.clone(),
            shares: pos.shares,
            cost_basis: pos.cost_basis,
            purchase_date: pos.purchase_date,
            current_price: price,
            cost,
            current_value,
            pl,
            pl_pct: ratio(pl, cost),
        });
    }
    let totals = &mut valuation.totals;
    totals.total_pl = totals.total_value - totals.total_cost;
    totals.total_pl_pct = ratio(totals.total_pl, totals.total_cost);
    valuation
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

/// One stored point of portfolio value history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationRecord {
    pub timestamp: i64,
    pub total_value: f64,
    pub total_cost: f64,
    pub total_pl: f64,
    pub total_pl_pct: f64,
}

impl ValuationRecord {
    pub fn from_totals(timestamp: i64, totals: &ValuationTotals) -> Self {
        Self {
            timestamp,
            total_value: totals.total_value,
            total_cost: totals.total_cost,
            total_pl: totals.total_pl,
            total_pl_pct: totals.total_pl_pct,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Day,
    Week,
    Month,
    Year,
    #[default]
    All,
}

impl Period {
    pub fn parse(value: &str) -> Result<Self, String> {
        match value.trim().to_ascii_lowercase().as_str() {
            "day" => Ok(Period::Day),
            "week" => Ok(Period::Week),
            "month" => Ok(Period::Month),
            "year" => Ok(Period::Year),
            "all" => Ok(Period::All),
            other => Err(format!(
                "invalid period '{}' (expected day, week, month, year or all)",
                other
            )),
        }
    }

    pub fn days(&self) -> Option<i64> {
        match self {
            Period::Day => Some(1),
            Period::Week => Some(7),
            Period::Month => Some(30),
            Period::Year => Some(365),
            Period::All => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Day => "day",
            Period::Week => "week",
            Period::Month => "month",
            Period::Year => "year",
            Period::All => "all",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceReport {
    pub period: Period,
    pub start_timestamp: i64,
    pub end_timestamp: i64,
    pub start_value: f64,
    pub end_value: f64,
    pub absolute_return: f64,
    pub percent_return: f64,
    pub annualized_return: f64,
    pub volatility: Option<f64>,
    pub sharpe: Option<f64>,
    pub days_held: i64,
}

/// Performance over the trailing `period`, anchored at the latest record.
/// Returns `None` with fewer than two records in the window.
pub fn performance_report(
    records: &[ValuationRecord],
    period: Period,
) -> Option<PerformanceReport> {
    let mut window: Vec<&ValuationRecord> = records.iter().collect();
    window.sort_by_key(|r| r.timestamp);
    let latest = window.last()?.timestamp;
    if let Some(days) = period.days() {
        let cutoff = latest - days * SECONDS_PER_DAY;
        window.retain(|r| r.timestamp >= cutoff);
    }
    if window.len() < 2 {
        return None;
    }
    let first = window.first()?;
    let last = window.last()?;

    let absolute_return = last.total_value - first.total_value;
    let percent_return = ratio(absolute_return, first.total_value);
    let days_held = (last.timestamp - first.timestamp) / SECONDS_PER_DAY;
    let annualized_return = if days_held > 0 {
        (1.0 + percent_return).powf(365.0 / days_held as f64) - 1.0
    } else {
        0.0
    };
    let returns = period_returns(window.iter().map(|r| r.total_value));
    let volatility = sample_std(&returns).map(|std| std * TRADING_DAYS.sqrt());
    let sharpe = volatility
        .filter(|v| *v > 0.0)
        .map(|v| annualized_return / v);

    Some(PerformanceReport {
        period,
        start_timestamp: first.timestamp,
        end_timestamp: last.timestamp,
        start_value: first.total_value,
        end_value: last.total_value,
        absolute_return,
        percent_return,
        annualized_return,
        volatility,
        sharpe,
        days_held,
    })
}

#[cfg(test)]
mod tests {
    use super::{performance_report, value_positions, Period, ValuationRecord};
    use crate::value_objects::position::Position;
    use std::collections::BTreeMap;

    fn position(ticker: &str, shares: f64, cost_basis: f64) -> Position {
        Position {
            ticker: ticker.to_string(),
            shares,
            cost_basis,
            purchase_date: 0,
        }
    }

    fn record(day: i64, value: f64) -> ValuationRecord {
        ValuationRecord {
            timestamp: day * 86_400,
            total_value: value,
            total_cost: 100.0,
            total_pl: value - 100.0,
            total_pl_pct: value / 100.0 - 1.0,
        }
    }

    #[test]
    fn values_positions_and_carries_missing_prices_at_cost() {
        let positions = vec![position("AAPL", 10.0, 100.0), position("MSFT", 5.0, 200.0)];
        let mut prices = BTreeMap::new();
        prices.insert("AAPL".to_string(), 120.0);

        let valuation = value_positions(&positions, &prices);
        assert_eq!(valuation.missing_prices, vec!["MSFT".to_string()]);
        let aapl = &valuation.positions[0];
        assert_eq!(aapl.current_value, 1200.0);
        assert_eq!(aapl.pl, 200.0);
        assert!((aapl.pl_pct - 0.2).abs() < 1e-12);
        let msft = &valuation.positions[1];
        assert_eq!(msft.current_price, None);
        assert_eq!(msft.pl, 0.0);
        assert_eq!(valuation.totals.total_value, 2200.0);
        assert_eq!(valuation.totals.total_cost, 2000.0);
        assert!((valuation.totals.total_pl_pct - 0.1).abs() < 1e-12);
    }

    #[test]
    fn report_needs_two_points_in_window() {
        let records = vec![record(0, 100.0), record(10, 110.0)];
        assert!(performance_report(&records, Period::Week).is_none());
        let all = performance_report(&records, Period::All).unwrap();
        assert_eq!(all.days_held, 10);
        assert!((all.percent_return - 0.1).abs() < 1e-12);
        assert!(all.annualized_return > all.percent_return);
        assert!(performance_report(&records[..1], Period::All).is_none());
    }

    #[test]
    fn flat_history_has_no_sharpe() {
        let records = vec![record(0, 100.0), record(1, 100.0), record(2, 100.0)];
        let report = performance_report(&records, Period::Month).unwrap();
        assert_eq!(report.volatility, Some(0.0));
        assert_eq!(report.sharpe, None);
        assert_eq!(report.annualized_return, 0.0);
    }

    #[test]
    fn parses_periods() {
        assert_eq!(Period::parse("Month").unwrap(), Period::Month);
        assert!(Period::parse("decade").is_err());
    }
}
