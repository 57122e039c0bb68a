//! Incremental technical indicators.
//!
//! Every indicator consumes bars one at a time and yields `None` until it has seen its
//! lookback. Values never depend on bars after the one being processed, so a value computed
//! over a prefix equals the value at the same position over the full series.

pub mod momentum;
pub mod rolling;
pub mod snapshot;
pub mod trend;
pub mod volatility;
pub mod volume;

use crate::errors::TickwiseError;
use crate::value_objects::bar::Bar;
use serde::Serialize;
use std::fmt;

pub use momentum::{Rsi, Stochastic};
pub use snapshot::IndicatorSnapshot;
pub use trend::{Ema, MaKind, Macd, MovingAverage, Sma};
pub use volatility::{Atr, BollingerBands};
pub use volume::Obv;

/// Largest window any indicator or strategy accepts.
pub const MAX_PERIOD: usize = 100_000;

pub(crate) fn check_periods(owner: &str, periods: &[usize]) -> Result<(), TickwiseError> {
    if periods.iter().any(|p| *p == 0) {
        return Err(TickwiseError::Config(format!(
            "{} periods must be positive",
            owner
        )));
    }
    if let Some(p) = periods.iter().find(|p| **p > MAX_PERIOD) {
        return Err(TickwiseError::Config(format!(
            "{} period {} exceeds the maximum of {}",
            owner, p, MAX_PERIOD
        )));
    }
    Ok(())
}

pub trait Indicator {
    type Output;

    fn name(&self) -> &'static str;

    /// Bars needed before the first defined value.
    fn lookback(&self) -> usize;

    fn on_bar(&mut self, bar: &Bar) -> Option<Self::Output>;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MacdValue {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BandsValue {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

impl BandsValue {
    /// Position of `close` inside the bands; `None` when the bands have collapsed.
    pub fn percent_b(&self, close: f64) -> Option<f64> {
        let width = self.upper - self.lower;
        if width <= 0.0 {
            return None;
        }
        Some((close - self.lower) / width)
    }

    pub fn bandwidth(&self) -> Option<f64> {
        if self.middle == 0.0 {
            return None;
        }
        Some((self.upper - self.lower) / self.middle)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StochasticValue {
    pub k: f64,
    pub d: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum IndicatorValue {
    Scalar(f64),
    Macd(MacdValue),
    Bands(BandsValue),
    Stochastic(StochasticValue),
}

impl IndicatorValue {
    pub fn is_finite(&self) -> bool {
        match self {
            IndicatorValue::Scalar(v) => v.is_finite(),
            IndicatorValue::Macd(v) => {
                v.macd.is_finite() && v.signal.is_finite() && v.histogram.is_finite()
            }
            IndicatorValue::Bands(v) => {
                v.upper.is_finite() && v.middle.is_finite() && v.lower.is_finite()
            }
            IndicatorValue::Stochastic(v) => v.k.is_finite() && v.d.is_finite(),
        }
    }

    /// Column names matching `columns()`.
    pub fn labels(&self) -> &'static [&'static str] {
        match self {
            IndicatorValue::Scalar(_) => &["value"],
            IndicatorValue::Macd(_) => &["macd", "signal", "histogram"],
            IndicatorValue::Bands(_) => &["upper", "middle", "lower"],
            IndicatorValue::Stochastic(_) => &["k", "d"],
        }
    }

    pub fn columns(&self) -> Vec<f64> {
        match self {
            IndicatorValue::Scalar(v) => vec![*v],
            IndicatorValue::Macd(v) => vec![v.macd, v.signal, v.histogram],
            IndicatorValue::Bands(v) => vec![v.upper, v.middle, v.lower],
            IndicatorValue::Stochastic(v) => vec![v.k, v.d],
        }
    }
}

/// Declarative indicator selection, parsed from strings such as `rsi:14` or
/// `macd:12,26,9`.
#[derive(Debug, Clone, PartialEq)]
pub enum IndicatorSpec {
    Sma { period: usize },
    Ema { period: usize },
    Rsi { period: usize },
    Macd { fast: usize, slow: usize, signal: usize },
    Bollinger { period: usize, multiplier: f64 },
    Stochastic { k: usize, d: usize, smooth: usize },
    Atr { period: usize },
    Obv,
}

pub const INDICATOR_NAMES: &[&str] = &[
    "sma",
    "ema",
    "rsi",
    "macd",
    "bollinger",
    "stochastic",
    "atr",
    "obv",
];

impl IndicatorSpec {
    pub fn parse(raw: &str) -> Result<Self, TickwiseError> {
        let raw = raw.trim();
        let (name, args) = match raw.split_once(':') {
            Some((name, args)) => (name.trim().to_ascii_lowercase(), args.trim()),
            None => (raw.to_ascii_lowercase(), ""),
        };
        let values: Vec<&str> = if args.is_empty() {
            Vec::new()
        } else {
            args.split(',').map(str::trim).collect()
        };
        let int = |idx: usize, default: usize| -> Result<usize, TickwiseError> {
            match values.get(idx) {
                None => Ok(default),
                Some(value) => value.parse::<usize>().map_err(|err| {
                    TickwiseError::Config(format!(
                        "invalid argument '{}' for indicator '{}': {}",
                        value, name, err
                    ))
                }),
            }
        };

        let spec = match name.as_str() {
            "sma" => IndicatorSpec::Sma { period: int(0, 20)? },
            "ema" => IndicatorSpec::Ema { period: int(0, 20)? },
            "rsi" => IndicatorSpec::Rsi { period: int(0, 14)? },
            "macd" => IndicatorSpec::Macd {
                fast: int(0, 12)?,
                slow: int(1, 26)?,
                signal: int(2, 9)?,
            },
            "bollinger" | "bb" => {
                let multiplier = match values.get(1) {
                    None => 2.0,
                    Some(value) => value.parse::<f64>().map_err(|err| {
                        TickwiseError::Config(format!(
                            "invalid multiplier '{}' for bollinger: {}",
                            value, err
                        ))
                    })?,
                };
                IndicatorSpec::Bollinger {
                    period: int(0, 20)?,
                    multiplier,
                }
            }
            "stochastic" | "stoch" => IndicatorSpec::Stochastic {
                k: int(0, 14)?,
                d: int(1, 3)?,
                smooth: int(2, 3)?,
            },
            "atr" => IndicatorSpec::Atr { period: int(0, 14)? },
            "obv" => IndicatorSpec::Obv,
            other => {
                return Err(TickwiseError::Config(format!(
                    "unknown indicator '{}' (expected one of: {})",
                    other,
                    INDICATOR_NAMES.join(", ")
                )))
            }
        };
        spec.validate()?;
        Ok(spec)
    }

    pub fn validate(&self) -> Result<(), TickwiseError> {
        let periods: Vec<usize> = match self {
            IndicatorSpec::Sma { period }
            | IndicatorSpec::Ema { period }
            | IndicatorSpec::Rsi { period }
            | IndicatorSpec::Atr { period } => vec![*period],
            IndicatorSpec::Macd { fast, slow, signal } => {
                if fast >= slow {
                    return Err(TickwiseError::Config(format!(
                        "macd fast period ({}) must be shorter than slow period ({})",
                        fast, slow
                    )));
                }
                vec![*fast, *slow, *signal]
            }
            IndicatorSpec::Bollinger { period, multiplier } => {
                if !multiplier.is_finite() || *multiplier <= 0.0 {
                    return Err(TickwiseError::Config(format!(
                        "bollinger multiplier must be positive, got {}",
                        multiplier
                    )));
                }
                vec![*period]
            }
            IndicatorSpec::Stochastic { k, d, smooth } => vec![*k, *d, *smooth],
            IndicatorSpec::Obv => Vec::new(),
        };
        check_periods(&format!("indicator {}", self), &periods)
    }

    pub fn name(&self) -> &'static str {
        match self {
            IndicatorSpec::Sma { .. } => "sma",
            IndicatorSpec::Ema { .. } => "ema",
            IndicatorSpec::Rsi { .. } => "rsi",
            IndicatorSpec::Macd { .. } => "macd",
            IndicatorSpec::Bollinger { .. } => "bollinger",
            IndicatorSpec::Stochastic { .. } => "stochastic",
            IndicatorSpec::Atr { .. } => "atr",
            IndicatorSpec::Obv => "obv",
        }
    }

    pub fn lookback(&self) -> usize {
        match self {
            IndicatorSpec::Sma { period }
            | IndicatorSpec::Ema { period }
            | IndicatorSpec::Atr { period }
            | IndicatorSpec::Bollinger { period, .. } => *period,
            IndicatorSpec::Rsi { period } => period.saturating_add(1),
            IndicatorSpec::Macd { fast, slow, signal } => {
                (*fast).max(*slow).saturating_add(signal.saturating_sub(1))
            }
            IndicatorSpec::Stochastic { k, d, smooth } => k
                .saturating_add((*smooth).max(1) - 1)
                .saturating_add(d.saturating_sub(1)),
            IndicatorSpec::Obv => 1,
        }
    }

    pub fn build(&self) -> Result<IndicatorKind, TickwiseError> {
        self.validate()?;
        Ok(match self {
            IndicatorSpec::Sma { period } => IndicatorKind::Sma(Sma::new(*period)),
            IndicatorSpec::Ema { period } => IndicatorKind::Ema(Ema::new(*period)),
            IndicatorSpec::Rsi { period } => IndicatorKind::Rsi(Rsi::new(*period)),
            IndicatorSpec::Macd { fast, slow, signal } => {
                IndicatorKind::Macd(Macd::new(*fast, *slow, *signal))
            }
            IndicatorSpec::Bollinger { period, multiplier } => {
                IndicatorKind::Bollinger(BollingerBands::new(*period, *multiplier))
            }
            IndicatorSpec::Stochastic { k, d, smooth } => {
                IndicatorKind::Stochastic(Stochastic::new(*k, *d, *smooth))
            }
            IndicatorSpec::Atr { period } => IndicatorKind::Atr(Atr::new(*period)),
            IndicatorSpec::Obv => IndicatorKind::Obv(Obv::new()),
        })
    }

    /// Lazily evaluates the indicator over `bars`, one output per bar.
    pub fn series<'a>(&self, bars: &'a [Bar]) -> Result<IndicatorSeries<'a>, TickwiseError> {
        Ok(IndicatorSeries {
            indicator: self.build()?,
            bars: bars.iter(),
        })
    }
}

impl fmt::Display for IndicatorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorSpec::Sma { period } => write!(f, "sma:{}", period),
            IndicatorSpec::Ema { period } => write!(f, "ema:{}", period),
            IndicatorSpec::Rsi { period } => write!(f, "rsi:{}", period),
            IndicatorSpec::Macd { fast, slow, signal } => {
                write!(f, "macd:{},{},{}", fast, slow, signal)
            }
            IndicatorSpec::Bollinger { period, multiplier } => {
                write!(f, "bollinger:{},{}", period, multiplier)
            }
            IndicatorSpec::Stochastic { k, d, smooth } => {
                write!(f, "stochastic:{},{},{}", k, d, smooth)
            }
            IndicatorSpec::Atr { period } => write!(f, "atr:{}", period),
            IndicatorSpec::Obv => write!(f, "obv"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum IndicatorKind {
    Sma(Sma),
    Ema(Ema),
    Rsi(Rsi),
    Macd(Macd),
    Bollinger(BollingerBands),
    Stochastic(Stochastic),
    Atr(Atr),
    Obv(Obv),
}

impl IndicatorKind {
    pub fn name(&self) -> &'static str {
        match self {
            IndicatorKind::Sma(i) => i.name(),
            IndicatorKind::Ema(i) => i.name(),
            IndicatorKind::Rsi(i) => i.name(),
            IndicatorKind::Macd(i) => i.name(),
            IndicatorKind::Bollinger(i) => i.name(),
            IndicatorKind::Stochastic(i) => i.name(),
            IndicatorKind::Atr(i) => i.name(),
            IndicatorKind::Obv(i) => i.name(),
        }
    }

    pub fn lookback(&self) -> usize {
        match self {
            IndicatorKind::Sma(i) => i.lookback(),
            IndicatorKind::Ema(i) => i.lookback(),
            IndicatorKind::Rsi(i) => i.lookback(),
            IndicatorKind::Macd(i) => i.lookback(),
            IndicatorKind::Bollinger(i) => i.lookback(),
            IndicatorKind::Stochastic(i) => i.lookback(),
            IndicatorKind::Atr(i) => i.lookback(),
            IndicatorKind::Obv(i) => i.lookback(),
        }
    }

    pub fn on_bar(&mut self, bar: &Bar) -> Option<IndicatorValue> {
        match self {
            IndicatorKind::Sma(i) => i.on_bar(bar).map(IndicatorValue::Scalar),
            IndicatorKind::Ema(i) => i.on_bar(bar).map(IndicatorValue::Scalar),
            IndicatorKind::Rsi(i) => i.on_bar(bar).map(IndicatorValue::Scalar),
            IndicatorKind::Macd(i) => i.on_bar(bar).map(IndicatorValue::Macd),
            IndicatorKind::Bollinger(i) => i.on_bar(bar).map(IndicatorValue::Bands),
            IndicatorKind::Stochastic(i) => i.on_bar(bar).map(IndicatorValue::Stochastic),
            IndicatorKind::Atr(i) => i.on_bar(bar).map(IndicatorValue::Scalar),
            IndicatorKind::Obv(i) => i.on_bar(bar).map(IndicatorValue::Scalar),
        }
    }
}

pub struct IndicatorSeries<'a> {
    indicator: IndicatorKind,
    bars: std::slice::Iter<'a, Bar>,
}

impl<'a> Iterator for IndicatorSeries<'a> {
    type Item = (&'a Bar, Option<IndicatorValue>);

    fn next(&mut self) -> Option<Self::Item> {
        let bar = self.bars.next()?;
        let value = self.indicator.on_bar(bar);
        Some((bar, value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.bars.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use super::{IndicatorSpec, IndicatorValue, MAX_PERIOD};
    use crate::errors::TickwiseError;
    use crate::value_objects::bar::Bar;

    fn bars(closes: &[f64]) -> Vec<Bar> {
        closes
            .iter()
            .enumerate()
            .map(|(idx, close)| Bar {
                symbol: "TEST".to_string(),
                timestamp: idx as i64 * 86_400,
                open: *close,
                high: close + 1.0,
                low: close - 1.0,
                close: *close,
                volume: 1_000.0,
            })
            .collect()
    }

    #[test]
    fn parses_specs_with_defaults() {
        assert_eq!(
            IndicatorSpec::parse("rsi").unwrap(),
            IndicatorSpec::Rsi { period: 14 }
        );
        assert_eq!(
            IndicatorSpec::parse("MACD:5,10,3").unwrap(),
            IndicatorSpec::Macd {
                fast: 5,
                slow: 10,
                signal: 3
            }
        );
        assert_eq!(
            IndicatorSpec::parse("bb:10,1.5").unwrap(),
            IndicatorSpec::Bollinger {
                period: 10,
                multiplier: 1.5
            }
        );
    }

    #[test]
    fn rejects_bad_specs() {
        assert!(IndicatorSpec::parse("vwap").is_err());
        assert!(IndicatorSpec::parse("sma:0").is_err());
        assert!(IndicatorSpec::parse("sma:abc").is_err());
        assert!(IndicatorSpec::parse("macd:26,12,9").is_err());
        assert!(IndicatorSpec::parse("bollinger:20,-1").is_err());
    }

    #[test]
    fn oversized_periods_are_config_errors() {
        for raw in [
            "sma:18446744073709551615",
            "ema:100001",
            "rsi:100001",
            "macd:12,100001,9",
            "stochastic:14,100001,3",
        ] {
            match IndicatorSpec::parse(raw) {
                Err(TickwiseError::Config(msg)) => assert!(msg.contains("maximum"), "{}", msg),
                other => panic!("{}: unexpected {:?}", raw, other),
            }
        }

        let spec = IndicatorSpec::Atr { period: usize::MAX };
        assert!(matches!(spec.series(&[]), Err(TickwiseError::Config(_))));
        assert_eq!(spec.lookback(), usize::MAX);
        assert!(IndicatorSpec::parse(&format!("sma:{}", MAX_PERIOD)).is_ok());
    }

    #[test]
    fn series_first_value_matches_lookback() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + (i as f64 * 0.7).sin() * 5.0).collect();
        let bars = bars(&closes);
        for raw in INDICATORS {
            let spec = IndicatorSpec::parse(raw).unwrap();
            let outputs: Vec<_> = spec.series(&bars).unwrap().map(|(_, v)| v).collect();
            let first = outputs.iter().position(Option::is_some).unwrap();
            assert_eq!(first + 1, spec.lookback(), "{}", raw);
            assert!(outputs[first..].iter().all(Option::is_some), "{}", raw);
        }
    }

    const INDICATORS: &[&str] = &[
        "sma:5",
        "ema:5",
        "rsi:14",
        "macd:12,26,9",
        "bollinger:20,2",
        "stochastic:14,3,3",
        "atr:14",
        "obv",
    ];

    #[test]
    fn flat_closes_give_equal_moving_averages() {
        let bars = bars(&[10.0; 20]);
        let sma5 = IndicatorSpec::parse("sma:5").unwrap();
        let sma10 = IndicatorSpec::parse("sma:10").unwrap();
        let last5 = sma5.series(&bars).unwrap().last().and_then(|(_, v)| v);
        let last10 = sma10.series(&bars).unwrap().last().and_then(|(_, v)| v);
        assert_eq!(last5, Some(IndicatorValue::Scalar(10.0)));
        assert_eq!(last10, Some(IndicatorValue::Scalar(10.0)));
    }
}
