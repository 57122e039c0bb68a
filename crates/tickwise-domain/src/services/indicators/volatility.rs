use super::rolling::{RollingSma, RollingStd, WilderAverage};
use super::{BandsValue, Indicator};
use crate::value_objects::bar::Bar;

#[derive(Debug, Clone)]
pub struct BollingerBands {
    period: usize,
    multiplier: f64,
    middle: RollingSma,
    std: RollingStd,
}

impl BollingerBands {
    pub fn new(period: usize, multiplier: f64) -> Self {
        Self {
            period,
            multiplier,
            middle: RollingSma::new(period),
            std: RollingStd::new(period),
        }
    }

    pub fn update(&mut self, close: f64) -> Option<BandsValue> {
        let middle = self.middle.update(close);
        let std = self.std.update(close);
        let (Some(middle), Some(std)) = (middle, std) else {
            return None;
        };
        let width = self.multiplier * std;
        Some(BandsValue {
            upper: middle + width,
            middle,
            lower: middle - width,
        })
    }
}

impl Indicator for BollingerBands {
    type Output = BandsValue;

    fn name(&self) -> &'static str {
        "bollinger"
    }

    fn lookback(&self) -> usize {
        if self.period == 0 {
            usize::MAX
        } else {
            self.period
        }
    }

    fn on_bar(&mut self, bar: &Bar) -> Option<BandsValue> {
        self.update(bar.close)
    }
}

/// Average true range with Wilder smoothing. The first bar's true range is `high - low`.
#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    prev_close: Option<f64>,
    average: WilderAverage,
}

impl Atr {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            prev_close: None,
            average: WilderAverage::new(period),
        }
    }

    pub fn update(&mut self, high: f64, low: f64, close: f64) -> Option<f64> {
        let true_range = match self.prev_close {
            Some(prev) => (high - low)
                .max((high - prev).abs())
                .max((low - prev).abs()),
            None => high - low,
        };
        self.prev_close = Some(close);
        self.average.update(true_range)
    }
}

impl Indicator for Atr {
    type Output = f64;

    fn name(&self) -> &'static str {
        "atr"
    }

    fn lookback(&self) -> usize {
        if self.period == 0 {
            usize::MAX
        } else {
            self.period
        }
    }

    fn on_bar(&mut self, bar: &Bar) -> Option<f64> {
        self.update(bar.high, bar.low, bar.close)
    }
}

#[cfg(test)]
mod tests {
    use super::{Atr, BollingerBands};

    #[test]
    fn flat_series_collapses_bands() {
        let mut bands = BollingerBands::new(20, 2.0);
        let mut last = None;
        for _ in 0..20 {
            last = bands.update(10.0);
        }
        let value = last.expect("bands after 20 closes");
        assert_eq!(value.upper, 10.0);
        assert_eq!(value.middle, 10.0);
        assert_eq!(value.lower, 10.0);
        assert_eq!(value.percent_b(10.0), None);
    }

    #[test]
    fn bands_are_symmetric_around_middle() {
        let mut bands = BollingerBands::new(3, 2.0);
        bands.update(1.0);
        bands.update(2.0);
        let value = bands.update(3.0).expect("bands");
        assert!((value.middle - 2.0).abs() < 1e-12);
        assert!(((value.upper - value.middle) - (value.middle - value.lower)).abs() < 1e-12);
        let pct = value.percent_b(value.upper).expect("pct");
        assert!((pct - 1.0).abs() < 1e-12);
    }

    #[test]
    fn atr_uses_gaps_against_previous_close() {
        let mut atr = Atr::new(2);
        assert_eq!(atr.update(11.0, 9.0, 10.0), None);
        // gap up: true range = 15 - 10 = 5
        assert_eq!(atr.update(15.0, 14.0, 14.5), Some(3.5));
    }
}
