use super::rolling::{RollingRange, RollingSma, WilderAverage};
use super::{Indicator, StochasticValue};
use crate::value_objects::bar::Bar;

/// Wilder RSI. A window with no losses reads 100, including a flat window.
#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    prev_close: Option<f64>,
    avg_gain: WilderAverage,
    avg_loss: WilderAverage,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            prev_close: None,
            avg_gain: WilderAverage::new(period),
            avg_loss: WilderAverage::new(period),
        }
    }

    pub fn update(&mut self, close: f64) -> Option<f64> {
        let prev = self.prev_close.replace(close)?;
        let change = close - prev;
        let gain = self.avg_gain.update(change.max(0.0));
        let loss = self.avg_loss.update((-change).max(0.0));
        let (Some(avg_gain), Some(avg_loss)) = (gain, loss) else {
            return None;
        };
        Some(rsi_from_averages(avg_gain, avg_loss))
    }
}

pub fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}

impl Indicator for Rsi {
    type Output = f64;

    fn name(&self) -> &'static str {
        "rsi"
    }

    fn lookback(&self) -> usize {
        if self.period == 0 {
            usize::MAX
        } else {
            self.period.saturating_add(1)
        }
    }

    fn on_bar(&mut self, bar: &Bar) -> Option<f64> {
        self.update(bar.close)
    }
}

/// Stochastic oscillator. A flat high/low range reads %K = 50.
#[derive(Debug, Clone)]
pub struct Stochastic {
    k_period: usize,
    d_period: usize,
    smooth_k: usize,
    range: RollingRange,
    smoothing: RollingSma,
    d: RollingSma,
}

impl Stochastic {
    pub fn new(k_period: usize, d_period: usize, smooth_k: usize) -> Self {
        Self {
            k_period,
            d_period,
            smooth_k,
            range: RollingRange::new(k_period),
            smoothing: RollingSma::new(smooth_k),
            d: RollingSma::new(d_period),
        }
    }

    pub fn update(&mut self, high: f64, low: f64, close: f64) -> Option<StochasticValue> {
        let (highest, lowest) = self.range.update(high, low)?;
        let span = highest - lowest;
        let raw_k = if span <= 0.0 {
            50.0
        } else {
            100.0 * (close - lowest) / span
        };
        let k = if self.smooth_k > 1 {
            self.smoothing.update(raw_k)?
        } else {
            raw_k
        };
        let d = self.d.update(k)?;
        Some(StochasticValue { k, d })
    }
}

impl Indicator for Stochastic {
    type Output = StochasticValue;

    fn name(&self) -> &'static str {
        "stochastic"
    }

    fn lookback(&self) -> usize {
        if self.k_period == 0 || self.d_period == 0 {
            return usize::MAX;
        }
        self.k_period
            .saturating_add(self.smooth_k.max(1) - 1)
            .saturating_add(self.d_period - 1)
    }

    fn on_bar(&mut self, bar: &Bar) -> Option<StochasticValue> {
        self.update(bar.high, bar.low, bar.close)
    }
}
