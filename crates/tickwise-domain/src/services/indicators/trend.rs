use super::rolling::RollingSma;
use super::{Indicator, MacdValue};
use crate::value_objects::bar::Bar;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub struct Sma {
    inner: RollingSma,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        Self {
            inner: RollingSma::new(period),
        }
    }

    pub fn update(&mut self, value: f64) -> Option<f64> {
        self.inner.update(value)
    }
}

impl Indicator for Sma {
    type Output = f64;

    fn name(&self) -> &'static str {
        "sma"
    }

    fn lookback(&self) -> usize {
        self.inner.window()
    }

    fn on_bar(&mut self, bar: &Bar) -> Option<f64> {
        self.update(bar.close)
    }
}

/// Exponential moving average, `alpha = 2 / (period + 1)`, seeded by the simple mean of
/// the first `period` values.
#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    alpha: f64,
    count: usize,
    seed_sum: f64,
    value: Option<f64>,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            alpha: 2.0 / (period as f64 + 1.0),
            count: 0,
            seed_sum: 0.0,
            value: None,
        }
    }

    pub fn update(&mut self, value: f64) -> Option<f64> {
        if self.period == 0 {
            return None;
        }
        match self.value {
            Some(prev) => {
                let next = self.alpha * value + (1.0 - self.alpha) * prev;
                self.value = Some(next);
            }
            None => {
                self.count += 1;
                self.seed_sum += value;
                if self.count == self.period {
                    self.value = Some(self.seed_sum / self.period as f64);
                }
            }
        }
        self.value
    }
}

impl Indicator for Ema {
    type Output = f64;

    fn name(&self) -> &'static str {
        "ema"
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn on_bar(&mut self, bar: &Bar) -> Option<f64> {
        self.update(bar.close)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaKind {
    #[default]
    Simple,
    Exponential,
}

#[derive(Debug, Clone)]
pub enum MovingAverage {
    Simple(Sma),
    Exponential(Ema),
}

impl MovingAverage {
    pub fn new(kind: MaKind, period: usize) -> Self {
        match kind {
            MaKind::Simple => MovingAverage::Simple(Sma::new(period)),
            MaKind::Exponential => MovingAverage::Exponential(Ema::new(period)),
        }
    }

    pub fn update(&mut self, value: f64) -> Option<f64> {
        match self {
            MovingAverage::Simple(sma) => sma.update(value),
            MovingAverage::Exponential(ema) => ema.update(value),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Macd {
    fast: Ema,
    slow: Ema,
    signal: Ema,
    lookback: usize,
}

impl Macd {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        let lookback = if fast == 0 || slow == 0 || signal == 0 {
            usize::MAX
        } else {
            fast.max(slow).saturating_add(signal - 1)
        };
        Self {
            fast: Ema::new(fast),
            slow: Ema::new(slow),
            signal: Ema::new(signal),
            lookback,
        }
    }

    pub fn update(&mut self, close: f64) -> Option<MacdValue> {
        let fast = self.fast.update(close);
        let slow = self.slow.update(close);
        let (Some(fast), Some(slow)) = (fast, slow) else {
            return None;
        };
        let macd = fast - slow;
        let signal = self.signal.update(macd)?;
        Some(MacdValue {
            macd,
            signal,
            histogram: macd - signal,
        })
    }
}

impl Indicator for Macd {
    type Output = MacdValue;

    fn name(&self) -> &'static str {
        "macd"
    }

    fn lookback(&self) -> usize {
        self.lookback
    }

    fn on_bar(&mut self, bar: &Bar) -> Option<MacdValue> {
        self.update(bar.close)
    }
}

#[cfg(test)]
mod tests {
    use super::{Ema, Macd};

    #[test]
    fn ema_seeds_with_simple_mean_then_smooths() {
        let mut ema = Ema::new(3);
        assert_eq!(ema.update(1.0), None);
        assert_eq!(ema.update(2.0), None);
        assert_eq!(ema.update(3.0), Some(2.0));
        // alpha = 0.5
        assert_eq!(ema.update(4.0), Some(3.0));
    }

    #[test]
    fn macd_first_value_lands_on_lookback() {
        let mut macd = Macd::new(3, 5, 2);
        let outputs: Vec<_> = (1..=10).map(|i| macd.update(i as f64)).collect();
        let first = outputs.iter().position(|v| v.is_some()).expect("macd value");
        // slow EMA seeds at bar 5, signal needs 2 MACD values -> bar 6
        assert_eq!(first + 1, 6);
        let value = outputs[9].expect("macd at end");
        assert!((value.histogram - (value.macd - value.signal)).abs() < 1e-12);
        assert!(value.macd > 0.0);
    }
}
