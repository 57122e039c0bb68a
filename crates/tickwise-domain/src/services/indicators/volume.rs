use super::Indicator;
use crate::value_objects::bar::Bar;

/// On-balance volume, starting at zero on the first bar.
#[derive(Debug, Clone, Default)]
pub struct Obv {
    prev_close: Option<f64>,
    value: f64,
}

impl Obv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, close: f64, volume: f64) -> f64 {
        if let Some(prev) = self.prev_close {
            if close > prev {
                self.value += volume;
            } else if close < prev {
                self.value -= volume;
            }
        }
        self.prev_close = Some(close);
        self.value
    }
}

impl Indicator for Obv {
    type Output = f64;

    fn name(&self) -> &'static str {
        "obv"
    }

    fn lookback(&self) -> usize {
        1
    }

    fn on_bar(&mut self, bar: &Bar) -> Option<f64> {
        Some(self.update(bar.close, bar.volume))
    }
}

#[cfg(test)]
mod tests {
    use super::Obv;

    #[test]
    fn accumulates_signed_volume() {
        let mut obv = Obv::new();
        assert_eq!(obv.update(10.0, 100.0), 0.0);
        assert_eq!(obv.update(11.0, 50.0), 50.0);
        assert_eq!(obv.update(11.0, 70.0), 50.0);
        assert_eq!(obv.update(9.0, 20.0), 30.0);
    }
}
