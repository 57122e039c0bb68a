use super::ma_crossover::validate_thresholds;
use super::{crossed_above, crossed_below, Strategy, INSUFFICIENT_DATA};
use crate::errors::TickwiseError;
use crate::services::indicators::{check_periods, BollingerBands, IndicatorSnapshot, Rsi};
use crate::value_objects::action_type::ActionType;
use crate::value_objects::bar::Bar;
use crate::value_objects::signal::{Signal, SignalStrength};
use serde::{Deserialize, Serialize};

const VOLUME_SURGE: f64 = 1.5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BandMode {
    #[default]
    Reversion,
    Breakout,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BollingerParams {
    pub period: usize,
    pub multiplier: f64,
    pub rsi_period: usize,
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    pub mode: BandMode,
}

impl Default for BollingerParams {
    fn default() -> Self {
        Self {
            period: 20,
            multiplier: 2.0,
            rsi_period: 14,
            rsi_overbought: 70.0,
            rsi_oversold: 30.0,
            mode: BandMode::Reversion,
        }
    }
}

impl BollingerParams {
    pub fn validate(&self) -> Result<(), TickwiseError> {
        check_periods("bollinger", &[self.period, self.rsi_period])?;
        if !self.multiplier.is_finite() || self.multiplier <= 0.0 {
            return Err(TickwiseError::Config(format!(
                "bollinger multiplier must be positive, got {}",
                self.multiplier
            )));
        }
        validate_thresholds("bollinger", self.rsi_oversold, self.rsi_overbought)
    }
}

/// Bollinger band strategy.
///
/// Reversion mode buys a close at or under the lower band while RSI is oversold and sells a
/// close at or over the upper band, or a close that climbs back through the middle band.
/// Breakout mode buys a close crossing above the upper band and sells a close crossing below
/// the middle or lower band, both only on rising volume. Collapsed bands (zero deviation)
/// always hold.
pub struct BollingerStrategy {
    params: BollingerParams,
    bands: BollingerBands,
    rsi: Rsi,
}

impl BollingerStrategy {
    pub fn new(params: BollingerParams) -> Self {
        Self {
            bands: BollingerBands::new(params.period, params.multiplier),
            rsi: Rsi::new(params.rsi_period),
            params,
        }
    }

    pub fn params(&self) -> &BollingerParams {
        &self.params
    }

    fn reversion(
        &self,
        bar: &Bar,
        current: &IndicatorSnapshot,
        prior: Option<&IndicatorSnapshot>,
    ) -> Signal {
        let name = self.name();
        let (Some(bands), Some(rsi)) = (current.bands, current.rsi) else {
            return Signal::hold(bar, name, INSUFFICIENT_DATA);
        };
        let Some(pct_b) = bands.percent_b(current.close) else {
            return Signal::hold(bar, name, "bands collapsed");
        };
        let p = &self.params;

        if current.close <= bands.lower && rsi <= p.rsi_oversold {
            let strength = if rsi < 20.0 {
                SignalStrength::Strong
            } else {
                SignalStrength::Moderate
            };
            return Signal::new(
                bar,
                name,
                ActionType::Buy,
                strength,
                format!("price at/below lower band (%b {:.2}) with RSI={:.1}", pct_b, rsi),
            );
        }

        if current.close >= bands.upper {
            let strength = if rsi > 80.0 {
                SignalStrength::Strong
            } else {
                SignalStrength::Moderate
            };
            return Signal::new(
                bar,
                name,
                ActionType::Sell,
                strength,
                format!("price at/above upper band (%b {:.2}) with RSI={:.1}", pct_b, rsi),
            );
        }

        let back_to_middle = prior
            .and_then(|prev| prev.bands.map(|b| prev.close - b.middle))
            .map(|prev_diff| crossed_above(prev_diff, current.close - bands.middle))
            .unwrap_or(false);
        if back_to_middle {
            return Signal::new(
                bar,
                name,
                ActionType::Sell,
                SignalStrength::Weak,
                format!("price reverted through middle band {:.2}", bands.middle),
            );
        }

        Signal::hold(bar, name, "inside bands")
    }

    fn breakout(
        &self,
        bar: &Bar,
        current: &IndicatorSnapshot,
        prior: Option<&IndicatorSnapshot>,
    ) -> Signal {
        let name = self.name();
        let Some(bands) = current.bands else {
            return Signal::hold(bar, name, INSUFFICIENT_DATA);
        };
        let Some((prev, prev_bands)) = prior.and_then(|prev| prev.bands.map(|b| (prev, b))) else {
            return Signal::hold(bar, name, INSUFFICIENT_DATA);
        };
        if bands.percent_b(current.close).is_none() {
            return Signal::hold(bar, name, "bands collapsed");
        }
        if current.volume <= prev.volume {
            return Signal::hold(bar, name, "volume not rising");
        }
        let strength = if current.volume > prev.volume * VOLUME_SURGE {
            SignalStrength::Strong
        } else {
            SignalStrength::Moderate
        };

        if crossed_above(prev.close - prev_bands.upper, current.close - bands.upper) {
            return Signal::new(
                bar,
                name,
                ActionType::Buy,
                strength,
                format!(
                    "breakout above upper band {:.2} on volume {:.0} (prior {:.0})",
                    bands.upper, current.volume, prev.volume
                ),
            );
        }

        let below_middle =
            crossed_below(prev.close - prev_bands.middle, current.close - bands.middle);
        let below_lower =
            crossed_below(prev.close - prev_bands.lower, current.close - bands.lower);
        if below_middle || below_lower {
            let line = if below_lower { "lower" } else { "middle" };
            return Signal::new(
                bar,
                name,
                ActionType::Sell,
                strength,
                format!(
                    "breakdown below {} band on volume {:.0} (prior {:.0})",
                    line, current.volume, prev.volume
                ),
            );
        }

        Signal::hold(bar, name, "no band cross")
    }
}

impl Strategy for BollingerStrategy {
    fn name(&self) -> &'static str {
        "bollinger"
    }

    fn lookback(&self) -> usize {
        match self.params.mode {
            BandMode::Reversion => self.params.period.max(self.params.rsi_period.saturating_add(1)),
            BandMode::Breakout => self.params.period.saturating_add(1),
        }
    }

    fn compute(&mut self, bar: &Bar) -> IndicatorSnapshot {
        let mut snapshot = IndicatorSnapshot::new(bar.timestamp, bar.close, bar.volume);
        snapshot.bands = self.bands.update(bar.close);
        snapshot.rsi = self.rsi.update(bar.close);
        snapshot
    }

    fn evaluate(
        &self,
        bar: &Bar,
        current: &IndicatorSnapshot,
        prior: Option<&IndicatorSnapshot>,
    ) -> Signal {
        match self.params.mode {
            BandMode::Reversion => self.reversion(bar, current, prior),
            BandMode::Breakout => self.breakout(bar, current, prior),
        }
    }
}
