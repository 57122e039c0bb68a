use super::{crossed_above, crossed_below, Strategy, INSUFFICIENT_DATA};
use crate::errors::TickwiseError;
use crate::services::indicators::{check_periods, IndicatorSnapshot, Macd, Stochastic};
use crate::value_objects::action_type::ActionType;
use crate::value_objects::bar::Bar;
use crate::value_objects::signal::{Signal, SignalStrength};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MacdStochasticParams {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
    pub stoch_k: usize,
    pub stoch_d: usize,
    pub stoch_smooth: usize,
    pub stoch_overbought: f64,
    pub stoch_oversold: f64,
}

impl Default for MacdStochasticParams {
    fn default() -> Self {
        Self {
            fast: 12,
            slow: 26,
            signal: 9,
            stoch_k: 14,
            stoch_d: 3,
            stoch_smooth: 3,
            stoch_overbought: 80.0,
            stoch_oversold: 20.0,
        }
    }
}

impl MacdStochasticParams {
    pub fn validate(&self) -> Result<(), TickwiseError> {
        let periods = [
            self.fast,
            self.slow,
            self.signal,
            self.stoch_k,
            self.stoch_d,
            self.stoch_smooth,
        ];
        check_periods("macd_stochastic", &periods)?;
        if self.fast >= self.slow {
            return Err(TickwiseError::Config(format!(
                "macd_stochastic fast ({}) must be shorter than slow ({})",
                self.fast, self.slow
            )));
        }
        super::ma_crossover::validate_thresholds(
            "macd_stochastic",
            self.stoch_oversold,
            self.stoch_overbought,
        )
    }
}

/// MACD line crossing its signal line, confirmed by %K crossing %D out of an extreme zone.
/// The zone is checked on the bar before the cross: both %K and %D must have been beyond
/// the threshold.
pub struct MacdStochastic {
    params: MacdStochasticParams,
    macd: Macd,
    stochastic: Stochastic,
}

impl MacdStochastic {
    pub fn new(params: MacdStochasticParams) -> Self {
        Self {
            macd: Macd::new(params.fast, params.slow, params.signal),
            stochastic: Stochastic::new(params.stoch_k, params.stoch_d, params.stoch_smooth),
            params,
        }
    }

    pub fn params(&self) -> &MacdStochasticParams {
        &self.params
    }
}

impl Strategy for MacdStochastic {
    fn name(&self) -> &'static str {
        "macd_stochastic"
    }

    fn lookback(&self) -> usize {
        let p = &self.params;
        let macd = p.fast.max(p.slow).saturating_add(p.signal.saturating_sub(1));
        let stoch = p
            .stoch_k
            .saturating_add(p.stoch_smooth.max(1) - 1)
            .saturating_add(p.stoch_d.saturating_sub(1));
        macd.max(stoch).saturating_add(1)
    }

    fn compute(&mut self, bar: &Bar) -> IndicatorSnapshot {
        let mut snapshot = IndicatorSnapshot::new(bar.timestamp, bar.close, bar.volume);
        snapshot.macd = self.macd.update(bar.close);
        snapshot.stochastic = self.stochastic.update(bar.high, bar.low, bar.close);
        snapshot
    }

    fn evaluate(
        &self,
        bar: &Bar,
        current: &IndicatorSnapshot,
        prior: Option<&IndicatorSnapshot>,
    ) -> Signal {
        let name = self.name();
        let (Some(macd), Some(stoch)) = (current.macd, current.stochastic) else {
            return Signal::hold(bar, name, INSUFFICIENT_DATA);
        };
        let Some((prev_macd, prev_stoch)) = prior.and_then(|prev| prev.macd.zip(prev.stochastic))
        else {
            return Signal::hold(bar, name, INSUFFICIENT_DATA);
        };
        let p = &self.params;

        let macd_prev_diff = prev_macd.macd - prev_macd.signal;
        let macd_diff = macd.macd - macd.signal;
        let stoch_prev_diff = prev_stoch.k - prev_stoch.d;
        let stoch_diff = stoch.k - stoch.d;

        if crossed_above(macd_prev_diff, macd_diff)
            && crossed_above(stoch_prev_diff, stoch_diff)
            && prev_stoch.k < p.stoch_oversold
            && prev_stoch.d < p.stoch_oversold
        {
            let strength = if stoch.k < p.stoch_oversold {
                SignalStrength::Strong
            } else {
                SignalStrength::Moderate
            };
            return Signal::new(
                bar,
                name,
                ActionType::Buy,
                strength,
                format!(
                    "MACD crossed above signal with %K {:.1} crossing %D {:.1} from oversold",
                    stoch.k, stoch.d
                ),
            );
        }

        if crossed_below(macd_prev_diff, macd_diff)
            && crossed_below(stoch_prev_diff, stoch_diff)
            && prev_stoch.k > p.stoch_overbought
            && prev_stoch.d > p.stoch_overbought
        {
            let strength = if stoch.k > p.stoch_overbought {
                SignalStrength::Strong
            } else {
                SignalStrength::Moderate
            };
            return Signal::new(
                bar,
                name,
                ActionType::Sell,
                strength,
                format!(
                    "MACD crossed below signal with %K {:.1} crossing %D {:.1} from overbought",
                    stoch.k, stoch.d
                ),
            );
        }

        Signal::hold(bar, name, "no confirmed crossover")
    }
}

#[cfg(test)]
mod tests {
    use super::{MacdStochastic, MacdStochasticParams};
    use crate::services::indicators::{IndicatorSnapshot, MacdValue, StochasticValue};
    use crate::services::strategy::Strategy;
    use crate::value_objects::action_type::ActionType;
    use crate::value_objects::bar::Bar;
    use crate::value_objects::signal::SignalStrength;

    fn bar() -> Bar {
        Bar {
            symbol: "MSFT".to_string(),
            timestamp: 0,
            open: 1.0,
            high: 1.0,
            low: 1.0,
            close: 1.0,
            volume: 1.0,
        }
    }

    fn snapshot(macd: f64, signal: f64, k: f64, d: f64) -> IndicatorSnapshot {
        IndicatorSnapshot {
            macd: Some(MacdValue {
                macd,
                signal,
                histogram: macd - signal,
            }),
            stochastic: Some(StochasticValue { k, d }),
            ..IndicatorSnapshot::default()
        }
    }

    #[test]
    fn buys_on_double_cross_out_of_oversold() {
        let s = MacdStochastic::new(MacdStochasticParams::default());
        let prior = snapshot(-0.2, 0.0, 10.0, 15.0);
        let signal = s.evaluate(&bar(), &snapshot(0.1, 0.0, 18.0, 14.0), Some(&prior));
        assert_eq!(signal.action, ActionType::Buy);
        assert_eq!(signal.strength, SignalStrength::Strong);

        let moderate = s.evaluate(&bar(), &snapshot(0.1, 0.0, 25.0, 16.0), Some(&prior));
        assert_eq!(moderate.action, ActionType::Buy);
        assert_eq!(moderate.strength, SignalStrength::Moderate);
    }

    #[test]
    fn macd_cross_alone_holds() {
        let s = MacdStochastic::new(MacdStochasticParams::default());
        let prior = snapshot(-0.2, 0.0, 50.0, 55.0);
        let signal = s.evaluate(&bar(), &snapshot(0.1, 0.0, 60.0, 52.0), Some(&prior));
        assert_eq!(signal.action, ActionType::Hold);
    }

    #[test]
    fn sells_on_mirrored_overbought_cross() {
        let s = MacdStochastic::new(MacdStochasticParams::default());
        let prior = snapshot(0.2, 0.0, 92.0, 88.0);
        let signal = s.evaluate(&bar(), &snapshot(-0.1, 0.0, 84.0, 86.0), Some(&prior));
        assert_eq!(signal.action, ActionType::Sell);
        assert_eq!(signal.strength, SignalStrength::Strong);
    }

    #[test]
    fn default_lookback_covers_macd_signal_and_prior_bar() {
        let s = MacdStochastic::new(MacdStochasticParams::default());
        assert_eq!(s.lookback(), 35);
    }
}
