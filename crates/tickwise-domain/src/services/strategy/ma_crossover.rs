use super::{crossed_above, crossed_below, Strategy, INSUFFICIENT_DATA};
use crate::errors::TickwiseError;
use crate::services::indicators::{
    check_periods, IndicatorSnapshot, MaKind, MovingAverage, Rsi,
};
use crate::value_objects::action_type::ActionType;
use crate::value_objects::bar::Bar;
use crate::value_objects::signal::{Signal, SignalStrength};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MaCrossoverParams {
    pub fast_period: usize,
    pub slow_period: usize,
    pub ma_kind: MaKind,
    pub rsi_period: usize,
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
}

impl Default for MaCrossoverParams {
    fn default() -> Self {
        Self {
            fast_period: 50,
            slow_period: 200,
            ma_kind: MaKind::Simple,
            rsi_period: 14,
            rsi_overbought: 70.0,
            rsi_oversold: 30.0,
        }
    }
}

impl MaCrossoverParams {
    pub fn validate(&self) -> Result<(), TickwiseError> {
        check_periods(
            "ma_crossover",
            &[self.fast_period, self.slow_period, self.rsi_period],
        )?;
        if self.fast_period >= self.slow_period {
            return Err(TickwiseError::Config(format!(
                "ma_crossover fast_period ({}) must be shorter than slow_period ({})",
                self.fast_period, self.slow_period
            )));
        }
        validate_thresholds("ma_crossover", self.rsi_oversold, self.rsi_overbought)
    }
}

pub(crate) fn validate_thresholds(
    strategy: &str,
    oversold: f64,
    overbought: f64,
) -> Result<(), TickwiseError> {
    let in_range = |v: f64| v.is_finite() && (0.0..=100.0).contains(&v);
    if !in_range(oversold) || !in_range(overbought) || oversold >= overbought {
        return Err(TickwiseError::Config(format!(
            "{} thresholds must satisfy 0 <= oversold ({}) < overbought ({}) <= 100",
            strategy, oversold, overbought
        )));
    }
    Ok(())
}

/// Fast/slow moving-average crossover filtered by RSI.
pub struct MaCrossover {
    params: MaCrossoverParams,
    fast: MovingAverage,
    slow: MovingAverage,
    rsi: Rsi,
}

impl MaCrossover {
    pub fn new(params: MaCrossoverParams) -> Self {
        Self {
            fast: MovingAverage::new(params.ma_kind, params.fast_period),
            slow: MovingAverage::new(params.ma_kind, params.slow_period),
            rsi: Rsi::new(params.rsi_period),
            params,
        }
    }

    pub fn params(&self) -> &MaCrossoverParams {
        &self.params
    }
}

impl Strategy for MaCrossover {
    fn name(&self) -> &'static str {
        "ma_crossover"
    }

    fn lookback(&self) -> usize {
        self.params
            .slow_period
            .max(self.params.rsi_period)
            .saturating_add(1)
    }

    fn compute(&mut self, bar: &Bar) -> IndicatorSnapshot {
        let mut snapshot = IndicatorSnapshot::new(bar.timestamp, bar.close, bar.volume);
        snapshot.fast_ma = self.fast.update(bar.close);
        snapshot.slow_ma = self.slow.update(bar.close);
        snapshot.rsi = self.rsi.update(bar.close);
        snapshot
    }

    fn evaluate(
        &self,
        bar: &Bar,
        current: &IndicatorSnapshot,
        prior: Option<&IndicatorSnapshot>,
    ) -> Signal {
        let name = self.name();
        let (Some(spread), Some(rsi)) = (current.ma_spread(), current.rsi) else {
            return Signal::hold(bar, name, INSUFFICIENT_DATA);
        };
        let Some(prev_spread) = prior.and_then(IndicatorSnapshot::ma_spread) else {
            return Signal::hold(bar, name, INSUFFICIENT_DATA);
        };
        let p = &self.params;

        if crossed_above(prev_spread, spread) && rsi > p.rsi_oversold && rsi < p.rsi_overbought {
            let strength = if rsi < 50.0 {
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
                    "golden cross (MA{} above MA{}) with RSI{}={:.1}",
                    p.fast_period, p.slow_period, p.rsi_period, rsi
                ),
            );
        }

        if crossed_below(prev_spread, spread) {
            let strength = if rsi > p.rsi_overbought {
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
                    "death cross (MA{} below MA{}) with RSI{}={:.1}",
                    p.fast_period, p.slow_period, p.rsi_period, rsi
                ),
            );
        }

        if rsi > p.rsi_overbought {
            return Signal::new(
                bar,
                name,
                ActionType::Sell,
                SignalStrength::Weak,
                format!("RSI{} overbought at {:.1}", p.rsi_period, rsi),
            );
        }

        Signal::hold(bar, name, "no crossover")
    }
}
