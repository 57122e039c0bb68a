//! Rule-based signal generation.
//!
//! A strategy is split in two steps: `compute` folds one bar into its indicator state and
//! returns the snapshot for that bar, `evaluate` turns the current and prior snapshots into a
//! signal. Only the bar being processed and earlier ones ever reach a strategy.

pub mod bollinger;
pub mod ma_crossover;
pub mod macd_stochastic;
pub mod registry;

use crate::errors::TickwiseError;
use crate::services::indicators::IndicatorSnapshot;
use crate::value_objects::bar::Bar;
use crate::value_objects::signal::Signal;

pub use bollinger::{BandMode, BollingerParams, BollingerStrategy};
pub use ma_crossover::{MaCrossover, MaCrossoverParams};
pub use macd_stochastic::{MacdStochastic, MacdStochasticParams};
pub use registry::{StrategyDescriptor, StrategyParams, STRATEGIES};

pub const INSUFFICIENT_DATA: &str = "insufficient data";

pub trait Strategy {
    fn name(&self) -> &'static str;

    /// Bars needed before the strategy can emit anything other than HOLD.
    fn lookback(&self) -> usize;

    fn compute(&mut self, bar: &Bar) -> IndicatorSnapshot;

    fn evaluate(
        &self,
        bar: &Bar,
        current: &IndicatorSnapshot,
        prior: Option<&IndicatorSnapshot>,
    ) -> Signal;
}

/// `a - b` went from strictly below zero to strictly above zero.
pub fn crossed_above(prev_diff: f64, cur_diff: f64) -> bool {
    prev_diff < 0.0 && cur_diff > 0.0
}

pub fn crossed_below(prev_diff: f64, cur_diff: f64) -> bool {
    prev_diff > 0.0 && cur_diff < 0.0
}

pub enum StrategyKind {
    MaCrossover(MaCrossover),
    Bollinger(BollingerStrategy),
    MacdStochastic(MacdStochastic),
}

impl Strategy for StrategyKind {
    fn name(&self) -> &'static str {
        match self {
            StrategyKind::MaCrossover(s) => s.name(),
            StrategyKind::Bollinger(s) => s.name(),
            StrategyKind::MacdStochastic(s) => s.name(),
        }
    }

    fn lookback(&self) -> usize {
        match self {
            StrategyKind::MaCrossover(s) => s.lookback(),
            StrategyKind::Bollinger(s) => s.lookback(),
            StrategyKind::MacdStochastic(s) => s.lookback(),
        }
    }

    fn compute(&mut self, bar: &Bar) -> IndicatorSnapshot {
        match self {
            StrategyKind::MaCrossover(s) => s.compute(bar),
            StrategyKind::Bollinger(s) => s.compute(bar),
            StrategyKind::MacdStochastic(s) => s.compute(bar),
        }
    }

    fn evaluate(
        &self,
        bar: &Bar,
        current: &IndicatorSnapshot,
        prior: Option<&IndicatorSnapshot>,
    ) -> Signal {
        match self {
            StrategyKind::MaCrossover(s) => s.evaluate(bar, current, prior),
            StrategyKind::Bollinger(s) => s.evaluate(bar, current, prior),
            StrategyKind::MacdStochastic(s) => s.evaluate(bar, current, prior),
        }
    }
}

/// Drives a strategy bar by bar, carrying the prior snapshot between calls.
pub struct SignalEngine<S: Strategy> {
    strategy: S,
    prior: Option<IndicatorSnapshot>,
    bars_seen: usize,
}

impl<S: Strategy> SignalEngine<S> {
    pub fn new(strategy: S) -> Self {
        Self {
            strategy,
            prior: None,
            bars_seen: 0,
        }
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    pub fn bars_seen(&self) -> usize {
        self.bars_seen
    }

    pub fn warmed_up(&self) -> bool {
        self.bars_seen >= self.strategy.lookback()
    }

    pub fn on_bar(&mut self, bar: &Bar) -> Result<Signal, TickwiseError> {
        let snapshot = self.strategy.compute(bar);
        snapshot.ensure_finite()?;
        let signal = self.strategy.evaluate(bar, &snapshot, self.prior.as_ref());
        self.prior = Some(snapshot);
        self.bars_seen += 1;
        Ok(signal)
    }

    pub fn last_snapshot(&self) -> Option<&IndicatorSnapshot> {
        self.prior.as_ref()
    }

    /// One signal per bar, in bar order.
    pub fn signals(&mut self, bars: &[Bar]) -> Result<Vec<Signal>, TickwiseError> {
        bars.iter().map(|bar| self.on_bar(bar)).collect()
    }
}
