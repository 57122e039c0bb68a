use crate::value_objects::equity_point::EquityPoint;
use crate::value_objects::trade::Trade;
use serde::{Deserialize, Serialize};

const SECONDS_PER_DAY: f64 = 86_400.0;
const STD_EPSILON: f64 = 1e-12;

/// Aggregate performance of one backtest. Ratios that are undefined for the run (no trades,
/// zero deviation, zero gross loss) are `None` rather than zero or infinity.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSummary {
    pub bars_processed: usize,
    pub trades: usize,
    pub initial_equity: f64,
    pub final_equity: f64,
    pub net_profit: f64,
    pub total_return: f64,
    pub cagr: Option<f64>,
    pub sharpe: Option<f64>,
    pub volatility: Option<f64>,
    pub max_drawdown: f64,
    pub win_rate: Option<f64>,
    pub profit_factor: Option<f64>,
    pub avg_trade: Option<f64>,
    pub avg_trade_pct: Option<f64>,
    pub exposure: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetricsConfig {
    /// Per-bar risk-free rate subtracted from each return before the Sharpe ratio.
    pub risk_free_rate: f64,
    pub annualization_factor: f64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.0,
            annualization_factor: 252.0,
        }
    }
}

#[derive(Debug, Default)]
pub struct MetricsState {
    equity_curve: Vec<EquityPoint>,
    trades: Vec<Trade>,
    initial_equity: f64,
    peak_equity: f64,
    max_drawdown: f64,
    bars_in_position: usize,
    config: MetricsConfig,
}

impl MetricsState {
    pub fn new(config: MetricsConfig, initial_equity: f64) -> Self {
        Self {
            equity_curve: Vec::new(),
            trades: Vec::new(),
            initial_equity,
            peak_equity: 0.0,
            max_drawdown: 0.0,
            bars_in_position: 0,
            config,
        }
    }

    pub fn record_equity(&mut self, point: EquityPoint) {
        self.track_drawdown(point.equity);
        if point.position_qty > 0.0 {
            self.bars_in_position += 1;
        }
        self.equity_curve.push(point);
    }

    /// Replaces the most recent equity point, e.g. after an end-of-data liquidation on the
    /// same bar.
    pub fn amend_last_equity(&mut self, point: EquityPoint) {
        match self.equity_curve.last_mut() {
            Some(last) => *last = point,
            None => {
                self.record_equity(point);
                return;
            }
        }
        self.peak_equity = 0.0;
        self.max_drawdown = 0.0;
        self.bars_in_position = 0;
        let curve: Vec<(f64, f64)> = self
            .equity_curve
            .iter()
            .map(|p| (p.equity, p.position_qty))
            .collect();
        for (equity, qty) in curve {
            self.track_drawdown(equity);
            if qty > 0.0 {
                self.bars_in_position += 1;
            }
        }
    }

    pub fn record_trade(&mut self, trade: Trade) {
        self.trades.push(trade);
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.equity_curve
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn max_drawdown(&self) -> f64 {
        self.max_drawdown
    }

    pub fn summary(&self) -> MetricsSummary {
        let final_equity = self
            .equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or(self.initial_equity);
        let total_return = if self.initial_equity > 0.0 {
            final_equity / self.initial_equity - 1.0
        } else {
            0.0
        };
        let (sharpe, volatility) = self.sharpe_and_volatility();
        let bars = self.equity_curve.len();

        MetricsSummary {
            bars_processed: bars,
            trades: self.trades.len(),
            initial_equity: self.initial_equity,
            final_equity,
            net_profit: final_equity - self.initial_equity,
            total_return,
            cagr: self.cagr(final_equity),
            sharpe,
            volatility,
            max_drawdown: self.max_drawdown,
            win_rate: win_rate(&self.trades),
            profit_factor: profit_factor(&self.trades),
            avg_trade: mean(self.trades.iter().map(|t| t.pnl)),
            avg_trade_pct: mean(self.trades.iter().map(|t| t.pnl_pct)),
            exposure: if bars == 0 {
                0.0
            } else {
                self.bars_in_position as f64 / bars as f64
            },
        }
    }

    pub fn into_parts(self) -> (Vec<EquityPoint>, Vec<Trade>, MetricsSummary) {
        let summary = self.summary();
        (self.equity_curve, self.trades, summary)
    }

    fn track_drawdown(&mut self, equity: f64) {
        if self.peak_equity == 0.0 || equity > self.peak_equity {
            self.peak_equity = equity;
        } else if self.peak_equity > 0.0 {
            let drawdown = (self.peak_equity - equity) / self.peak_equity;
            if drawdown > self.max_drawdown {
                self.max_drawdown = drawdown;
            }
        }
    }

    fn cagr(&self, final_equity: f64) -> Option<f64> {
        let first = self.equity_curve.first()?;
        let last = self.equity_curve.last()?;
        let days = (last.timestamp - first.timestamp) as f64 / SECONDS_PER_DAY;
        if days <= 0.0 || self.initial_equity <= 0.0 || final_equity < 0.0 {
            return None;
        }
        Some((final_equity / self.initial_equity).powf(365.0 / days) - 1.0)
    }

    fn sharpe_and_volatility(&self) -> (Option<f64>, Option<f64>) {
        let returns = period_returns(self.equity_curve.iter().map(|p| p.equity));
        let Some(std) = sample_std(&returns) else {
            return (None, None);
        };
        let scale = self.config.annualization_factor.sqrt();
        let volatility = Some(std * scale);
        if std < STD_EPSILON {
            return (None, volatility);
        }
        let excess =
            mean(returns.iter().map(|r| r - self.config.risk_free_rate)).unwrap_or(0.0);
        (Some(excess / std * scale), volatility)
    }
}

/// Simple returns between consecutive positive values.
pub fn period_returns(values: impl IntoIterator<Item = f64>) -> Vec<f64> {
    let values: Vec<f64> = values.into_iter().collect();
    values
        .windows(2)
        .filter(|pair| pair[0] > 0.0)
        .map(|pair| pair[1] / pair[0] - 1.0)
        .collect()
}

pub fn mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

/// Sample standard deviation (n - 1); `None` below two samples.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let avg = mean(values.iter().copied())?;
    let var = values.iter().map(|v| (v - avg) * (v - avg)).sum::<f64>()
        / (values.len() as f64 - 1.0);
    Some(var.sqrt())
}

pub fn win_rate(trades: &[Trade]) -> Option<f64> {
    if trades.is_empty() {
        return None;
    }
    let wins = trades.iter().filter(|t| t.is_win()).count();
    Some(wins as f64 / trades.len() as f64)
}

pub fn profit_factor(trades: &[Trade]) -> Option<f64> {
    let gross_profit: f64 = trades.iter().filter(|t| t.pnl > 0.0).map(|t| t.pnl).sum();
    let gross_loss: f64 = trades.iter().filter(|t| t.pnl < 0.0).map(|t| -t.pnl).sum();
    if gross_loss == 0.0 {
        return None;
    }
    Some(gross_profit / gross_loss)
}
