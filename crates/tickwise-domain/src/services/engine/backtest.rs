use crate::entities::metrics::{MetricsConfig, MetricsState, MetricsSummary};
use crate::errors::TickwiseError;
use crate::services::audit::{sort_events, AuditEvent};
use crate::services::market_data_source::MarketDataSource;
use crate::services::strategy::{SignalEngine, Strategy};
use crate::value_objects::action_type::ActionType;
use crate::value_objects::bar::Bar;
use crate::value_objects::equity_point::EquityPoint;
use crate::value_objects::fill::Fill;
use crate::value_objects::side::Side;
use crate::value_objects::signal::Signal;
use crate::value_objects::trade::Trade;
use serde::{Deserialize, Serialize};
use serde_json::json;

pub const END_OF_DATA: &str = "end_of_data";

/// When a signal raised on a bar's close is executed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillPolicy {
    /// At the close of the bar that raised the signal.
    #[default]
    SameBarClose,
    /// At the open of the following bar. A signal on the last bar never fills.
    NextBarOpen,
}

impl FillPolicy {
    pub fn parse(value: &str) -> Result<Self, String> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "same_bar_close" | "close" => Ok(FillPolicy::SameBarClose),
            "next_bar_open" | "next_open" => Ok(FillPolicy::NextBarOpen),
            other => Err(format!(
                "invalid fill policy '{}' (expected same_bar_close or next_bar_open)",
                other
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FillPolicy::SameBarClose => "same_bar_close",
            FillPolicy::NextBarOpen => "next_bar_open",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionState {
    AwaitingEntry,
    InPosition,
}

#[derive(Debug, Clone)]
pub struct BacktestConfig {
    pub initial_capital: f64,
    /// Commission in basis points of traded notional, charged on both legs.
    pub fee_bps: f64,
    pub fill_policy: FillPolicy,
    pub liquidate_at_end: bool,
    pub metrics: MetricsConfig,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_capital: 10_000.0,
            fee_bps: 10.0,
            fill_policy: FillPolicy::SameBarClose,
            liquidate_at_end: false,
            metrics: MetricsConfig::default(),
        }
    }
}

/// A position still open after the last bar, marked to its close.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpenPosition {
    pub symbol: String,
    pub entry_timestamp: i64,
    pub entry_price: f64,
    pub quantity: f64,
    pub mark_price: f64,
    pub unrealized_pnl: f64,
}

#[derive(Debug)]
pub struct BacktestResults {
    pub summary: MetricsSummary,
    pub trades: Vec<Trade>,
    pub fills: Vec<Fill>,
    pub equity: Vec<EquityPoint>,
    pub open_position: Option<OpenPosition>,
    pub final_state: PositionState,
    pub audit_events: Vec<AuditEvent>,
}

#[derive(Debug, Clone)]
struct Lot {
    entry_timestamp: i64,
    entry_price: f64,
    quantity: f64,
    entry_fee: f64,
}

impl Lot {
    fn cost(&self) -> f64 {
        self.quantity * self.entry_price + self.entry_fee
    }
}

#[derive(Debug, Clone)]
struct PendingOrder {
    side: Side,
    signal_timestamp: i64,
    reason: String,
}

/// Replays one strategy over one bar stream. Long-only, all-in sizing, one lot at a time.
pub struct BacktestRunner<S, D>
where
    S: Strategy,
    D: MarketDataSource,
{
    run_id: String,
    symbol: String,
    engine: SignalEngine<S>,
    data: D,
    config: BacktestConfig,
    metrics: MetricsState,
    cash: f64,
    realized_pnl: f64,
    lot: Option<Lot>,
    pending: Option<PendingOrder>,
    fills: Vec<Fill>,
    last_bar: Option<Bar>,
    audit_events: Vec<AuditEvent>,
}

impl<S, D> BacktestRunner<S, D>
where
    S: Strategy,
    D: MarketDataSource,
{
    pub fn new(
        run_id: String,
        symbol: String,
        strategy: S,
        data: D,
        config: BacktestConfig,
    ) -> Self {
        Self {
            run_id,
            symbol,
            engine: SignalEngine::new(strategy),
            data,
            metrics: MetricsState::new(config.metrics, config.initial_capital),
            cash: config.initial_capital,
            realized_pnl: 0.0,
            lot: None,
            pending: None,
            fills: Vec::new(),
            last_bar: None,
            audit_events: Vec::new(),
            config,
        }
    }

    pub fn state(&self) -> PositionState {
        if self.lot.is_some() {
            PositionState::InPosition
        } else {
            PositionState::AwaitingEntry
        }
    }

    pub fn run(&mut self) -> Result<BacktestResults, TickwiseError> {
        self.audit_events.push(
            self.event(0, "engine", "start").with_details(json!({
                "strategy": self.engine.strategy().name(),
                "fill_policy": self.config.fill_policy.as_str(),
                "fee_bps": self.config.fee_bps,
                "initial_capital": self.config.initial_capital,
            })),
        );

        while let Some(bar) = self.data.next_bar() {
            self.check_bar(&bar)?;
            self.execute_pending(&bar);

            let signal = self.engine.on_bar(&bar)?;
            self.handle_signal(&bar, &signal);

            self.record_equity(&bar);
            self.last_bar = Some(bar);
        }

        self.finish();

        let (equity, trades, summary) = std::mem::take(&mut self.metrics).into_parts();
        let completed_at = self.last_bar.as_ref().map_or(0, |bar| bar.timestamp);
        self.audit_events.push(
            self.event(completed_at, "engine", "complete").with_details(json!({
                "bars_processed": summary.bars_processed,
                "trades": summary.trades,
                "net_profit": summary.net_profit,
                "total_return": summary.total_return,
                "max_drawdown": summary.max_drawdown,
            })),
        );
        let mut audit_events = std::mem::take(&mut self.audit_events);
        sort_events(&mut audit_events);

        let open_position = match (&self.lot, &self.last_bar) {
            (Some(lot), Some(bar)) => Some(OpenPosition {
                symbol: self.symbol.clone(),
                entry_timestamp: lot.entry_timestamp,
                entry_price: lot.entry_price,
                quantity: lot.quantity,
                mark_price: bar.close,
                unrealized_pnl: (bar.close - lot.entry_price) * lot.quantity,
            }),
            _ => None,
        };

        Ok(BacktestResults {
            summary,
            trades,
            fills: std::mem::take(&mut self.fills),
            equity,
            open_position,
            final_state: self.state(),
            audit_events,
        })
    }

    fn check_bar(&self, bar: &Bar) -> Result<(), TickwiseError> {
        if let Some(prev) = &self.last_bar {
            if bar.timestamp <= prev.timestamp {
                return Err(TickwiseError::data_integrity(
                    &self.symbol,
                    bar.timestamp,
                    format!(
                        "non-monotonic bar sequence (previous timestamp {})",
                        prev.timestamp
                    ),
                ));
            }
        }
        let prices = [bar.open, bar.close];
        if prices.iter().any(|p| !p.is_finite() || *p <= 0.0) {
            return Err(TickwiseError::data_integrity(
                &self.symbol,
                bar.timestamp,
                format!("invalid bar prices (open {}, close {})", bar.open, bar.close),
            ));
        }
        Ok(())
    }

    fn execute_pending(&mut self, bar: &Bar) {
        let Some(order) = self.pending.take() else {
            return;
        };
        match order.side {
            Side::Buy => self.enter(bar.timestamp, bar.open, &order.reason),
            Side::Sell => self.exit(bar.timestamp, bar.open, &order.reason),
        }
    }

    fn handle_signal(&mut self, bar: &Bar, signal: &Signal) {
        if signal.is_actionable() {
            self.audit_events.push(
                self.event(bar.timestamp, "signal", signal.action.as_str())
                    .with_details(json!({
                        "strength": signal.strength.as_str(),
                        "reason": signal.reason,
                        "price": signal.price,
                        "state": format!("{:?}", self.state()),
                    })),
            );
        }

        let side = match (self.state(), signal.action) {
            (PositionState::AwaitingEntry, ActionType::Buy) => Side::Buy,
            (PositionState::InPosition, ActionType::Sell) => Side::Sell,
            _ => return,
        };

        match self.config.fill_policy {
            FillPolicy::SameBarClose => match side {
                Side::Buy => self.enter(bar.timestamp, bar.close, &signal.reason),
                Side::Sell => self.exit(bar.timestamp, bar.close, &signal.reason),
            },
            FillPolicy::NextBarOpen => {
                self.pending = Some(PendingOrder {
                    side,
                    signal_timestamp: bar.timestamp,
                    reason: signal.reason.clone(),
                });
                self.audit_events.push(
                    self.event(bar.timestamp, "order", "schedule")
                        .with_details(json!({ "side": side.as_str() })),
                );
            }
        }
    }

    fn fee_rate(&self) -> f64 {
        self.config.fee_bps / 10_000.0
    }

    fn enter(&mut self, timestamp: i64, price: f64, reason: &str) {
        let fee_rate = self.fee_rate();
        let quantity = if self.cash > 0.0 {
            self.cash / (price * (1.0 + fee_rate))
        } else {
            0.0
        };
        if !quantity.is_finite() || quantity <= 0.0 {
            self.audit_events.push(
                self.event(timestamp, "order", "reject")
                    .with_error("no_cash")
                    .with_details(json!({ "side": "BUY", "cash": self.cash })),
            );
            return;
        }
        let fee = quantity * price * fee_rate;
        self.cash -= quantity * price + fee;
        if self.cash < 0.0 {
            self.cash = 0.0;
        }
        self.lot = Some(Lot {
            entry_timestamp: timestamp,
            entry_price: price,
            quantity,
            entry_fee: fee,
        });
        self.push_fill(timestamp, Side::Buy, quantity, price, fee, reason);
    }

    fn exit(&mut self, timestamp: i64, price: f64, reason: &str) {
        let Some(lot) = self.lot.take() else {
            return;
        };
        let fee = lot.quantity * price * self.fee_rate();
        let proceeds = lot.quantity * price - fee;
        self.cash += proceeds;
        let cost = lot.cost();
        let pnl = proceeds - cost;
        self.realized_pnl += pnl;

        self.metrics.record_trade(Trade {
            symbol: self.symbol.clone(),
            entry_timestamp: lot.entry_timestamp,
            entry_price: lot.entry_price,
            exit_timestamp: timestamp,
            exit_price: price,
            quantity: lot.quantity,
            pnl,
            pnl_pct: if cost > 0.0 { pnl / cost } else { 0.0 },
            reason: reason.to_string(),
        });
        self.push_fill(timestamp, Side::Sell, lot.quantity, price, fee, reason);
    }

    fn push_fill(
        &mut self,
        timestamp: i64,
        side: Side,
        quantity: f64,
        price: f64,
        fee: f64,
        reason: &str,
    ) {
        self.audit_events.push(
            self.event(timestamp, "trade", side.as_str())
                .with_details(json!({
                    "qty": quantity,
                    "price": price,
                    "fee": fee,
                    "cash_after": self.cash,
                    "reason": reason,
                })),
        );
        self.fills.push(Fill {
            timestamp,
            symbol: self.symbol.clone(),
            side,
            quantity,
            price,
            fee,
            reason: reason.to_string(),
        });
    }

    fn equity_point(&self, bar: &Bar) -> EquityPoint {
        let (qty, unrealized) = match &self.lot {
            Some(lot) => (lot.quantity, (bar.close - lot.entry_price) * lot.quantity),
            None => (0.0, 0.0),
        };
        EquityPoint {
            timestamp: bar.timestamp,
            equity: self.cash + qty * bar.close,
            cash: self.cash,
            position_qty: qty,
            unrealized_pnl: unrealized,
            realized_pnl: self.realized_pnl,
        }
    }

    fn record_equity(&mut self, bar: &Bar) {
        let point = self.equity_point(bar);
        self.metrics.record_equity(point);
    }

    fn finish(&mut self) {
        let Some(bar) = self.last_bar.clone() else {
            return;
        };

        let required = self.engine.strategy().lookback();
        if self.engine.bars_seen() < required {
            self.audit_events.push(
                self.event(bar.timestamp, "engine", "insufficient_data")
                    .with_error("insufficient_data")
                    .with_details(json!({
                        "available": self.engine.bars_seen(),
                        "required": required,
                    })),
            );
        }

        if let Some(order) = self.pending.take() {
            self.audit_events.push(
                self.event(bar.timestamp, "order", "expired")
                    .with_details(json!({
                        "side": order.side.as_str(),
                        "signal_timestamp": order.signal_timestamp,
                        "reason": order.reason,
                    })),
            );
        }

        if self.config.liquidate_at_end && self.lot.is_some() {
            self.exit(bar.timestamp, bar.close, END_OF_DATA);
            let point = self.equity_point(&bar);
            self.metrics.amend_last_equity(point);
        }
    }

    fn event(&self, timestamp: i64, stage: &str, action: &str) -> AuditEvent {
        AuditEvent::new(&self.run_id, timestamp, stage, &self.symbol, action)
    }
}

#[cfg(test)]
mod tests {
    use super::{BacktestConfig, BacktestRunner, FillPolicy, PositionState};
    use crate::errors::TickwiseError;
    use crate::services::indicators::IndicatorSnapshot;
    use crate::services::market_data_source::VecBarSource;
    use crate::services::strategy::Strategy;
    use crate::value_objects::action_type::ActionType;
    use crate::value_objects::action_type::ActionType::{Buy, Hold, Sell};
    use crate::value_objects::bar::Bar;
    use crate::value_objects::side::Side;
    use crate::value_objects::signal::{Signal, SignalStrength};

    /// Emits a fixed action per bar index.
    struct Scripted {
        actions: Vec<ActionType>,
        index: usize,
    }

    impl Scripted {
        fn new(actions: Vec<ActionType>) -> Self {
            Self { actions, index: 0 }
        }
    }

    impl Strategy for Scripted {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn lookback(&self) -> usize {
            1
        }

        fn compute(&mut self, bar: &Bar) -> IndicatorSnapshot {
            self.index += 1;
            IndicatorSnapshot::new(bar.timestamp, bar.close, bar.volume)
        }

        fn evaluate(
            &self,
            bar: &Bar,
            _current: &IndicatorSnapshot,
            _prior: Option<&IndicatorSnapshot>,
        ) -> Signal {
            let action = self
                .actions
                .get(self.index - 1)
                .copied()
                .unwrap_or(ActionType::Hold);
            Signal::new(bar, "scripted", action, SignalStrength::Moderate, "scripted")
        }
    }

    fn bar(ts: i64, open: f64, close: f64) -> Bar {
        Bar {
            symbol: "SPY".to_string(),
            timestamp: ts * 86_400,
            open,
            high: open.max(close),
            low: open.min(close),
            close,
            volume: 1_000.0,
        }
    }

    fn config(fill_policy: FillPolicy) -> BacktestConfig {
        BacktestConfig {
            initial_capital: 1_000.0,
            fee_bps: 0.0,
            fill_policy,
            ..BacktestConfig::default()
        }
    }

    fn runner(
        bars: Vec<Bar>,
        actions: Vec<ActionType>,
        cfg: BacktestConfig,
    ) -> BacktestRunner<Scripted, VecBarSource> {
        BacktestRunner::new(
            "test".to_string(),
            "SPY".to_string(),
            Scripted::new(actions),
            VecBarSource::new(bars),
            cfg,
        )
    }

    #[test]
    fn same_bar_close_round_trip() {
        let bars = vec![bar(1, 10.0, 10.0), bar(2, 11.0, 12.0), bar(3, 12.0, 12.5)];
        let mut r = runner(bars, vec![Buy, Sell, Hold], config(FillPolicy::SameBarClose));
        let results = r.run().unwrap();
        assert_eq!(results.trades.len(), 1);
        let trade = &results.trades[0];
        assert_eq!(trade.entry_price, 10.0);
        assert_eq!(trade.exit_price, 12.0);
        assert!((trade.pnl - 200.0).abs() < 1e-9);
        assert!((results.summary.final_equity - 1_200.0).abs() < 1e-9);
        assert_eq!(results.final_state, PositionState::AwaitingEntry);
        assert_eq!(results.fills.len(), 2);
    }

    #[test]
    fn next_bar_open_fills_one_bar_later() {
        let bars = vec![
            bar(1, 10.0, 10.0),
            bar(2, 11.0, 12.0),
            bar(3, 13.0, 12.5),
            bar(4, 14.0, 14.0),
        ];
        let mut r = runner(bars, vec![Buy, Hold, Sell, Hold], config(FillPolicy::NextBarOpen));
        let results = r.run().unwrap();
        assert_eq!(results.fills[0].timestamp, 2 * 86_400);
        assert_eq!(results.fills[0].price, 11.0);
        assert_eq!(results.fills[1].side, Side::Sell);
        assert_eq!(results.fills[1].price, 14.0);
        assert_eq!(results.trades[0].exit_timestamp, 4 * 86_400);
    }

    #[test]
    fn signal_on_last_bar_expires_under_next_bar_open() {
        let bars = vec![bar(1, 10.0, 10.0), bar(2, 11.0, 12.0)];
        let mut r = runner(bars, vec![Hold, Buy], config(FillPolicy::NextBarOpen));
        let results = r.run().unwrap();
        assert!(results.fills.is_empty());
        assert!(results
            .audit_events
            .iter()
            .any(|e| e.stage == "order" && e.action == "expired"));
    }

    #[test]
    fn complete_event_is_stamped_with_last_bar_and_sorted_last() {
        let bars = vec![bar(1, 10.0, 10.0), bar(2, 11.0, 12.0)];
        let mut r = runner(bars, vec![Hold, Buy], config(FillPolicy::SameBarClose));
        let results = r.run().unwrap();
        let last = results.audit_events.last().unwrap();
        assert_eq!((last.stage.as_str(), last.action.as_str()), ("engine", "complete"));
        assert_eq!(last.timestamp, 2 * 86_400);
        assert_eq!(results.audit_events[0].action, "start");

        let mut empty = runner(Vec::new(), Vec::new(), config(FillPolicy::SameBarClose));
        let results = empty.run().unwrap();
        let stamps: Vec<(i64, &str)> = results
            .audit_events
            .iter()
            .map(|e| (e.timestamp, e.action.as_str()))
            .collect();
        assert_eq!(stamps, vec![(0, "start"), (0, "complete")]);
    }

    #[test]
    fn open_position_is_marked_not_realized() {
        let bars = vec![bar(1, 10.0, 10.0), bar(2, 11.0, 15.0)];
        let mut r = runner(bars, vec![Buy, Hold], config(FillPolicy::SameBarClose));
        let results = r.run().unwrap();
        assert!(results.trades.is_empty());
        assert_eq!(results.final_state, PositionState::InPosition);
        let open = results.open_position.unwrap();
        assert!((open.unrealized_pnl - 500.0).abs() < 1e-9);
        assert!((results.summary.final_equity - 1_500.0).abs() < 1e-9);
    }

    #[test]
    fn liquidate_at_end_closes_final_position() {
        let bars = vec![bar(1, 10.0, 10.0), bar(2, 11.0, 15.0)];
        let cfg = BacktestConfig {
            liquidate_at_end: true,
            fee_bps: 10.0,
            ..config(FillPolicy::SameBarClose)
        };
        let mut r = runner(bars, vec![Buy, Hold], cfg);
        let results = r.run().unwrap();
        assert_eq!(results.trades.len(), 1);
        assert_eq!(results.trades[0].reason, "end_of_data");
        assert!(results.open_position.is_none());
        let last = results.equity.last().unwrap();
        assert_eq!(last.position_qty, 0.0);
        assert!((last.equity - results.summary.final_equity).abs() < 1e-12);
        assert!(results.summary.final_equity < 1_500.0);
    }

    #[test]
    fn fees_are_charged_on_both_legs() {
        let bars = vec![bar(1, 100.0, 100.0), bar(2, 100.0, 100.0)];
        let cfg = BacktestConfig {
            fee_bps: 10.0,
            ..config(FillPolicy::SameBarClose)
        };
        let mut r = runner(bars, vec![Buy, Sell], cfg);
        let results = r.run().unwrap();
        let trade = &results.trades[0];
        assert!(trade.pnl < 0.0);
        let expected = 1_000.0 * (1.0 - 0.001) / (1.0 + 0.001);
        assert!((results.summary.final_equity - expected).abs() < 1e-9);
    }

    #[test]
    fn non_monotonic_bars_fail_fast() {
        let bars = vec![bar(2, 10.0, 10.0), bar(1, 10.0, 10.0)];
        let mut r = runner(bars, vec![Hold, Hold], config(FillPolicy::SameBarClose));
        match r.run() {
            Err(TickwiseError::DataIntegrity { timestamp, .. }) => assert_eq!(timestamp, 86_400),
            other => panic!("unexpected: {:?}", other.map(|r| r.summary)),
        }
    }
}
