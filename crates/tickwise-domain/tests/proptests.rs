use proptest::prelude::*;
use tickwise_domain::entities::ledger::Ledger;
use tickwise_domain::entities::metrics::{MetricsConfig, MetricsState};
use tickwise_domain::errors::TickwiseError;
use tickwise_domain::services::engine::backtest::{BacktestConfig, BacktestRunner, FillPolicy};
use tickwise_domain::services::indicators::IndicatorSpec;
use tickwise_domain::services::market_data_source::VecBarSource;
use tickwise_domain::services::strategy::{
    BandMode, BollingerParams, BollingerStrategy, MaCrossover, MaCrossoverParams,
    MacdStochastic, MacdStochasticParams, SignalEngine, StrategyKind,
};
use tickwise_domain::value_objects::bar::Bar;
use tickwise_domain::value_objects::equity_point::EquityPoint;
use tickwise_domain::value_objects::side::Side;
use tickwise_domain::value_objects::transaction::NewTransaction;

fn bar(ts: i64, close: f64, volume: f64) -> Bar {
    Bar {
        symbol: "TEST".to_string(),
        timestamp: ts * 86_400,
        open: close,
        high: close * 1.01,
        low: close * 0.99,
        close,
        volume,
    }
}

fn bars_from(closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(idx, close)| bar(idx as i64, *close, 1_000.0 + (idx % 7) as f64 * 150.0))
        .collect()
}

fn small_strategies() -> Vec<StrategyKind> {
    vec![
        StrategyKind::MaCrossover(MaCrossover::new(MaCrossoverParams {
            fast_period: 3,
            slow_period: 8,
            rsi_period: 5,
            ..MaCrossoverParams::default()
        })),
        StrategyKind::Bollinger(BollingerStrategy::new(BollingerParams {
            period: 6,
            rsi_period: 4,
            ..BollingerParams::default()
        })),
        StrategyKind::Bollinger(BollingerStrategy::new(BollingerParams {
            period: 6,
            rsi_period: 4,
            mode: BandMode::Breakout,
            ..BollingerParams::default()
        })),
        StrategyKind::MacdStochastic(MacdStochastic::new(MacdStochasticParams {
            fast: 3,
            slow: 6,
            signal: 3,
            stoch_k: 5,
            stoch_d: 2,
            stoch_smooth: 2,
            ..MacdStochasticParams::default()
        })),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]

    #[test]
    fn signals_never_depend_on_later_bars(
        closes in prop::collection::vec(1.0f64..500.0, 2..80),
        cut in 1usize..80,
    ) {
        let bars = bars_from(&closes);
        let cut = cut.min(bars.len());

        let full: Vec<_> = small_strategies()
            .into_iter()
            .map(|s| SignalEngine::new(s).signals(&bars).unwrap())
            .collect();
        let prefix: Vec<_> = small_strategies()
            .into_iter()
            .map(|s| SignalEngine::new(s).signals(&bars[..cut]).unwrap())
            .collect();

        for (full, prefix) in full.iter().zip(prefix.iter()) {
            prop_assert_eq!(&full[..cut], &prefix[..]);
        }
    }

    #[test]
    fn indicators_undefined_until_lookback(
        closes in prop::collection::vec(0.01f64..10_000.0, 2..80),
    ) {
        let bars = bars_from(&closes);
        for raw in ["sma:5", "ema:7", "rsi:6", "macd:3,6,3", "bollinger:5,2", "stochastic:5,3,2", "atr:4"] {
            let spec = IndicatorSpec::parse(raw).unwrap();
            let lookback = spec.lookback();
            for (idx, (_, value)) in spec.series(&bars).unwrap().enumerate() {
                if idx + 1 < lookback {
                    prop_assert!(value.is_none(), "{} defined at bar {}", raw, idx);
                } else {
                    prop_assert!(value.is_some(), "{} undefined at bar {}", raw, idx);
                    prop_assert!(value.unwrap().is_finite());
                }
            }
        }
    }

    #[test]
    fn rsi_stays_in_range(
        closes in prop::collection::vec(0.01f64..10_000.0, 2..80),
    ) {
        let bars = bars_from(&closes);
        let spec = IndicatorSpec::parse("rsi:5").unwrap();
        for (_, value) in spec.series(&bars).unwrap() {
            if let Some(value) = value {
                let v = value.columns()[0];
                prop_assert!((0.0..=100.0).contains(&v), "rsi {}", v);
            }
        }
    }

    #[test]
    fn ledger_positions_match_replay(
        ops in prop::collection::vec((any::<bool>(), 0.5f64..40.0, 1.0f64..500.0), 1..60),
    ) {
        let mut ledger = Ledger::new();
        for (idx, (is_buy, qty, price)) in ops.into_iter().enumerate() {
            let request = if is_buy {
                NewTransaction::buy("abc", qty, price, idx as i64)
            } else {
                NewTransaction::sell("abc", qty, price, idx as i64)
            };
            let before_len = ledger.transactions().len();
            let before_shares = ledger.shares("ABC");
            match ledger.record_transaction(request) {
                Ok(tx) => {
                    prop_assert_eq!(tx.id as usize, before_len + 1);
                    prop_assert_eq!(tx.ticker.as_str(), "ABC");
                }
                Err(TickwiseError::InsufficientShares { held, .. }) => {
                    prop_assert_eq!(ledger.transactions().len(), before_len);
                    prop_assert_eq!(ledger.shares("ABC"), before_shares);
                    prop_assert_eq!(held, before_shares);
                }
                Err(other) => prop_assert!(false, "unexpected error {:?}", other),
            }
            prop_assert!(ledger.shares("ABC") >= 0.0);
        }

        prop_assert!(ledger.is_consistent());
        let replayed = Ledger::replay(ledger.transactions()).unwrap();
        let live: Vec<_> = ledger.positions().cloned().collect();
        let derived: Vec<_> = replayed.into_values().collect();
        prop_assert_eq!(live, derived);

        let reloaded = Ledger::from_transactions(ledger.transactions().to_vec()).unwrap();
        prop_assert_eq!(reloaded.realized_pnl(), ledger.realized_pnl());
        prop_assert_eq!(reloaded.next_id(), ledger.next_id());
    }

    #[test]
    fn drawdown_is_a_fraction(
        equities in prop::collection::vec(0.01f64..10_000.0, 1..80),
    ) {
        let mut state = MetricsState::new(MetricsConfig::default(), equities[0]);
        for (idx, equity) in equities.iter().enumerate() {
            state.record_equity(EquityPoint {
                timestamp: idx as i64 * 86_400,
                equity: *equity,
                cash: *equity,
                position_qty: 0.0,
                unrealized_pnl: 0.0,
                realized_pnl: 0.0,
            });
        }
        let summary = state.summary();
        prop_assert!(summary.max_drawdown >= 0.0 && summary.max_drawdown <= 1.0);
        prop_assert_eq!(summary.bars_processed, equities.len());
        if let Some(sharpe) = summary.sharpe {
            prop_assert!(sharpe.is_finite());
        }
    }

    #[test]
    fn backtest_keeps_cash_non_negative(
        closes in prop::collection::vec(1.0f64..500.0, 2..120),
        fee_bps in 0.0f64..100.0,
        next_open in any::<bool>(),
    ) {
        let bars = bars_from(&closes);
        let fill_policy = if next_open { FillPolicy::NextBarOpen } else { FillPolicy::SameBarClose };
        let strategy = StrategyKind::MaCrossover(MaCrossover::new(MaCrossoverParams {
            fast_period: 2,
            slow_period: 5,
            rsi_period: 3,
            rsi_overbought: 99.0,
            rsi_oversold: 1.0,
            ..MaCrossoverParams::default()
        }));
        let config = BacktestConfig {
            initial_capital: 10_000.0,
            fee_bps,
            fill_policy,
            ..BacktestConfig::default()
        };
        let mut runner = BacktestRunner::new(
            "prop".to_string(),
            "TEST".to_string(),
            strategy,
            VecBarSource::new(bars.clone()),
            config,
        );
        let results = runner.run().unwrap();

        prop_assert_eq!(results.equity.len(), bars.len());
        for point in &results.equity {
            prop_assert!(point.cash >= 0.0);
            prop_assert!(point.equity > 0.0);
        }
        for (idx, fill) in results.fills.iter().enumerate() {
            let expected = if idx % 2 == 0 { Side::Buy } else { Side::Sell };
            prop_assert_eq!(fill.side, expected);
        }
        prop_assert_eq!(results.trades.len(), results.fills.len() / 2);
        prop_assert_eq!(results.open_position.is_some(), results.fills.len() % 2 == 1);
    }
}
