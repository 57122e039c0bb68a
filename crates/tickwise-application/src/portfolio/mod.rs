use std::collections::BTreeMap;
use tickwise_domain::entities::ledger::{normalize_ticker, Ledger};
use tickwise_domain::entities::valuation::{
    performance_report, value_positions, PerformanceReport, Period, PositionValuation,
    ValuationRecord, ValuationTotals,
};
use tickwise_domain::errors::TickwiseError;
use tickwise_domain::repositories::ledger::LedgerRepository;
use tickwise_domain::repositories::market_data::{MarketDataRepository, OhlcvQuery};
use tickwise_domain::repositories::valuation::ValuationRepository;
use tickwise_domain::value_objects::transaction::{NewTransaction, Transaction};
use tracing::{info, info_span, warn};

#[derive(Debug, Clone, serde::Serialize)]
pub struct PortfolioSnapshot {
    pub positions: Vec<PositionValuation>,
    pub totals: ValuationTotals,
    pub missing_prices: Vec<String>,
    pub realized_pnl: f64,
    /// Performance from stored valuation history; absent with fewer than two points.
    pub metrics: Option<PerformanceReport>,
}

pub fn load_ledger(ledger_repo: &dyn LedgerRepository) -> Result<Ledger, TickwiseError> {
    let transactions = ledger_repo
        .load_transactions()
        .map_err(TickwiseError::Storage)?;
    Ledger::from_transactions(transactions)
}

/// Validates the request against the stored ledger and appends it. A rejected request
/// (oversell, invalid values) leaves the store untouched.
pub fn record_trade(
    ledger_repo: &dyn LedgerRepository,
    request: NewTransaction,
) -> Result<Transaction, TickwiseError> {
    let _span = info_span!(
        "record_trade",
        ticker = %request.ticker,
        action = %request.action
    )
    .entered();

    let mut ledger = load_ledger(ledger_repo)?;
    let transaction = match ledger.record_transaction(request) {
        Ok(tx) => tx,
        Err(err) => {
            metrics::counter!("tickwise.ledger.transactions_rejected").increment(1);
            warn!(error = %err, "transaction rejected");
            return Err(err);
        }
    };
    ledger_repo
        .append_transaction(&transaction)
        .map_err(TickwiseError::Storage)?;
    metrics::counter!("tickwise.ledger.transactions_recorded").increment(1);
    info!(
        id = transaction.id,
        quantity = transaction.quantity,
        price = transaction.price,
        held = ledger.shares(&transaction.ticker),
        "transaction recorded"
    );
    Ok(transaction)
}

/// Most recent `limit` transactions, oldest first. `None` returns the whole log.
pub fn list_transactions(
    ledger_repo: &dyn LedgerRepository,
    limit: Option<usize>,
) -> Result<Vec<Transaction>, TickwiseError> {
    let mut transactions = ledger_repo
        .load_transactions()
        .map_err(TickwiseError::Storage)?;
    if let Some(limit) = limit {
        let skip = transactions.len().saturating_sub(limit);
        transactions.drain(..skip);
    }
    Ok(transactions)
}

pub fn get_portfolio_snapshot(
    ledger_repo: &dyn LedgerRepository,
    valuation_repo: Option<&dyn ValuationRepository>,
    current_prices: &BTreeMap<String, f64>,
    period: Period,
) -> Result<PortfolioSnapshot, TickwiseError> {
    let _span = info_span!("get_portfolio_snapshot", period = %period).entered();

    let ledger = load_ledger(ledger_repo)?;
    let prices: BTreeMap<String, f64> = current_prices
        .iter()
        .map(|(ticker, price)| (normalize_ticker(ticker), *price))
        .collect();
    let valuation = value_positions(ledger.positions(), &prices);
    if !valuation.missing_prices.is_empty() {
        warn!(tickers = ?valuation.missing_prices, "positions carried at cost, no price");
    }

    let metrics = match valuation_repo {
        Some(repo) => {
            let history = repo.load_valuations().map_err(TickwiseError::Storage)?;
            performance_report(&history, period)
        }
        None => None,
    };
    metrics::gauge!("tickwise.portfolio.total_value").set(valuation.totals.total_value);

    Ok(PortfolioSnapshot {
        positions: valuation.positions,
        totals: valuation.totals,
        missing_prices: valuation.missing_prices,
        realized_pnl: ledger.realized_pnl(),
        metrics,
    })
}

/// Appends one point of portfolio value history.
pub fn store_valuation(
    valuation_repo: &dyn ValuationRepository,
    timestamp: i64,
    totals: &ValuationTotals,
) -> Result<ValuationRecord, TickwiseError> {
    let record = ValuationRecord::from_totals(timestamp, totals);
    valuation_repo
        .append_valuation(&record)
        .map_err(TickwiseError::Storage)?;
    metrics::counter!("tickwise.portfolio.valuations_stored").increment(1);
    Ok(record)
}

/// Last close per ticker from stored bars, overridden by `overrides`. Tickers whose data
/// cannot be loaded are left out and end up in the snapshot's `missing_prices`.
pub fn latest_prices(
    market_data: &dyn MarketDataRepository,
    tickers: &[String],
    overrides: &BTreeMap<String, f64>,
) -> BTreeMap<String, f64> {
    let mut prices = BTreeMap::new();
    for ticker in tickers {
        let ticker = normalize_ticker(ticker);
        match market_data.load_ohlcv(&OhlcvQuery::ticker(&ticker)) {
            Ok((bars, _report)) => {
                if let Some(bar) = bars.iter().max_by_key(|b| b.timestamp) {
                    prices.insert(ticker, bar.close);
                }
            }
            Err(err) => warn!(ticker = %ticker, error = %err, "no price data"),
        }
    }
    for (ticker, price) in overrides {
        prices.insert(normalize_ticker(ticker), *price);
    }
    prices
}

/// Tickers currently held in the ledger.
pub fn held_tickers(ledger: &Ledger) -> Vec<String> {
    ledger.positions().map(|p| p.ticker.clone()).collect()
}
