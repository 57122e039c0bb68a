use crate::errors::TickwiseError;
use crate::value_objects::position::Position;
use crate::value_objects::side::Side;
use crate::value_objects::transaction::{NewTransaction, Transaction};
use std::collections::BTreeMap;

/// Shares at or below this are treated as a closed position.
pub const SHARE_EPSILON: f64 = 1e-9;

/// Append-only transaction log with the positions it implies.
///
/// Positions are maintained incrementally on every append and can be re-derived at any
/// time by replaying the log; both paths go through `apply`, so they agree exactly.
#[derive(Debug, Default, Clone)]
pub struct Ledger {
    transactions: Vec<Transaction>,
    positions: BTreeMap<String, Position>,
    realized_pnl: f64,
    next_id: u64,
}

impl Ledger {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            ..Self::default()
        }
    }

    /// Rebuilds a ledger from stored transactions. A stored SELL that exceeds the holding at
    /// that point is corrupt history and is reported as a data-integrity error.
    pub fn from_transactions(transactions: Vec<Transaction>) -> Result<Self, TickwiseError> {
        let mut ledger = Ledger::new();
        for tx in transactions {
            if tx.id < ledger.next_id {
                return Err(TickwiseError::data_integrity(
                    &tx.ticker,
                    tx.timestamp,
                    format!(
                        "transaction id {} is not greater than previous id {}",
                        tx.id,
                        ledger.next_id - 1
                    ),
                ));
            }
            validate(&tx.ticker, tx.quantity, tx.price).map_err(|err| {
                TickwiseError::data_integrity(
                    &tx.ticker,
                    tx.timestamp,
                    format!("transaction {}: {}", tx.id, err),
                )
            })?;
            let realized = apply(&mut ledger.positions, &tx).map_err(|err| match err {
                TickwiseError::InsufficientShares { requested, held, .. } => {
                    TickwiseError::data_integrity(
                        &tx.ticker,
                        tx.timestamp,
                        format!(
                            "transaction {} sells {} shares while {} are held",
                            tx.id, requested, held
                        ),
                    )
                }
                other => other,
            })?;
            ledger.realized_pnl += realized;
            ledger.next_id = tx.id + 1;
            ledger.transactions.push(tx);
        }
        Ok(ledger)
    }

    /// Validates and appends one transaction. On error the ledger is left untouched.
    pub fn record_transaction(
        &mut self,
        request: NewTransaction,
    ) -> Result<Transaction, TickwiseError> {
        let ticker = normalize_ticker(&request.ticker);
        validate(&ticker, request.quantity, request.price)?;
        let tx = Transaction {
            id: self.next_id.max(1),
            ticker,
            action: request.action,
            quantity: request.quantity,
            price: request.price,
            timestamp: request.timestamp,
            notes: request
                .notes
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty()),
        };
        let realized = apply(&mut self.positions, &tx)?;
        self.realized_pnl += realized;
        self.next_id = tx.id + 1;
        self.transactions.push(tx.clone());
        Ok(tx)
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Open positions, ordered by ticker.
    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn position(&self, ticker: &str) -> Option<&Position> {
        self.positions.get(&normalize_ticker(ticker))
    }

    pub fn shares(&self, ticker: &str) -> f64 {
        self.position(ticker).map(|p| p.shares).unwrap_or(0.0)
    }

    pub fn realized_pnl(&self) -> f64 {
        self.realized_pnl
    }

    pub fn next_id(&self) -> u64 {
        self.next_id.max(1)
    }

    /// Positions derived from scratch by replaying `transactions` in order.
    pub fn replay(
        transactions: &[Transaction],
    ) -> Result<BTreeMap<String, Position>, TickwiseError> {
        let mut positions = BTreeMap::new();
        for tx in transactions {
            apply(&mut positions, tx)?;
        }
        Ok(positions)
    }

    pub fn is_consistent(&self) -> bool {
        match Self::replay(&self.transactions) {
            Ok(replayed) => replayed == self.positions,
            Err(_) => false,
        }
    }
}

pub fn normalize_ticker(ticker: &str) -> String {
    ticker.trim().to_ascii_uppercase()
}

fn validate(ticker: &str, quantity: f64, price: f64) -> Result<(), TickwiseError> {
    if ticker.is_empty() {
        return Err(TickwiseError::InvalidTransaction(
            "ticker must not be empty".to_string(),
        ));
    }
    if !quantity.is_finite() || quantity <= 0.0 {
        return Err(TickwiseError::InvalidTransaction(format!(
            "quantity for {} must be positive, got {}",
            ticker, quantity
        )));
    }
    if !price.is_finite() || price <= 0.0 {
        return Err(TickwiseError::InvalidTransaction(format!(
            "price for {} must be positive, got {}",
            ticker, price
        )));
    }
    Ok(())
}

/// Applies one transaction to `positions` and returns the realized P/L it produced.
/// Nothing is mutated when the transaction is rejected.
fn apply(
    positions: &mut BTreeMap<String, Position>,
    tx: &Transaction,
) -> Result<f64, TickwiseError> {
    match tx.action {
        Side::Buy => {
            match positions.get_mut(&tx.ticker) {
                Some(pos) => {
                    let shares = pos.shares + tx.quantity;
                    pos.cost_basis = (pos.total_cost() + tx.quantity * tx.price) / shares;
                    pos.shares = shares;
                }
                None => {
                    positions.insert(
                        tx.ticker.clone(),
                        Position {
                            ticker: tx.ticker.clone(),
                            shares: tx.quantity,
                            cost_basis: tx.price,
                            purchase_date: tx.timestamp,
                        },
                    );
                }
            }
            Ok(0.0)
        }
        Side::Sell => {
            let held = positions.get(&tx.ticker).map(|p| p.shares).unwrap_or(0.0);
            if tx.quantity > held + SHARE_EPSILON {
                return Err(TickwiseError::InsufficientShares {
                    ticker: tx.ticker.clone(),
                    requested: tx.quantity,
                    held,
                });
            }
            let Some(pos) = positions.get_mut(&tx.ticker) else {
                return Ok(0.0);
            };
            let realized = (tx.price - pos.cost_basis) * tx.quantity;
            pos.shares -= tx.quantity;
            if pos.shares <= SHARE_EPSILON {
                positions.remove(&tx.ticker);
            }
            Ok(realized)
        }
    }
}
