use crate::value_objects::side::Side;
use serde::Serialize;

/// Immutable ledger record. Ids are unique and strictly increasing in append order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    pub id: u64,
    pub ticker: String,
    pub action: Side,
    pub quantity: f64,
    pub price: f64,
    pub timestamp: i64,
    pub notes: Option<String>,
}

/// A transaction request before the ledger has assigned it an id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub ticker: String,
    pub action: Side,
    pub quantity: f64,
    pub price: f64,
    pub timestamp: i64,
    pub notes: Option<String>,
}

impl NewTransaction {
    pub fn buy(ticker: &str, quantity: f64, price: f64, timestamp: i64) -> Self {
        Self {
            ticker: ticker.to_string(),
            action: Side::Buy,
            quantity,
            price,
            timestamp,
            notes: None,
        }
    }

    pub fn sell(ticker: &str, quantity: f64, price: f64, timestamp: i64) -> Self {
        Self {
            ticker: ticker.to_string(),
            action: Side::Sell,
            quantity,
            price,
            timestamp,
            notes: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}
