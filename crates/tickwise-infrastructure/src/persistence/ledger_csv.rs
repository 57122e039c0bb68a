use super::{append_row, open_reader};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tickwise_domain::repositories::ledger::LedgerRepository;
use tickwise_domain::value_objects::side::Side;
use tickwise_domain::value_objects::timestamp::{format_timestamp, parse_timestamp};
use tickwise_domain::value_objects::transaction::Transaction;

const HEADER: [&str; 7] = ["id", "ticker", "action", "quantity", "price", "timestamp", "notes"];

#[derive(Debug, Deserialize)]
struct TransactionRecord {
    id: u64,
    ticker: String,
    action: String,
    quantity: f64,
    price: f64,
    timestamp: String,
    #[serde(default)]
    notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CsvLedgerRepository {
    path: PathBuf,
}

impl CsvLedgerRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LedgerRepository for CsvLedgerRepository {
    fn load_transactions(&self) -> Result<Vec<Transaction>, String> {
        let Some(mut rdr) = open_reader(&self.path)? else {
            return Ok(Vec::new());
        };
        let mut transactions = Vec::new();
        for (idx, result) in rdr.deserialize::<TransactionRecord>().enumerate() {
            let line = idx + 2;
            let record = result.map_err(|err| {
                format!("failed to parse {} line {}: {}", self.path.display(), line, err)
            })?;
            let action = Side::parse(&record.action)
                .map_err(|err| format!("{} line {}: {}", self.path.display(), line, err))?;
            let timestamp = parse_timestamp(&record.timestamp)
                .map_err(|err| format!("{} line {}: {}", self.path.display(), line, err))?;
            transactions.push(Transaction {
                id: record.id,
                ticker: record.ticker,
                action,
                quantity: record.quantity,
                price: record.price,
                timestamp,
                notes: record.notes.filter(|n| !n.is_empty()),
            });
        }
        tracing::debug!(path = %self.path.display(), count = transactions.len(), "loaded ledger");
        Ok(transactions)
    }

    fn append_transaction(&self, transaction: &Transaction) -> Result<(), String> {
        let row = [
            transaction.id.to_string(),
            transaction.ticker.clone(),
            transaction.action.as_str().to_string(),
            transaction.quantity.to_string(),
            transaction.price.to_string(),
            format_timestamp(transaction.timestamp),
            transaction.notes.clone().unwrap_or_default(),
        ];
        append_row(&self.path, &HEADER, &row)?;
        metrics::counter!("tickwise.infra.ledger.appends_total").increment(1);
        Ok(())
    }
}
