use crate::value_objects::transaction::Transaction;

pub trait LedgerRepository {
    /// All stored transactions in append order.
    fn load_transactions(&self) -> Result<Vec<Transaction>, String>;

    /// Durably appends a single record.
    fn append_transaction(&self, transaction: &Transaction) -> Result<(), String>;
}
