pub mod ledger;
pub mod metrics;
pub mod valuation;
