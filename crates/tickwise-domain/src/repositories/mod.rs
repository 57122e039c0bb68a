//! Ports implemented by the infrastructure layer. Failures cross the boundary as strings and
//! are classified by the calling use case.

pub mod artifacts;
pub mod ledger;
pub mod market_data;
pub mod valuation;
