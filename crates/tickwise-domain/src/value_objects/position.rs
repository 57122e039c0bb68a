use serde::Serialize;

/// Aggregate holding for one ticker. `cost_basis` is the average price paid per share.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Position {
    pub ticker: String,
    pub shares: f64,
    pub cost_basis: f64,
    pub purchase_date: i64,
}

impl Position {
    pub fn total_cost(&self) -> f64 {
        self.shares * self.cost_basis
    }
}
