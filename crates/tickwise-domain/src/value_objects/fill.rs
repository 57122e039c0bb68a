use crate::value_objects::side::Side;

/// One executed leg inside a backtest.
#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub timestamp: i64,
    pub symbol: String,
    pub side: Side,
    pub quantity: f64,
    pub price: f64,
    pub fee: f64,
    pub reason: String,
}
