use serde::Serialize;

/// A completed round trip: one entry fill closed by one exit fill. `pnl` is net of both fees.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trade {
    pub symbol: String,
    pub entry_timestamp: i64,
    pub entry_price: f64,
    pub exit_timestamp: i64,
    pub exit_price: f64,
    pub quantity: f64,
    pub pnl: f64,
    pub pnl_pct: f64,
    pub reason: String,
}

impl Trade {
    pub fn is_win(&self) -> bool {
        self.pnl > 0.0
    }
}
