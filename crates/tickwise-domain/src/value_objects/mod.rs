pub mod action_type;
pub mod bar;
pub mod equity_point;
pub mod fill;
pub mod position;
pub mod side;
pub mod signal;
pub mod timestamp;
pub mod trade;
pub mod transaction;
