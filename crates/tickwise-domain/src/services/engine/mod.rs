pub mod backtest;
pub mod benchmark;
