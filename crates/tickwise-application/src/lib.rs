pub mod advisory;
pub mod backtesting;
pub mod config;
pub mod experiments;
pub mod indicators;
pub mod portfolio;
mod shared;
pub mod validation;
