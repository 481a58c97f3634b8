//! Core domain types and logic.

pub mod backtest;
pub mod candle;
pub mod config_validation;
pub mod equity;
pub mod error;
pub mod execution;
pub mod indicator;
pub mod metrics;
pub mod position;
pub mod risk;
pub mod signal;
pub mod strategies;
