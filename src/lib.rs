//! candle-backtest: single-pass candle backtesting engine.
//!
//! Hexagonal layout: simulation logic in [`domain`], port traits in [`ports`],
//! file-backed implementations in [`adapters`], command line in [`cli`].

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod cli;
