//! Candle data access port.

use crate::domain::candle::Candle;
use crate::domain::error::BacktestError;

pub trait DataPort {
    /// All candles from the source, in source order. Ordering and shape are
    /// validated by the engine, not here.
    fn fetch_candles(&self) -> Result<Vec<Candle>, BacktestError>;
}
