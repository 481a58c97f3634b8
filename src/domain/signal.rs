//! Strategy signal abstraction and the read-only market data it reads.

use std::collections::HashMap;

use super::candle::Candle;
use super::indicator::{compute_indicators, IndicatorSeries, IndicatorType};
use super::position::PositionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    EnterLong,
    EnterShort,
    Exit,
    Hold,
}

/// Candles plus the indicator series computed from them. Never mutated after
/// construction, so one instance can back many concurrent runs.
#[derive(Debug, Clone)]
pub struct MarketData {
    candles: Vec<Candle>,
    indicators: HashMap<IndicatorType, IndicatorSeries>,
}

impl MarketData {
    pub fn new(candles: Vec<Candle>, indicator_types: &[IndicatorType]) -> Self {
        let indicators = compute_indicators(&candles, indicator_types);
        MarketData {
            candles,
            indicators,
        }
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn candle(&self, index: usize) -> Option<&Candle> {
        self.candles.get(index)
    }

    pub fn indicator(&self, indicator_type: &IndicatorType) -> Option<&IndicatorSeries> {
        self.indicators.get(indicator_type)
    }

    /// Single-valued indicator at `index`; `None` while warming up.
    pub fn value(&self, indicator_type: &IndicatorType, index: usize) -> Option<f64> {
        self.indicators.get(indicator_type)?.simple_at(index)
    }

    /// Band indicator at `index` as (upper, middle, lower).
    pub fn bands(&self, indicator_type: &IndicatorType, index: usize) -> Option<(f64, f64, f64)> {
        self.indicators.get(indicator_type)?.bands_at(index)
    }
}

/// A trading strategy: maps the current bar and position to a [`Signal`].
///
/// Implementations must be pure with respect to their inputs; the engine may
/// call the same instance from several threads at once.
pub trait SignalFunction: Send + Sync {
    fn name(&self) -> &str;

    /// Indicators `evaluate` reads. The engine computes them up front and
    /// refuses to run on fewer candles than their longest warm-up.
    fn required_indicators(&self) -> Vec<IndicatorType>;

    fn evaluate(&self, bar_index: usize, market: &MarketData, position: PositionState) -> Signal;
}

/// Adapter turning a closure into a [`SignalFunction`].
pub struct FnSignal<F> {
    name: String,
    indicators: Vec<IndicatorType>,
    f: F,
}

impl<F> FnSignal<F>
where
    F: Fn(usize, &MarketData, PositionState) -> Signal + Send + Sync,
{
    pub fn new(name: impl Into<String>, indicators: Vec<IndicatorType>, f: F) -> Self {
        FnSignal {
            name: name.into(),
            indicators,
            f,
        }
    }
}

impl<F> SignalFunction for FnSignal<F>
where
    F: Fn(usize, &MarketData, PositionState) -> Signal + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn required_indicators(&self) -> Vec<IndicatorType> {
        self.indicators.clone()
    }

    fn evaluate(&self, bar_index: usize, market: &MarketData, position: PositionState) -> Signal {
        (self.f)(bar_index, market, position)
    }
}
