//! Technical indicator implementations.
//!
//! Every series is aligned 1:1 with the candle sequence it was computed from:
//! - `IndicatorPoint`: a single point, flagged invalid during warm-up
//! - `IndicatorValue`: the output shape (single value or bands)
//! - `IndicatorType`: indicator identity + parameters (serves as HashMap key)
//! - `IndicatorSeries`: a full aligned series

pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod rsi;
pub mod sma;

use crate::domain::candle::Candle;
use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorPoint {
    pub timestamp: NaiveDateTime,
    pub valid: bool,
    pub value: IndicatorValue,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IndicatorValue {
    Simple(f64),
    Bands { upper: f64, middle: f64, lower: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IndicatorType {
    Sma(usize),
    Ema(usize),
    Rsi(usize),
    Atr(usize),
    Bollinger { period: usize, stddev_mult_x100: u32 },
}

impl IndicatorType {
    /// Number of candles needed before the first valid point.
    pub fn warmup_bars(&self) -> usize {
        match *self {
            IndicatorType::Sma(n) | IndicatorType::Ema(n) | IndicatorType::Atr(n) => n.max(1),
            // n price changes need n + 1 closes
            IndicatorType::Rsi(n) => n.max(1) + 1,
            IndicatorType::Bollinger { period, .. } => period.max(1),
        }
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Sma(period) => write!(f, "SMA({})", period),
            IndicatorType::Ema(period) => write!(f, "EMA({})", period),
            IndicatorType::Rsi(period) => write!(f, "RSI({})", period),
            IndicatorType::Atr(period) => write!(f, "ATR({})", period),
            IndicatorType::Bollinger {
                period,
                stddev_mult_x100,
            } => {
                let mult = *stddev_mult_x100 as f64 / 100.0;
                write!(f, "BOLLINGER({},{})", period, mult)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    /// Series with every point in the not-ready state.
    pub(crate) fn not_ready(indicator_type: IndicatorType, candles: &[Candle]) -> Self {
        let values = candles
            .iter()
            .map(|c| IndicatorPoint {
                timestamp: c.timestamp,
                valid: false,
                value: IndicatorValue::Simple(0.0),
            })
            .collect();
        IndicatorSeries {
            indicator_type,
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Single value at `index`, `None` while warming up or out of range.
    pub fn simple_at(&self, index: usize) -> Option<f64> {
        match self.values.get(index) {
            Some(IndicatorPoint {
                valid: true,
                value: IndicatorValue::Simple(v),
                ..
            }) => Some(*v),
            _ => None,
        }
    }

    /// (upper, middle, lower) at `index`.
    pub fn bands_at(&self, index: usize) -> Option<(f64, f64, f64)> {
        match self.values.get(index) {
            Some(IndicatorPoint {
                valid: true,
                value:
                    IndicatorValue::Bands {
                        upper,
                        middle,
                        lower,
                    },
                ..
            }) => Some((*upper, *middle, *lower)),
            _ => None,
        }
    }

    pub fn is_valid_at(&self, index: usize) -> bool {
        self.values.get(index).is_some_and(|p| p.valid)
    }
}

/// Compute a single indicator over `candles`.
pub fn calculate(candles: &[Candle], indicator_type: IndicatorType) -> IndicatorSeries {
    match indicator_type {
        IndicatorType::Sma(period) => sma::calculate_sma(candles, period),
        IndicatorType::Ema(period) => ema::calculate_ema(candles, period),
        IndicatorType::Rsi(period) => rsi::calculate_rsi(candles, period),
        IndicatorType::Atr(period) => atr::calculate_atr(candles, period),
        IndicatorType::Bollinger {
            period,
            stddev_mult_x100,
        } => bollinger::calculate_bollinger(candles, period, stddev_mult_x100),
    }
}

/// Compute every requested indicator once; duplicates collapse.
pub fn compute_indicators(
    candles: &[Candle],
    types: &[IndicatorType],
) -> HashMap<IndicatorType, IndicatorSeries> {
    let mut out = HashMap::with_capacity(types.len());
    for t in types {
        out.entry(*t).or_insert_with(|| calculate(candles, *t));
    }
    out
}


#[cfg(test)]
mod tests {
    use super::test_support::candles_from_closes;
    use super::*;

    #[test]
    fn indicator_type_display() {
        assert_eq!(IndicatorType::Sma(20).to_string(), "SMA(20)");
        assert_eq!(IndicatorType::Rsi(14).to_string(), "RSI(14)");
        let boll = IndicatorType::Bollinger {
            period: 20,
            stddev_mult_x100: 200,
        };
        assert_eq!(boll.to_string(), "BOLLINGER(20,2)");
    }

    #[test]
    fn warmup_bars_per_indicator() {
        assert_eq!(IndicatorType::Sma(20).warmup_bars(), 20);
        assert_eq!(IndicatorType::Ema(9).warmup_bars(), 9);
        assert_eq!(IndicatorType::Atr(14).warmup_bars(), 14);
        assert_eq!(IndicatorType::Rsi(14).warmup_bars(), 15);
        assert_eq!(
            IndicatorType::Bollinger {
                period: 20,
                stddev_mult_x100: 200
            }
            .warmup_bars(),
            20
        );
    }

    #[test]
    fn compute_indicators_dedups() {
        let candles = candles_from_closes(&[1.0, 2.0, 3.0, 4.0]);
        let set = compute_indicators(
            &candles,
            &[IndicatorType::Sma(2), IndicatorType::Sma(2), IndicatorType::Ema(3)],
        );
        assert_eq!(set.len(), 2);
        assert_eq!(set[&IndicatorType::Sma(2)].len(), 4);
    }

    #[test]
    fn every_series_is_aligned_with_candles() {
        let candles = candles_from_closes(&[10.0, 11.0, 12.0]);
        for t in [
            IndicatorType::Sma(5),
            IndicatorType::Ema(5),
            IndicatorType::Rsi(5),
            IndicatorType::Atr(5),
            IndicatorType::Bollinger {
                period: 5,
                stddev_mult_x100: 200,
            },
        ] {
            let series = calculate(&candles, t);
            assert_eq!(series.len(), candles.len(), "{} misaligned", t);
            assert!(series.values.iter().all(|p| !p.valid));
        }
    }

    #[test]
    fn accessors_respect_validity() {
        let candles = candles_from_closes(&[10.0, 20.0, 30.0]);
        let series = calculate(&candles, IndicatorType::Sma(2));
        assert_eq!(series.simple_at(0), None);
        assert_eq!(series.simple_at(1), Some(15.0));
        assert_eq!(series.simple_at(9), None);
        assert_eq!(series.bands_at(1), None);
        assert!(series.is_valid_at(2));
    }
}
