//! Simple Moving Average.
//!
//! Rolling mean of the last n closes. Warmup: first (n-1) bars are invalid.

use crate::domain::candle::Candle;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

pub fn calculate_sma(candles: &[Candle], period: usize) -> IndicatorSeries {
    if period == 0 {
        return IndicatorSeries::not_ready(IndicatorType::Sma(period), candles);
    }

    let mut values = Vec::with_capacity(candles.len());
    let mut sum = 0.0;

    for (i, candle) in candles.iter().enumerate() {
        sum += candle.close;
        if i >= period {
            sum -= candles[i - period].close;
        }
        let valid = i + 1 >= period;
        values.push(IndicatorPoint {
            timestamp: candle.timestamp,
            valid,
            value: IndicatorValue::Simple(if valid { sum / period as f64 } else { 0.0 }),
        });
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Sma(period),
        values,
    }
}
