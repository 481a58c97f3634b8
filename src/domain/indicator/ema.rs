//! Exponential Moving Average.
//!
//! k = 2/(n+1), seed with first SMA, then EMA[i] = C[i]*k + EMA[i-1]*(1-k).
//! Warmup: first (n-1) bars are invalid.

use crate::domain::candle::Candle;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

pub fn calculate_ema(candles: &[Candle], period: usize) -> IndicatorSeries {
    if period == 0 {
        return IndicatorSeries::not_ready(IndicatorType::Ema(period), candles);
    }

    let mut values = Vec::with_capacity(candles.len());
    let k = 2.0 / (period as f64 + 1.0);
    let mut ema = 0.0;
    let mut sum = 0.0;

    for (i, candle) in candles.iter().enumerate() {
        let (valid, value) = if i + 1 < period {
            sum += candle.close;
            (false, 0.0)
        } else if i + 1 == period {
            sum += candle.close;
            ema = sum / period as f64;
            (true, ema)
        } else {
            ema = candle.close * k + ema * (1.0 - k);
            (true, ema)
        };
        values.push(IndicatorPoint {
            timestamp: candle.timestamp,
            valid,
            value: IndicatorValue::Simple(value),
        });
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Ema(period),
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_support::candles_from_closes;

    #[test]
    fn ema_warmup() {
        let candles = candles_from_closes(&[10.0, 20.0, 30.0, 40.0, 50.0]);
        let series = calculate_ema(&candles, 3);

        assert!(!series.values[0].valid);
        assert!(!series.values[1].valid);
        assert!(series.values[2].valid);
        assert!(series.values[4].valid);
    }

    #[test]
    fn ema_period_1_tracks_close() {
        let candles = candles_from_closes(&[10.0, 20.0, 30.0]);
        let series = calculate_ema(&candles, 1);
        assert_eq!(series.simple_at(0), Some(10.0));
        assert_eq!(series.simple_at(1), Some(20.0));
        assert_eq!(series.simple_at(2), Some(30.0));
    }

    #[test]
    fn ema_recursive_calculation() {
        let candles = candles_from_closes(&[10.0, 20.0, 30.0, 40.0, 50.0]);
        let series = calculate_ema(&candles, 3);

        let k = 2.0 / 4.0;
        let sma = (10.0 + 20.0 + 30.0) / 3.0;
        let ema_3 = 40.0 * k + sma * (1.0 - k);
        let ema_4 = 50.0 * k + ema_3 * (1.0 - k);

        assert!((series.simple_at(2).unwrap() - sma).abs() < f64::EPSILON);
        assert!((series.simple_at(3).unwrap() - ema_3).abs() < f64::EPSILON);
        assert!((series.simple_at(4).unwrap() - ema_4).abs() < f64::EPSILON);
    }

    #[test]
    fn ema_equal_prices() {
        let candles = candles_from_closes(&[100.0; 5]);
        let series = calculate_ema(&candles, 3);
        for i in 2..5 {
            assert!((series.simple_at(i).unwrap() - 100.0).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn ema_period_0() {
        let candles = candles_from_closes(&[10.0, 20.0]);
        let series = calculate_ema(&candles, 0);
        assert_eq!(series.len(), 2);
        assert_eq!(series.simple_at(1), None);
    }
}
