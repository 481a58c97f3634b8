//! Bollinger Bands.
//!
//! - Middle: SMA over n periods
//! - Upper: Middle + (multiplier × StdDev)
//! - Lower: Middle - (multiplier × StdDev)
//!
//! StdDev is the population standard deviation (divides by N, not N-1).
//! The multiplier is carried as x100 so the type stays hashable.
//! Warmup: first (period-1) bars are invalid.

use crate::domain::candle::Candle;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

pub fn calculate_bollinger(
    candles: &[Candle],
    period: usize,
    stddev_mult_x100: u32,
) -> IndicatorSeries {
    let indicator_type = IndicatorType::Bollinger {
        period,
        stddev_mult_x100,
    };
    if period == 0 {
        return IndicatorSeries::not_ready(indicator_type, candles);
    }

    let mult = stddev_mult_x100 as f64 / 100.0;
    let mut values = Vec::with_capacity(candles.len());

    for (i, candle) in candles.iter().enumerate() {
        let valid = i + 1 >= period;

        let (upper, middle, lower) = if valid {
            let window = &candles[i + 1 - period..=i];
            let middle = window.iter().map(|c| c.close).sum::<f64>() / period as f64;
            let variance = window
                .iter()
                .map(|c| {
                    let diff = c.close - middle;
                    diff * diff
                })
                .sum::<f64>()
                / period as f64;
            let stddev = variance.sqrt();
            (middle + mult * stddev, middle, middle - mult * stddev)
        } else {
            (0.0, 0.0, 0.0)
        };

        values.push(IndicatorPoint {
            timestamp: candle.timestamp,
            valid,
            value: IndicatorValue::Bands {
                upper,
                middle,
                lower,
            },
        });
    }

    IndicatorSeries {
        indicator_type,
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_support::candles_from_closes;

    #[test]
    fn bollinger_warmup() {
        let candles = candles_from_closes(&[10.0, 20.0, 30.0, 40.0, 50.0]);
        let series = calculate_bollinger(&candles, 3, 200);
        assert!(!series.values[0].valid);
        assert!(!series.values[1].valid);
        assert!(series.values[2].valid);
        assert!(series.values[4].valid);
    }

    #[test]
    fn bollinger_constant_values_collapse() {
        let candles = candles_from_closes(&[100.0; 5]);
        let series = calculate_bollinger(&candles, 3, 200);
        let (upper, middle, lower) = series.bands_at(2).unwrap();
        assert!((middle - 100.0).abs() < f64::EPSILON);
        assert!((upper - 100.0).abs() < f64::EPSILON);
        assert!((lower - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn bollinger_basic_calculation() {
        let candles = candles_from_closes(&[10.0, 20.0, 30.0]);
        let series = calculate_bollinger(&candles, 3, 200);
        let (upper, middle, lower) = series.bands_at(2).unwrap();

        let stddev = (200.0_f64 / 3.0).sqrt();
        assert!((middle - 20.0).abs() < 1e-10);
        assert!((upper - (20.0 + 2.0 * stddev)).abs() < 1e-10);
        assert!((lower - (20.0 - 2.0 * stddev)).abs() < 1e-10);
    }

    #[test]
    fn bollinger_symmetry() {
        let candles = candles_from_closes(&[10.0, 25.0, 30.0, 12.0]);
        let series = calculate_bollinger(&candles, 3, 150);
        let (upper, middle, lower) = series.bands_at(3).unwrap();
        assert!(((upper - middle) - (middle - lower)).abs() < 1e-10);
    }

    #[test]
    fn bollinger_not_simple() {
        let candles = candles_from_closes(&[10.0, 20.0, 30.0]);
        let series = calculate_bollinger(&candles, 3, 200);
        assert_eq!(series.simple_at(2), None);
    }
}
