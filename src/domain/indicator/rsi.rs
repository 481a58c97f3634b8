//! RSI (Relative Strength Index).
//!
//! Uses Wilder's smoothing for average gain/loss calculation:
//! - First average: simple mean of gains/losses over the first n changes
//! - Subsequent: avg = (prev_avg * (n-1) + current) / n
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//! If avg_loss == 0: RSI = 100 (50 when both averages are zero)
//!
//! Warmup: first n bars are invalid (need n price changes).

use crate::domain::candle::Candle;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        if avg_gain == 0.0 { 50.0 } else { 100.0 }
    } else {
        100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
    }
}

pub fn calculate_rsi(candles: &[Candle], period: usize) -> IndicatorSeries {
    if period == 0 || candles.len() < 2 {
        return IndicatorSeries::not_ready(IndicatorType::Rsi(period), candles);
    }

    let mut values = Vec::with_capacity(candles.len());
    values.push(IndicatorPoint {
        timestamp: candles[0].timestamp,
        valid: false,
        value: IndicatorValue::Simple(0.0),
    });

    let mut gain_sum = 0.0;
    let mut loss_sum = 0.0;
    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;

    for (i, candle) in candles.iter().enumerate().skip(1) {
        let change = candle.close - candles[i - 1].close;
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);
        // number of changes seen so far, this one included
        let seen = i;

        let point = if seen < period {
            gain_sum += gain;
            loss_sum += loss;
            IndicatorPoint {
                timestamp: candle.timestamp,
                valid: false,
                value: IndicatorValue::Simple(0.0),
            }
        } else {
            if seen == period {
                avg_gain = (gain_sum + gain) / period as f64;
                avg_loss = (loss_sum + loss) / period as f64;
            } else {
                avg_gain = (avg_gain * (period - 1) as f64 + gain) / period as f64;
                avg_loss = (avg_loss * (period - 1) as f64 + loss) / period as f64;
            }
            IndicatorPoint {
                timestamp: candle.timestamp,
                valid: true,
                value: IndicatorValue::Simple(rsi_from_averages(avg_gain, avg_loss)),
            }
        };
        values.push(point);
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Rsi(period),
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_support::candles_from_closes;

    #[test]
    fn rsi_empty() {
        let series = calculate_rsi(&[], 14);
        assert!(series.is_empty());
    }

    #[test]
    fn rsi_single_bar() {
        let candles = candles_from_closes(&[100.0]);
        let series = calculate_rsi(&candles, 14);
        assert_eq!(series.len(), 1);
        assert!(!series.values[0].valid);
    }

    #[test]
    fn rsi_warmup_period() {
        let closes: Vec<f64> = (1..=15).map(|i| 100.0 + (i as f64 % 5.0) * 2.0).collect();
        let candles = candles_from_closes(&closes);
        let series = calculate_rsi(&candles, 14);

        assert_eq!(series.len(), 15);
        for i in 0..14 {
            assert!(!series.values[i].valid, "bar {} should be invalid", i);
        }
        assert!(series.values[14].valid);
    }

    #[test]
    fn rsi_all_gains() {
        let closes: Vec<f64> = (0..15).map(|i| 100.0 + i as f64).collect();
        let series = calculate_rsi(&candles_from_closes(&closes), 14);
        assert!((series.simple_at(14).unwrap() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn rsi_all_losses() {
        let closes: Vec<f64> = (0..15).map(|i| 100.0 - i as f64).collect();
        let series = calculate_rsi(&candles_from_closes(&closes), 14);
        assert!(series.simple_at(14).unwrap().abs() < f64::EPSILON);
    }

    #[test]
    fn rsi_flat_prices_are_neutral() {
        let series = calculate_rsi(&candles_from_closes(&[100.0; 6]), 3);
        assert!((series.simple_at(5).unwrap() - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn rsi_in_range() {
        let closes: Vec<f64> = (1..=40)
            .map(|i| 100.0 + (i as f64 % 7.0 - 3.0) * 2.0)
            .collect();
        let series = calculate_rsi(&candles_from_closes(&closes), 14);
        for i in 0..series.len() {
            if let Some(rsi) = series.simple_at(i) {
                assert!((0.0..=100.0).contains(&rsi), "RSI {} out of range", rsi);
            }
        }
    }

    #[test]
    fn rsi_wilder_smoothing_step() {
        // period 2: changes +2, -1, +3
        let candles = candles_from_closes(&[10.0, 12.0, 11.0, 14.0]);
        let series = calculate_rsi(&candles, 2);

        let (g1, l1) = ((2.0 + 0.0) / 2.0, (0.0 + 1.0) / 2.0);
        let first = 100.0 - 100.0 / (1.0 + g1 / l1);
        assert!((series.simple_at(2).unwrap() - first).abs() < 1e-12);

        let (g2, l2) = ((g1 * 1.0 + 3.0) / 2.0, (l1 * 1.0 + 0.0) / 2.0);
        let second = 100.0 - 100.0 / (1.0 + g2 / l2);
        assert!((series.simple_at(3).unwrap() - second).abs() < 1e-12);
    }

    #[test]
    fn rsi_zero_period() {
        let candles = candles_from_closes(&[100.0, 101.0]);
        let series = calculate_rsi(&candles, 0);
        assert_eq!(series.len(), 2);
        assert!(series.values.iter().all(|p| !p.valid));
    }
}
