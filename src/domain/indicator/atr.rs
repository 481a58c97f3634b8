//! Average True Range with Wilder smoothing.
//!
//! The first bar's true range is high - low (no previous close). The seed is
//! the mean of the first n true ranges; afterwards
//! ATR[i] = (ATR[i-1] * (n-1) + TR[i]) / n. Warmup: first (n-1) bars invalid.

use crate::domain::candle::Candle;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

pub fn calculate_atr(candles: &[Candle], period: usize) -> IndicatorSeries {
    if period == 0 {
        return IndicatorSeries::not_ready(IndicatorType::Atr(period), candles);
    }

    let mut values = Vec::with_capacity(candles.len());
    let mut tr_sum = 0.0;
    let mut atr = 0.0;

    for (i, candle) in candles.iter().enumerate() {
        let tr = if i == 0 {
            candle.high - candle.low
        } else {
            candle.true_range(candles[i - 1].close)
        };

        let valid = if i + 1 < period {
            tr_sum += tr;
            false
        } else if i + 1 == period {
            atr = (tr_sum + tr) / period as f64;
            true
        } else {
            atr = (atr * (period - 1) as f64 + tr) / period as f64;
            true
        };

        values.push(IndicatorPoint {
            timestamp: candle.timestamp,
            valid,
            value: IndicatorValue::Simple(if valid { atr } else { 0.0 }),
        });
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Atr(period),
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn make_candle(day: u32, high: f64, low: f64, close: f64) -> Candle {
        Candle {
            timestamp: NaiveDate::from_ymd_opt(2024, 1, day)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            open: close,
            high,
            low,
            close,
            volume: 1000.0,
        }
    }

    #[test]
    fn atr_warmup() {
        let candles: Vec<Candle> = (1..=5).map(|d| make_candle(d, 110.0, 90.0, 100.0)).collect();
        let series = calculate_atr(&candles, 3);
        assert_eq!(series.len(), 5);
        assert!(!series.values[0].valid);
        assert!(!series.values[1].valid);
        assert!(series.values[2].valid);
        assert!(series.values[4].valid);
    }

    #[test]
    fn atr_seed_is_average() {
        let candles = vec![
            make_candle(1, 110.0, 100.0, 105.0),
            make_candle(2, 115.0, 105.0, 110.0),
            make_candle(3, 120.0, 110.0, 115.0),
        ];
        let series = calculate_atr(&candles, 3);
        assert!((series.simple_at(2).unwrap() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn atr_wilder_smoothing() {
        let candles = vec![
            make_candle(1, 110.0, 100.0, 105.0),
            make_candle(2, 115.0, 105.0, 110.0),
            make_candle(3, 120.0, 110.0, 115.0),
            make_candle(4, 125.0, 115.0, 120.0),
        ];
        let series = calculate_atr(&candles, 3);
        let expected = (10.0 * 2.0 + 10.0) / 3.0;
        assert!((series.simple_at(3).unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn atr_uses_gap_true_range() {
        let candles = vec![
            make_candle(1, 110.0, 100.0, 105.0),
            make_candle(2, 130.0, 120.0, 125.0),
        ];
        let series = calculate_atr(&candles, 2);
        // TR0 = 10, TR1 = |130 - 105| = 25
        assert!((series.simple_at(1).unwrap() - 17.5).abs() < 1e-9);
    }

    #[test]
    fn atr_insufficient_bars_stays_aligned() {
        let candles: Vec<Candle> = (1..=2).map(|d| make_candle(d, 110.0, 90.0, 100.0)).collect();
        let series = calculate_atr(&candles, 5);
        assert_eq!(series.len(), 2);
        assert!(series.values.iter().all(|p| !p.valid));
    }
}
