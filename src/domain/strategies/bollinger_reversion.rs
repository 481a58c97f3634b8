//! Bollinger band mean reversion: buy closes under the lower band, exit at
//! the middle band.

use crate::domain::error::BacktestError;
use crate::domain::indicator::IndicatorType;
use crate::domain::position::{Direction, PositionState};
use crate::domain::signal::{MarketData, Signal, SignalFunction};

#[derive(Debug, Clone, PartialEq)]
pub struct BollingerReversion {
    pub period: usize,
    pub stddev_mult: f64,
    pub allow_short: bool,
}

impl Default for BollingerReversion {
    fn default() -> Self {
        BollingerReversion {
            period: 20,
            stddev_mult: 2.0,
            allow_short: false,
        }
    }
}

impl BollingerReversion {
    pub fn validate(&self) -> Result<(), BacktestError> {
        if self.period == 0 {
            return Err(BacktestError::invalid("bb_period", "bb_period must be at least 1"));
        }
        if !self.stddev_mult.is_finite() || self.stddev_mult <= 0.0 {
            return Err(BacktestError::invalid("bb_stddev", "bb_stddev must be positive"));
        }
        // The series key keeps hundredths, so anything under 0.005 becomes 0.
        if self.stddev_mult_x100() == 0 {
            return Err(BacktestError::invalid(
                "bb_stddev",
                format!("bb_stddev {} is below the 0.01 resolution", self.stddev_mult),
            ));
        }
        Ok(())
    }

    fn stddev_mult_x100(&self) -> u32 {
        (self.stddev_mult * 100.0).round() as u32
    }

    fn bands(&self) -> IndicatorType {
        IndicatorType::Bollinger {
            period: self.period,
            stddev_mult_x100: self.stddev_mult_x100(),
        }
    }
}

impl SignalFunction for BollingerReversion {
    fn name(&self) -> &str {
        "bollinger_reversion"
    }

    fn required_indicators(&self) -> Vec<IndicatorType> {
        vec![self.bands()]
    }

    fn evaluate(&self, bar_index: usize, market: &MarketData, position: PositionState) -> Signal {
        let (Some((upper, middle, lower)), Some(candle)) =
            (market.bands(&self.bands(), bar_index), market.candle(bar_index))
        else {
            return Signal::Hold;
        };
        let close = candle.close;

        match position.direction() {
            None if close < lower => Signal::EnterLong,
            None if self.allow_short && close > upper => Signal::EnterShort,
            Some(Direction::Long) if close >= middle => Signal::Exit,
            Some(Direction::Short) if close <= middle => Signal::Exit,
            _ => Signal::Hold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_support::candles_from_closes;

    fn strategy(allow_short: bool) -> BollingerReversion {
        BollingerReversion {
            period: 3,
            stddev_mult: 1.0,
            allow_short,
        }
    }

    fn market() -> MarketData {
        let closes = [10.0, 10.0, 10.0, 10.0, 7.0, 9.0, 13.0, 9.0];
        MarketData::new(candles_from_closes(&closes), &strategy(false).required_indicators())
    }

    fn open(direction: Direction) -> PositionState {
        PositionState::Open {
            direction,
            entry_price: 7.0,
            bars_held: 1,
        }
    }

    #[test]
    fn multiplier_maps_to_indicator_key() {
        assert_eq!(
            BollingerReversion::default().required_indicators(),
            vec![IndicatorType::Bollinger {
                period: 20,
                stddev_mult_x100: 200
            }]
        );
    }

    #[test]
    fn holds_inside_bands_and_during_warmup() {
        let m = market();
        assert_eq!(strategy(false).evaluate(1, &m, PositionState::Flat), Signal::Hold);
        assert_eq!(strategy(false).evaluate(3, &m, PositionState::Flat), Signal::Hold);
    }

    #[test]
    fn enters_below_lower_band_and_exits_at_middle() {
        let m = market();
        assert_eq!(strategy(false).evaluate(4, &m, PositionState::Flat), Signal::EnterLong);
        assert_eq!(strategy(false).evaluate(4, &m, open(Direction::Long)), Signal::Hold);
        assert_eq!(strategy(false).evaluate(5, &m, open(Direction::Long)), Signal::Exit);
    }

    #[test]
    fn shorts_above_upper_band_when_allowed() {
        let m = market();
        assert_eq!(strategy(false).evaluate(6, &m, PositionState::Flat), Signal::Hold);
        assert_eq!(strategy(true).evaluate(6, &m, PositionState::Flat), Signal::EnterShort);
        assert_eq!(strategy(true).evaluate(7, &m, open(Direction::Short)), Signal::Exit);
    }

    #[test]
    fn validation() {
        assert!(BollingerReversion::default().validate().is_ok());
        assert!(BollingerReversion {
            stddev_mult: -1.0,
            ..Default::default()
        }
        .validate()
        .is_err());
    }

    #[test]
    fn multiplier_below_key_resolution_is_rejected() {
        let tiny = BollingerReversion {
            stddev_mult: 0.004,
            ..Default::default()
        };
        assert!(matches!(
            tiny.validate(),
            Err(BacktestError::InvalidConfig { key, .. }) if key == "bb_stddev"
        ));

        let smallest = BollingerReversion {
            stddev_mult: 0.005,
            ..Default::default()
        };
        assert!(smallest.validate().is_ok());
        assert_eq!(
            smallest.required_indicators(),
            vec![IndicatorType::Bollinger {
                period: 20,
                stddev_mult_x100: 1
            }]
        );
    }
}
