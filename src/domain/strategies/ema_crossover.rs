//! Fast/slow EMA crossover.

use crate::domain::error::BacktestError;
use crate::domain::indicator::IndicatorType;
use crate::domain::position::{Direction, PositionState};
use crate::domain::signal::{MarketData, Signal, SignalFunction};

use super::{crossed_above, crossed_below};

#[derive(Debug, Clone, PartialEq)]
pub struct EmaCrossover {
    pub fast: usize,
    pub slow: usize,
    pub allow_short: bool,
}

impl Default for EmaCrossover {
    fn default() -> Self {
        EmaCrossover {
            fast: 12,
            slow: 26,
            allow_short: false,
        }
    }
}

impl EmaCrossover {
    pub fn validate(&self) -> Result<(), BacktestError> {
        if self.fast == 0 {
            return Err(BacktestError::invalid("fast_period", "fast_period must be at least 1"));
        }
        if self.fast >= self.slow {
            return Err(BacktestError::invalid(
                "fast_period",
                "fast_period must be shorter than slow_period",
            ));
        }
        Ok(())
    }
}

impl SignalFunction for EmaCrossover {
    fn name(&self) -> &str {
        "ema_crossover"
    }

    fn required_indicators(&self) -> Vec<IndicatorType> {
        vec![IndicatorType::Ema(self.fast), IndicatorType::Ema(self.slow)]
    }

    fn evaluate(&self, bar_index: usize, market: &MarketData, position: PositionState) -> Signal {
        let fast = IndicatorType::Ema(self.fast);
        let slow = IndicatorType::Ema(self.slow);
        let up = crossed_above(market, &fast, &slow, bar_index);
        let down = crossed_below(market, &fast, &slow, bar_index);

        match position.direction() {
            None if up => Signal::EnterLong,
            None if down && self.allow_short => Signal::EnterShort,
            Some(Direction::Long) if down => Signal::Exit,
            Some(Direction::Short) if up => Signal::Exit,
            _ => Signal::Hold,
        }
    }
}
