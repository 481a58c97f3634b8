//! RSI mean reversion.
//!
//! Long when RSI drops below `oversold`, closed once RSI recovers to
//! `exit_level`. With `allow_short`, the mirror image above `overbought`.

use crate::domain::error::BacktestError;
use crate::domain::indicator::IndicatorType;
use crate::domain::position::{Direction, PositionState};
use crate::domain::signal::{MarketData, Signal, SignalFunction};

#[derive(Debug, Clone, PartialEq)]
pub struct RsiReversion {
    pub period: usize,
    pub oversold: f64,
    pub overbought: f64,
    pub exit_level: f64,
    pub allow_short: bool,
    /// Close after this many bars regardless of RSI.
    pub max_bars_held: Option<usize>,
}

impl Default for RsiReversion {
    fn default() -> Self {
        RsiReversion {
            period: 14,
            oversold: 30.0,
            overbought: 70.0,
            exit_level: 50.0,
            allow_short: false,
            max_bars_held: None,
        }
    }
}

impl RsiReversion {
    pub fn validate(&self) -> Result<(), BacktestError> {
        if self.period == 0 {
            return Err(BacktestError::invalid("rsi_period", "rsi_period must be at least 1"));
        }
        for (key, value) in [
            ("oversold", self.oversold),
            ("overbought", self.overbought),
            ("exit_level", self.exit_level),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(BacktestError::invalid(key, format!("{key} must be in [0, 100]")));
            }
        }
        if self.oversold >= self.overbought {
            return Err(BacktestError::invalid(
                "oversold",
                "oversold must be below overbought",
            ));
        }
        Ok(())
    }

    fn rsi(&self) -> IndicatorType {
        IndicatorType::Rsi(self.period)
    }
}

impl SignalFunction for RsiReversion {
    fn name(&self) -> &str {
        "rsi_reversion"
    }

    fn required_indicators(&self) -> Vec<IndicatorType> {
        vec![self.rsi()]
    }

    fn evaluate(&self, bar_index: usize, market: &MarketData, position: PositionState) -> Signal {
        let Some(rsi) = market.value(&self.rsi(), bar_index) else {
            return Signal::Hold;
        };

        match position {
            PositionState::Flat => {
                if rsi < self.oversold {
                    Signal::EnterLong
                } else if self.allow_short && rsi > self.overbought {
                    Signal::EnterShort
                } else {
                    Signal::Hold
                }
            }
            PositionState::Open {
                direction,
                bars_held,
                ..
            } => {
                if self.max_bars_held.is_some_and(|max| bars_held >= max) {
                    return Signal::Exit;
                }
                let recovered = match direction {
                    Direction::Long => rsi >= self.exit_level,
                    Direction::Short => rsi <= self.exit_level,
                };
                if recovered {
                    Signal::Exit
                } else {
                    Signal::Hold
                }
            }
        }
    }
}
