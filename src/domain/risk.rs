//! Risk configuration, position sizing and stop/take placement.
//!
//! Everything here is a pure function of its inputs. Percent fields use
//! percent units (2.0 == 2%), matching the INI configuration.

use crate::domain::error::{BacktestError, RiskError};
use crate::domain::execution::{FillTiming, IntrabarPolicy};
use crate::domain::indicator::IndicatorType;
use crate::domain::position::Direction;

/// How far from entry a stop-loss or take-profit sits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LevelRule {
    Disabled,
    Percent(f64),
    AtrMultiple(f64),
}

impl LevelRule {
    fn uses_atr(&self) -> bool {
        matches!(self, LevelRule::AtrMultiple(_))
    }

    fn distance(&self, entry_price: f64, atr_value: Option<f64>) -> Result<Option<f64>, RiskError> {
        match *self {
            LevelRule::Disabled => Ok(None),
            LevelRule::Percent(pct) => Ok(Some(entry_price * pct / 100.0)),
            LevelRule::AtrMultiple(mult) => {
                let atr = require_positive("ATR", atr_value.unwrap_or(f64::NAN))?;
                Ok(Some(mult * atr))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionSizingMode {
    /// risk_per_trade_pct of the current balance, as notional.
    FixedFraction,
    /// A constant notional, capped at the current balance.
    FixedNotional,
    /// risk_per_trade_pct of balance divided by fractional volatility.
    VolatilityScaled,
}

impl PositionSizingMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "fixed_fraction" => Some(PositionSizingMode::FixedFraction),
            "fixed_notional" => Some(PositionSizingMode::FixedNotional),
            "volatility_scaled" => Some(PositionSizingMode::VolatilityScaled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RiskConfig {
    pub starting_balance: f64,
    pub stop_loss: LevelRule,
    pub take_profit: LevelRule,
    pub atr_period: usize,
    pub position_sizing: PositionSizingMode,
    pub risk_per_trade_pct: f64,
    pub fixed_notional: f64,
    /// 0 disables the daily breaker.
    pub max_daily_drawdown_pct: f64,
    pub fee_round_trip_pct: f64,
    pub slippage_pct: f64,
    pub fill_timing: FillTiming,
    pub intrabar_policy: IntrabarPolicy,
    /// Upper bound on candles a single run will accept.
    pub max_bars: Option<usize>,
}

impl Default for RiskConfig {
    fn default() -> Self {
        RiskConfig {
            starting_balance: 10_000.0,
            stop_loss: LevelRule::Disabled,
            take_profit: LevelRule::Disabled,
            atr_period: 14,
            position_sizing: PositionSizingMode::FixedFraction,
            risk_per_trade_pct: 100.0,
            fixed_notional: 1_000.0,
            max_daily_drawdown_pct: 0.0,
            fee_round_trip_pct: 0.0,
            slippage_pct: 0.0,
            fill_timing: FillTiming::SignalClose,
            intrabar_policy: IntrabarPolicy::StopLossFirst,
            max_bars: None,
        }
    }
}

impl RiskConfig {
    pub fn uses_atr(&self) -> bool {
        self.stop_loss.uses_atr()
            || self.take_profit.uses_atr()
            || self.position_sizing == PositionSizingMode::VolatilityScaled
    }

    /// Indicators the risk rules read at entry time.
    pub fn required_indicators(&self) -> Vec<IndicatorType> {
        if self.uses_atr() {
            vec![IndicatorType::Atr(self.atr_period)]
        } else {
            Vec::new()
        }
    }

    pub fn validate(&self) -> Result<(), BacktestError> {
        if !self.starting_balance.is_finite() || self.starting_balance <= 0.0 {
            return Err(BacktestError::invalid(
                "starting_balance",
                "starting_balance must be positive",
            ));
        }

        validate_level("stop_loss", self.stop_loss, true)?;
        validate_level("take_profit", self.take_profit, false)?;

        if self.uses_atr() && self.atr_period == 0 {
            return Err(BacktestError::invalid("atr_period", "atr_period must be at least 1"));
        }

        match self.position_sizing {
            PositionSizingMode::FixedFraction | PositionSizingMode::VolatilityScaled => {
                if !self.risk_per_trade_pct.is_finite()
                    || self.risk_per_trade_pct <= 0.0
                    || self.risk_per_trade_pct > 100.0
                {
                    return Err(BacktestError::invalid(
                        "risk_per_trade_pct",
                        "risk_per_trade_pct must be in (0, 100]",
                    ));
                }
            }
            PositionSizingMode::FixedNotional => {
                if !self.fixed_notional.is_finite() || self.fixed_notional <= 0.0 {
                    return Err(BacktestError::invalid(
                        "fixed_notional",
                        "fixed_notional must be positive",
                    ));
                }
            }
        }

        check_pct_range("max_daily_drawdown_pct", self.max_daily_drawdown_pct, 0.0, 100.0)?;
        check_pct_range("fee_round_trip_pct", self.fee_round_trip_pct, 0.0, 100.0)?;
        check_pct_range("slippage_pct", self.slippage_pct, 0.0, 100.0)?;

        if self.max_bars == Some(0) {
            return Err(BacktestError::invalid("max_bars", "max_bars must be at least 1"));
        }
        Ok(())
    }
}

fn validate_level(key: &str, rule: LevelRule, is_stop: bool) -> Result<(), BacktestError> {
    match rule {
        LevelRule::Disabled => Ok(()),
        LevelRule::Percent(pct) => {
            if !pct.is_finite() || pct <= 0.0 {
                return Err(BacktestError::invalid(key, format!("{key} percent must be positive")));
            }
            // a long stop or a short target at 100% would sit at or below zero
            if pct >= 100.0 {
                let side = if is_stop { "long stop" } else { "short target" };
                return Err(BacktestError::invalid(
                    key,
                    format!("{key} percent must be below 100 ({side} would be non-positive)"),
                ));
            }
            Ok(())
        }
        LevelRule::AtrMultiple(mult) => {
            if !mult.is_finite() || mult <= 0.0 {
                return Err(BacktestError::invalid(
                    key,
                    format!("{key} ATR multiple must be positive"),
                ));
            }
            Ok(())
        }
    }
}

fn check_pct_range(key: &str, value: f64, min: f64, max: f64) -> Result<(), BacktestError> {
    if !value.is_finite() || value < min || value >= max {
        return Err(BacktestError::invalid(
            key,
            format!("{key} must be in [{min}, {max})"),
        ));
    }
    Ok(())
}

fn require_positive(what: &'static str, value: f64) -> Result<f64, RiskError> {
    if !value.is_finite() {
        return Err(RiskError::NonFinite { what, value });
    }
    if value <= 0.0 {
        return Err(RiskError::NonPositive { what, value });
    }
    Ok(value)
}

/// Quote notional to commit on the next entry.
///
/// `volatility_estimate` is ATR as a fraction of price; only
/// `VolatilityScaled` reads it. The result never exceeds `balance`.
pub fn size_for(
    balance: f64,
    config: &RiskConfig,
    volatility_estimate: Option<f64>,
) -> Result<f64, RiskError> {
    let balance = require_positive("balance", balance)?;

    let notional = match config.position_sizing {
        PositionSizingMode::FixedFraction => balance * config.risk_per_trade_pct / 100.0,
        PositionSizingMode::FixedNotional => config.fixed_notional.min(balance),
        PositionSizingMode::VolatilityScaled => {
            let vol = require_positive(
                "volatility estimate",
                volatility_estimate.unwrap_or(f64::NAN),
            )?;
            let risk_amount = balance * config.risk_per_trade_pct / 100.0;
            (risk_amount / vol).min(balance)
        }
    };

    require_positive("position size", notional)
}

/// Stop-loss and take-profit prices for an entry at `entry_price`.
///
/// Disabled rules yield `None`. ATR rules need a positive `atr_value`.
pub fn stop_take_for(
    entry_price: f64,
    direction: Direction,
    config: &RiskConfig,
    atr_value: Option<f64>,
) -> Result<(Option<f64>, Option<f64>), RiskError> {
    let entry_price = require_positive("entry price", entry_price)?;

    let stop_distance = config.stop_loss.distance(entry_price, atr_value)?;
    let take_distance = config.take_profit.distance(entry_price, atr_value)?;

    let sign = direction.sign();
    let stop = stop_distance.map(|d| entry_price - sign * d);
    let take = take_distance.map(|d| entry_price + sign * d);

    if let Some(s) = stop {
        require_positive("stop-loss price", s)?;
    }
    if let Some(t) = take {
        require_positive("take-profit price", t)?;
    }

    if let (Some(s), Some(t)) = (stop, take) {
        let ordered = match direction {
            Direction::Long => s < t,
            Direction::Short => s > t,
        };
        if !ordered {
            return Err(RiskError::InvertedLevels { stop: s, take: t });
        }
    }

    Ok((stop, take))
}

/// Round-trip fee on a notional.
pub fn fee_for(notional: f64, config: &RiskConfig) -> f64 {
    notional * config.fee_round_trip_pct / 100.0
}
