//! Input validation run before any simulation.
//!
//! Candle sequences and INI configuration are checked up front so the
//! engine loop itself never has to fail.

use crate::domain::candle::Candle;
use crate::domain::error::BacktestError;
use crate::domain::execution::{FillTiming, IntrabarPolicy};
use crate::domain::indicator::IndicatorType;
use crate::domain::risk::PositionSizingMode;
use crate::domain::strategies;
use crate::ports::config_port::ConfigPort;

/// Reject empty, unordered or physically impossible candles.
pub fn validate_candles(candles: &[Candle]) -> Result<(), BacktestError> {
    if candles.is_empty() {
        return Err(BacktestError::InsufficientData {
            bars: 0,
            minimum: 1,
        });
    }

    for (i, c) in candles.iter().enumerate() {
        for (name, value) in [
            ("open", c.open),
            ("high", c.high),
            ("low", c.low),
            ("close", c.close),
            ("volume", c.volume),
        ] {
            if !value.is_finite() {
                return Err(BacktestError::malformed(i, format!("{name} is not finite")));
            }
            if value < 0.0 {
                return Err(BacktestError::malformed(i, format!("{name} is negative ({value})")));
            }
        }
        if c.high < c.low {
            return Err(BacktestError::malformed(
                i,
                format!("high {} below low {}", c.high, c.low),
            ));
        }
        if c.high < c.open.max(c.close) {
            return Err(BacktestError::malformed(
                i,
                format!("high {} below open/close", c.high),
            ));
        }
        if c.low > c.open.min(c.close) {
            return Err(BacktestError::malformed(
                i,
                format!("low {} above open/close", c.low),
            ));
        }
        if i > 0 && c.timestamp <= candles[i - 1].timestamp {
            return Err(BacktestError::malformed(
                i,
                format!(
                    "timestamp {} not after previous {}",
                    c.timestamp,
                    candles[i - 1].timestamp
                ),
            ));
        }
    }
    Ok(())
}

/// Longest warm-up window among `indicators`; at least one bar.
pub fn warmup_required(indicators: &[IndicatorType]) -> usize {
    indicators
        .iter()
        .map(IndicatorType::warmup_bars)
        .max()
        .unwrap_or(1)
        .max(1)
}

pub fn check_warmup(bars: usize, indicators: &[IndicatorType]) -> Result<(), BacktestError> {
    let minimum = warmup_required(indicators);
    if bars < minimum {
        return Err(BacktestError::InsufficientData { bars, minimum });
    }
    Ok(())
}

/// Validate every section the `backtest` command reads.
pub fn validate_config(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    validate_backtest_section(config)?;
    validate_risk_section(config)?;
    strategies::build_strategy(config)?;
    Ok(())
}

pub fn validate_backtest_section(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    let section = "backtest";

    match config.get_f64(section, "starting_balance")? {
        None => {
            return Err(BacktestError::ConfigMissing {
                section: section.to_string(),
                key: "starting_balance".to_string(),
            })
        }
        Some(v) if !v.is_finite() || v <= 0.0 => {
            return Err(BacktestError::invalid(
                "starting_balance",
                "starting_balance must be positive",
            ))
        }
        Some(_) => {}
    }

    check_optional_pct(config, section, "fee_round_trip_pct")?;
    check_optional_pct(config, section, "slippage_pct")?;

    if let Some(s) = config.get_string(section, "fill_timing") {
        if FillTiming::parse(&s).is_none() {
            return Err(BacktestError::invalid(
                "fill_timing",
                format!("unknown fill_timing {:?} (signal_close | next_open)", s),
            ));
        }
    }
    if let Some(s) = config.get_string(section, "intrabar_policy") {
        if IntrabarPolicy::parse(&s).is_none() {
            return Err(BacktestError::invalid(
                "intrabar_policy",
                format!(
                    "unknown intrabar_policy {:?} (stop_loss_first | take_profit_first)",
                    s
                ),
            ));
        }
    }
    if config.get_usize(section, "max_bars")? == Some(0) {
        return Err(BacktestError::invalid("max_bars", "max_bars must be at least 1"));
    }
    Ok(())
}

pub fn validate_risk_section(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    let section = "risk";

    check_level_pair(config, "stop_loss_pct", "stop_loss_atr_mult")?;
    check_level_pair(config, "take_profit_pct", "take_profit_atr_mult")?;

    if config.get_usize(section, "atr_period")? == Some(0) {
        return Err(BacktestError::invalid("atr_period", "atr_period must be at least 1"));
    }

    let sizing = match config.get_string(section, "position_sizing") {
        None => PositionSizingMode::FixedFraction,
        Some(s) => PositionSizingMode::parse(&s).ok_or_else(|| {
            BacktestError::invalid(
                "position_sizing",
                format!(
                    "unknown position_sizing {:?} (fixed_fraction | fixed_notional | volatility_scaled)",
                    s
                ),
            )
        })?,
    };

    if let Some(v) = config.get_f64(section, "risk_per_trade_pct")? {
        if !v.is_finite() || v <= 0.0 || v > 100.0 {
            return Err(BacktestError::invalid(
                "risk_per_trade_pct",
                "risk_per_trade_pct must be in (0, 100]",
            ));
        }
    }

    match config.get_f64(section, "fixed_notional")? {
        Some(v) if !v.is_finite() || v <= 0.0 => {
            return Err(BacktestError::invalid(
                "fixed_notional",
                "fixed_notional must be positive",
            ))
        }
        None if sizing == PositionSizingMode::FixedNotional => {
            return Err(BacktestError::ConfigMissing {
                section: section.to_string(),
                key: "fixed_notional".to_string(),
            })
        }
        _ => {}
    }

    check_optional_pct(config, section, "max_daily_drawdown_pct")?;
    Ok(())
}

/// A level may be given as a percent or an ATR multiple, not both.
fn check_level_pair(
    config: &dyn ConfigPort,
    pct_key: &str,
    atr_key: &str,
) -> Result<(), BacktestError> {
    let pct = config.get_f64("risk", pct_key)?;
    let atr = config.get_f64("risk", atr_key)?;

    if pct.is_some() && atr.is_some() {
        return Err(BacktestError::invalid(
            pct_key,
            format!("{pct_key} and {atr_key} are mutually exclusive"),
        ));
    }
    if let Some(v) = pct {
        if !v.is_finite() || v <= 0.0 || v >= 100.0 {
            return Err(BacktestError::invalid(pct_key, format!("{pct_key} must be in (0, 100)")));
        }
    }
    if let Some(v) = atr {
        if !v.is_finite() || v <= 0.0 {
            return Err(BacktestError::invalid(atr_key, format!("{atr_key} must be positive")));
        }
    }
    Ok(())
}

fn check_optional_pct(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), BacktestError> {
    if let Some(v) = config.get_f64(section, key)? {
        if !v.is_finite() || !(0.0..100.0).contains(&v) {
            return Err(BacktestError::invalid(key, format!("{key} must be in [0, 100)")));
        }
    }
    Ok(())
}
