//! Built-in strategies and their construction from the `[strategy]` section.
//!
//! - `rsi_reversion`: buy oversold RSI, exit on recovery
//! - `ema_crossover`: trade fast/slow EMA crosses
//! - `bollinger_reversion`: fade closes outside the bands back to the middle

pub mod bollinger_reversion;
pub mod ema_crossover;
pub mod rsi_reversion;

use crate::domain::error::BacktestError;
use crate::domain::indicator::IndicatorType;
use crate::domain::signal::{MarketData, SignalFunction};
use crate::ports::config_port::ConfigPort;

pub use bollinger_reversion::BollingerReversion;
pub use ema_crossover::EmaCrossover;
pub use rsi_reversion::RsiReversion;

pub const KINDS: &[&str] = &["rsi_reversion", "ema_crossover", "bollinger_reversion"];

const SECTION: &str = "strategy";

/// Build the strategy named by `[strategy] kind`, with its parameters.
pub fn build_strategy(config: &dyn ConfigPort) -> Result<Box<dyn SignalFunction>, BacktestError> {
    let kind = config.require_string(SECTION, "kind")?;
    let allow_short = config.get_bool(SECTION, "allow_short", false);

    match kind.to_lowercase().as_str() {
        "rsi_reversion" => {
            let defaults = RsiReversion::default();
            let strategy = RsiReversion {
                period: usize_or(config, "rsi_period", defaults.period)?,
                oversold: f64_or(config, "oversold", defaults.oversold)?,
                overbought: f64_or(config, "overbought", defaults.overbought)?,
                exit_level: f64_or(config, "exit_level", defaults.exit_level)?,
                allow_short,
                max_bars_held: config.get_usize(SECTION, "max_bars_held")?.filter(|&n| n > 0),
            };
            strategy.validate()?;
            Ok(Box::new(strategy))
        }
        "ema_crossover" => {
            let defaults = EmaCrossover::default();
            let strategy = EmaCrossover {
                fast: usize_or(config, "fast_period", defaults.fast)?,
                slow: usize_or(config, "slow_period", defaults.slow)?,
                allow_short,
            };
            strategy.validate()?;
            Ok(Box::new(strategy))
        }
        "bollinger_reversion" => {
            let defaults = BollingerReversion::default();
            let strategy = BollingerReversion {
                period: usize_or(config, "bb_period", defaults.period)?,
                stddev_mult: f64_or(config, "bb_stddev", defaults.stddev_mult)?,
                allow_short,
            };
            strategy.validate()?;
            Ok(Box::new(strategy))
        }
        other => Err(BacktestError::invalid(
            "kind",
            format!("unknown strategy {:?} (expected one of {})", other, KINDS.join(", ")),
        )),
    }
}

fn usize_or(config: &dyn ConfigPort, key: &str, default: usize) -> Result<usize, BacktestError> {
    Ok(config.get_usize(SECTION, key)?.unwrap_or(default))
}

fn f64_or(config: &dyn ConfigPort, key: &str, default: f64) -> Result<f64, BacktestError> {
    Ok(config.get_f64(SECTION, key)?.unwrap_or(default))
}

/// `a` moved from at-or-below `b` on the previous bar to above it on this one.
pub(crate) fn crossed_above(
    market: &MarketData,
    a: &IndicatorType,
    b: &IndicatorType,
    index: usize,
) -> bool {
    if index == 0 {
        return false;
    }
    match (
        market.value(a, index - 1),
        market.value(b, index - 1),
        market.value(a, index),
        market.value(b, index),
    ) {
        (Some(a_prev), Some(b_prev), Some(a_curr), Some(b_curr)) => {
            a_prev <= b_prev && a_curr > b_curr
        }
        _ => false,
    }
}

pub(crate) fn crossed_below(
    market: &MarketData,
    a: &IndicatorType,
    b: &IndicatorType,
    index: usize,
) -> bool {
    if index == 0 {
        return false;
    }
    match (
        market.value(a, index - 1),
        market.value(b, index - 1),
        market.value(a, index),
        market.value(b, index),
    ) {
        (Some(a_prev), Some(b_prev), Some(a_curr), Some(b_curr)) => {
            a_prev >= b_prev && a_curr < b_curr
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn build(content: &str) -> Result<Box<dyn SignalFunction>, BacktestError> {
        build_strategy(&FileConfigAdapter::from_string(content).unwrap())
    }

    #[test]
    fn builds_each_kind_with_defaults() {
        for kind in KINDS {
            let strategy = build(&format!("[strategy]\nkind = {kind}\n")).unwrap();
            assert_eq!(strategy.name(), *kind);
            assert!(!strategy.required_indicators().is_empty());
        }
    }

    #[test]
    fn parameters_are_read() {
        let strategy = build(
            "[strategy]\nkind = ema_crossover\nfast_period = 5\nslow_period = 20\nallow_short = true\n",
        )
        .unwrap();
        assert_eq!(
            strategy.required_indicators(),
            vec![IndicatorType::Ema(5), IndicatorType::Ema(20)]
        );
    }

    #[test]
    fn unknown_kind_rejected() {
        let err = build("[strategy]\nkind = moon_phase\n").err().unwrap();
        assert!(matches!(err, BacktestError::InvalidConfig { key, .. } if key == "kind"));
    }

    #[test]
    fn missing_kind_rejected() {
        let err = build("[strategy]\nrsi_period = 14\n").err().unwrap();
        assert!(matches!(err, BacktestError::ConfigMissing { key, .. } if key == "kind"));
    }

    #[test]
    fn invalid_parameters_rejected() {
        assert!(build("[strategy]\nkind = ema_crossover\nfast_period = 30\nslow_period = 10\n").is_err());
        assert!(build("[strategy]\nkind = rsi_reversion\noversold = 80\noverbought = 20\n").is_err());
        assert!(build("[strategy]\nkind = bollinger_reversion\nbb_stddev = 0\n").is_err());
        assert!(build("[strategy]\nkind = rsi_reversion\nrsi_period = fourteen\n").is_err());
    }
}
