//! Domain error types.

/// Rejection raised by the pure sizing and stop/take functions in
/// [`crate::domain::risk`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RiskError {
    #[error("{what} must be finite, got {value}")]
    NonFinite { what: &'static str, value: f64 },

    #[error("{what} must be positive, got {value}")]
    NonPositive { what: &'static str, value: f64 },

    #[error("stop-loss {stop} is not on the losing side of take-profit {take}")]
    InvertedLevels { stop: f64, take: f64 },
}

/// Top-level error type for candle-backtest.
#[derive(Debug, thiserror::Error)]
pub enum BacktestError {
    #[error("insufficient data: have {bars} bars, need {minimum}")]
    InsufficientData { bars: usize, minimum: usize },

    #[error("invalid config value {key}: {reason}")]
    InvalidConfig { key: String, reason: String },

    #[error("malformed candle at index {index}: {reason}")]
    MalformedCandle { index: usize, reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BacktestError {
    pub(crate) fn invalid(key: &str, reason: impl Into<String>) -> Self {
        BacktestError::InvalidConfig {
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed(index: usize, reason: impl Into<String>) -> Self {
        BacktestError::MalformedCandle {
            index,
            reason: reason.into(),
        }
    }
}

impl From<&BacktestError> for std::process::ExitCode {
    fn from(err: &BacktestError) -> Self {
        let code: u8 = match err {
            BacktestError::Io(_) => 1,
            BacktestError::ConfigParse { .. }
            | BacktestError::ConfigMissing { .. }
            | BacktestError::InvalidConfig { .. } => 2,
            BacktestError::Data { .. } | BacktestError::MalformedCandle { .. } => 3,
            BacktestError::InsufficientData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_data_message() {
        let err = BacktestError::InsufficientData {
            bars: 3,
            minimum: 15,
        };
        assert_eq!(err.to_string(), "insufficient data: have 3 bars, need 15");
    }

    #[test]
    fn invalid_config_helper() {
        let err = BacktestError::invalid("risk_per_trade_pct", "must be positive");
        assert_eq!(
            err.to_string(),
            "invalid config value risk_per_trade_pct: must be positive"
        );
    }

    #[test]
    fn malformed_candle_helper() {
        let err = BacktestError::malformed(7, "high below low");
        assert_eq!(err.to_string(), "malformed candle at index 7: high below low");
    }

    #[test]
    fn risk_error_messages() {
        let err = RiskError::NonPositive {
            what: "entry price",
            value: -1.0,
        };
        assert_eq!(err.to_string(), "entry price must be positive, got -1");
    }
}
