//! Configuration access port.
//!
//! Keys are addressed as `[section] key`. `get_bool` falls back to a
//! default; the checked getters distinguish "absent" from "present but
//! unparseable" so validation can reject typos instead of silently using
//! defaults.

use crate::domain::error::BacktestError;

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool;

    /// Trimmed value of a key that must be present and non-empty.
    fn require_string(&self, section: &str, key: &str) -> Result<String, BacktestError> {
        match self.get_string(section, key) {
            Some(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
            _ => Err(BacktestError::ConfigMissing {
                section: section.to_string(),
                key: key.to_string(),
            }),
        }
    }

    fn get_f64(&self, section: &str, key: &str) -> Result<Option<f64>, BacktestError> {
        match self.get_string(section, key) {
            None => Ok(None),
            Some(s) if s.trim().is_empty() => Ok(None),
            Some(s) => s.trim().parse::<f64>().map(Some).map_err(|_| {
                BacktestError::invalid(key, format!("expected a number, got {:?}", s.trim()))
            }),
        }
    }

    fn get_usize(&self, section: &str, key: &str) -> Result<Option<usize>, BacktestError> {
        match self.get_string(section, key) {
            None => Ok(None),
            Some(s) if s.trim().is_empty() => Ok(None),
            Some(s) => s.trim().parse::<usize>().map(Some).map_err(|_| {
                BacktestError::invalid(
                    key,
                    format!("expected a non-negative integer, got {:?}", s.trim()),
                )
            }),
        }
    }
}
