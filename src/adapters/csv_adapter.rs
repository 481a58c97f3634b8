//! CSV candle file adapter.
//!
//! Expects a header row. Columns are located by name (case-insensitive):
//! `timestamp` (or `time` / `date`), `open`, `high`, `low`, `close`, `volume`.
//! Extra columns are ignored.

use crate::domain::candle::Candle;
use crate::domain::error::BacktestError;
use crate::ports::data_port::DataPort;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

pub struct CsvAdapter {
    path: PathBuf,
}

impl CsvAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl DataPort for CsvAdapter {
    fn fetch_candles(&self) -> Result<Vec<Candle>, BacktestError> {
        let file = File::open(&self.path).map_err(|e| BacktestError::Data {
            reason: format!("failed to read {}: {}", self.path.display(), e),
        })?;
        parse_candles(file)
    }
}

struct Columns {
    timestamp: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: usize,
}

impl Columns {
    fn locate(headers: &csv::StringRecord) -> Result<Self, BacktestError> {
        let find = |names: &[&str]| -> Result<usize, BacktestError> {
            headers
                .iter()
                .position(|h| names.iter().any(|n| h.trim().eq_ignore_ascii_case(n)))
                .ok_or_else(|| BacktestError::Data {
                    reason: format!("missing {} column", names[0]),
                })
        };
        Ok(Columns {
            timestamp: find(&["timestamp", "time", "date", "datetime"])?,
            open: find(&["open"])?,
            high: find(&["high"])?,
            low: find(&["low"])?,
            close: find(&["close"])?,
            volume: find(&["volume"])?,
        })
    }
}

/// Read candles from any CSV source, keeping row order.
pub fn parse_candles<R: Read>(reader: R) -> Result<Vec<Candle>, BacktestError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = rdr.headers().map_err(|e| BacktestError::Data {
        reason: format!("CSV header error: {}", e),
    })?;
    let cols = Columns::locate(headers)?;

    let mut candles = Vec::new();
    for (row, result) in rdr.records().enumerate() {
        let record = result.map_err(|e| BacktestError::Data {
            reason: format!("CSV parse error: {}", e),
        })?;
        // +2: header line and 1-based line numbers
        let line = row + 2;

        let raw_ts = field(&record, cols.timestamp, "timestamp", line)?;
        let timestamp = parse_timestamp(raw_ts).ok_or_else(|| BacktestError::Data {
            reason: format!("line {line}: unrecognised timestamp {raw_ts:?}"),
        })?;

        candles.push(Candle {
            timestamp,
            open: number(&record, cols.open, "open", line)?,
            high: number(&record, cols.high, "high", line)?,
            low: number(&record, cols.low, "low", line)?,
            close: number(&record, cols.close, "close", line)?,
            volume: number(&record, cols.volume, "volume", line)?,
        });
    }

    Ok(candles)
}

fn field<'r>(
    record: &'r csv::StringRecord,
    idx: usize,
    name: &str,
    line: usize,
) -> Result<&'r str, BacktestError> {
    record.get(idx).ok_or_else(|| BacktestError::Data {
        reason: format!("line {line}: missing {name} value"),
    })
}

fn number(record: &csv::StringRecord, idx: usize, name: &str, line: usize) -> Result<f64, BacktestError> {
    let raw = field(record, idx, name, line)?;
    raw.parse::<f64>().map_err(|e| BacktestError::Data {
        reason: format!("line {line}: invalid {name} value {raw:?}: {e}"),
    })
}

/// Epoch milliseconds from 1970-04-26 onward have at least this many digits.
const MIN_EPOCH_MILLIS_DIGITS: usize = 11;

/// Accepts RFC 3339, `YYYY-MM-DD[ T]HH:MM[:SS]`, `YYYY-MM-DD`, `YYYYMMDD`,
/// or epoch milliseconds (11 digits or more). Offsets are normalised to UTC.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
        if raw.len() == 8 {
            return NaiveDate::parse_from_str(raw, "%Y%m%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0));
        }
        if raw.len() < MIN_EPOCH_MILLIS_DIGITS {
            return None;
        }
        let millis: i64 = raw.parse().ok()?;
        return DateTime::from_timestamp_millis(millis).map(|dt| dt.naive_utc());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}
