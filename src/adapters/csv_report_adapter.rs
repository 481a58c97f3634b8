//! CSV report adapter: writes the trade ledger, and optionally the per-bar
//! equity curve, as header-row CSV.

use crate::domain::backtest::BacktestResult;
use crate::domain::equity::EquityPoint;
use crate::domain::error::BacktestError;
use crate::domain::position::Trade;
use crate::ports::report_port::ReportPort;
use serde::Serialize;
use std::path::{Path, PathBuf};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Serialize)]
struct TradeRow {
    entry_timestamp: String,
    exit_timestamp: String,
    direction: &'static str,
    entry_price: f64,
    exit_price: f64,
    size: f64,
    pnl: f64,
    fees: f64,
    exit_reason: &'static str,
    bars_held: usize,
}

impl From<&Trade> for TradeRow {
    fn from(t: &Trade) -> Self {
        TradeRow {
            entry_timestamp: t.entry_timestamp.format(TIMESTAMP_FORMAT).to_string(),
            exit_timestamp: t.exit_timestamp.format(TIMESTAMP_FORMAT).to_string(),
            direction: t.direction.as_str(),
            entry_price: t.entry_price,
            exit_price: t.exit_price,
            size: t.size,
            pnl: t.pnl,
            fees: t.fees,
            exit_reason: t.exit_reason.as_str(),
            bars_held: t.bars_held,
        }
    }
}

#[derive(Debug, Serialize)]
struct EquityRow {
    timestamp: String,
    balance: f64,
    equity: f64,
    peak_balance: f64,
    drawdown_pct: f64,
}

impl From<&EquityPoint> for EquityRow {
    fn from(p: &EquityPoint) -> Self {
        EquityRow {
            timestamp: p.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            balance: p.balance,
            equity: p.equity,
            peak_balance: p.peak_balance,
            drawdown_pct: p.drawdown_pct,
        }
    }
}

#[derive(Debug, Default)]
pub struct CsvReportAdapter {
    equity_path: Option<PathBuf>,
}

impl CsvReportAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also write the equity curve to `path`.
    pub fn with_equity_curve(path: PathBuf) -> Self {
        Self {
            equity_path: Some(path),
        }
    }
}

/// Serializable row with a fixed header, written even when there are no rows.
trait CsvRow: Serialize {
    const HEADER: &'static [&'static str];
}

impl CsvRow for TradeRow {
    const HEADER: &'static [&'static str] = &[
        "entry_timestamp",
        "exit_timestamp",
        "direction",
        "entry_price",
        "exit_price",
        "size",
        "pnl",
        "fees",
        "exit_reason",
        "bars_held",
    ];
}

impl CsvRow for EquityRow {
    const HEADER: &'static [&'static str] =
        &["timestamp", "balance", "equity", "peak_balance", "drawdown_pct"];
}

fn write_rows<T, R>(path: &Path, items: &[T]) -> Result<(), BacktestError>
where
    R: CsvRow + for<'a> From<&'a T>,
{
    let csv_err = |e: csv::Error| BacktestError::Io(e.into());

    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(csv_err)?;
    wtr.write_record(R::HEADER).map_err(csv_err)?;
    for item in items {
        wtr.serialize(R::from(item)).map_err(csv_err)?;
    }
    wtr.flush()?;
    Ok(())
}

impl ReportPort for CsvReportAdapter {
    fn write(&self, result: &BacktestResult, output_path: &Path) -> Result<(), BacktestError> {
        write_rows::<Trade, TradeRow>(output_path, &result.trades)?;
        if let Some(path) = &self.equity_path {
            write_rows::<EquityPoint, EquityRow>(path, &result.equity_curve)?;
        }
        Ok(())
    }
}
