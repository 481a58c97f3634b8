#![allow(dead_code)]

use candle_backtest::domain::candle::Candle;
use candle_backtest::domain::position::PositionState;
use candle_backtest::domain::risk::RiskConfig;
use candle_backtest::domain::signal::{FnSignal, MarketData, Signal, SignalFunction};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::io::Write;

pub fn ts(day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, day)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

pub fn make_candle(timestamp: NaiveDateTime, open: f64, high: f64, low: f64, close: f64) -> Candle {
    Candle {
        timestamp,
        open,
        high,
        low,
        close,
        volume: 1000.0,
    }
}

/// Open, high, low and close all equal to `price`.
pub fn flat_candle(timestamp: NaiveDateTime, price: f64) -> Candle {
    make_candle(timestamp, price, price, price, price)
}

/// Hourly candles from 2024-03-01 00:00, one per close. Open is the previous
/// close; high/low pad the body by 0.5.
pub fn hourly_candles(closes: &[f64]) -> Vec<Candle> {
    let start = ts(1, 0);
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            make_candle(
                start + Duration::hours(i as i64),
                open,
                open.max(close) + 0.5,
                (open.min(close) - 0.5).max(0.0),
                close,
            )
        })
        .collect()
}

/// A deterministic oscillating series, enough for indicator-driven strategies
/// to trade both ways.
pub fn wave_closes(count: usize) -> Vec<f64> {
    (0..count)
        .map(|i| {
            let t = i as f64;
            100.0 + 8.0 * (t / 7.0).sin() + 3.0 * (t / 2.3).cos() + 0.02 * t
        })
        .collect()
}

/// Emits the given signals at the given bars and holds everywhere else.
pub fn scripted(script: Vec<(usize, Signal)>) -> impl SignalFunction {
    FnSignal::new(
        "scripted",
        Vec::new(),
        move |i: usize, _: &MarketData, _: PositionState| {
            script
                .iter()
                .find(|(bar, _)| *bar == i)
                .map_or(Signal::Hold, |(_, s)| *s)
        },
    )
}

/// Goes long whenever flat.
pub fn always_long() -> impl SignalFunction {
    FnSignal::new(
        "always_long",
        Vec::new(),
        |_: usize, _: &MarketData, state: PositionState| {
            if state.is_flat() {
                Signal::EnterLong
            } else {
                Signal::Hold
            }
        },
    )
}

pub fn never_trades() -> impl SignalFunction {
    FnSignal::new(
        "never",
        Vec::new(),
        |_: usize, _: &MarketData, _: PositionState| Signal::Hold,
    )
}

pub fn base_config() -> RiskConfig {
    RiskConfig {
        starting_balance: 10_000.0,
        ..RiskConfig::default()
    }
}

pub fn write_temp_file(content: &str, suffix: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

/// Render candles in the CSV layout the data adapter reads.
pub fn candles_csv(candles: &[Candle]) -> String {
    let mut out = String::from("timestamp,open,high,low,close,volume\n");
    for c in candles {
        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            c.timestamp.format("%Y-%m-%d %H:%M:%S"),
            c.open,
            c.high,
            c.low,
            c.close,
            c.volume
        ));
    }
    out
}
