//! Fill simulation: entry/exit prices, slippage, fees and intrabar
//! stop-loss/take-profit resolution.

use chrono::NaiveDateTime;

use super::candle::Candle;
use super::error::RiskError;
use super::position::{Direction, ExitReason, Position, Trade};
use super::risk::{fee_for, size_for, stop_take_for, RiskConfig};

/// When an entry signal is filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FillTiming {
    /// At the close of the bar that raised the signal.
    #[default]
    SignalClose,
    /// At the open of the following bar.
    NextOpen,
}

impl FillTiming {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "signal_close" | "close" => Some(FillTiming::SignalClose),
            "next_open" => Some(FillTiming::NextOpen),
            _ => None,
        }
    }
}

/// Which level wins when a bar's range covers both stop-loss and take-profit.
/// The intrabar path is unknown, so the default assumes the worse outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntrabarPolicy {
    #[default]
    StopLossFirst,
    TakeProfitFirst,
}

impl IntrabarPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "stop_loss_first" => Some(IntrabarPolicy::StopLossFirst),
            "take_profit_first" => Some(IntrabarPolicy::TakeProfitFirst),
            _ => None,
        }
    }
}

/// Long entry pays up, short entry sells lower.
pub fn apply_entry_slippage(direction: Direction, market_price: f64, slippage_pct: f64) -> f64 {
    market_price * (1.0 + direction.sign() * slippage_pct / 100.0)
}

/// Long exit sells lower, short exit buys back higher.
pub fn apply_exit_slippage(direction: Direction, market_price: f64, slippage_pct: f64) -> f64 {
    market_price * (1.0 - direction.sign() * slippage_pct / 100.0)
}

/// Resolve a stop-loss or take-profit hit inside `candle`.
///
/// Order of checks:
/// 1. Open already through the stop: stop fills at the open.
/// 2. Open already through the target: target fills at the open.
/// 3. Both levels inside [low, high]: `policy` decides.
/// 4. Otherwise whichever single level was touched, at its price.
pub fn intrabar_exit(
    position: &Position,
    candle: &Candle,
    policy: IntrabarPolicy,
) -> Option<(ExitReason, f64)> {
    let (adverse, favorable) = match position.direction {
        Direction::Long => (candle.low, candle.high),
        Direction::Short => (candle.high, candle.low),
    };

    if position.should_stop_loss(candle.open) {
        return Some((ExitReason::StopLoss, candle.open));
    }
    if position.should_take_profit(candle.open) {
        return Some((ExitReason::TakeProfit, candle.open));
    }

    let stop = position
        .stop_loss_price
        .filter(|_| position.should_stop_loss(adverse));
    let take = position
        .take_profit_price
        .filter(|_| position.should_take_profit(favorable));

    match (stop, take) {
        (Some(s), Some(t)) => Some(match policy {
            IntrabarPolicy::StopLossFirst => (ExitReason::StopLoss, s),
            IntrabarPolicy::TakeProfitFirst => (ExitReason::TakeProfit, t),
        }),
        (Some(s), None) => Some((ExitReason::StopLoss, s)),
        (None, Some(t)) => Some((ExitReason::TakeProfit, t)),
        (None, None) => None,
    }
}

/// Open a position sized from the current balance.
///
/// Steps:
/// 1. Apply slippage to the market price
/// 2. Size the notional from balance (and ATR/price for volatility sizing)
/// 3. Place stop-loss/take-profit relative to the fill price
pub fn open_position(
    direction: Direction,
    market_price: f64,
    timestamp: NaiveDateTime,
    bar_index: usize,
    balance: f64,
    atr_value: Option<f64>,
    config: &RiskConfig,
) -> Result<Position, RiskError> {
    let entry_price = apply_entry_slippage(direction, market_price, config.slippage_pct);
    let volatility = atr_value.map(|atr| atr / entry_price);
    let size = size_for(balance, config, volatility)?;
    let (stop_loss_price, take_profit_price) =
        stop_take_for(entry_price, direction, config, atr_value)?;

    Ok(Position {
        direction,
        entry_price,
        entry_timestamp: timestamp,
        entry_index: bar_index,
        size,
        stop_loss_price,
        take_profit_price,
    })
}

/// Close `position` at `market_price` and produce the ledger record.
///
/// PnL is net of the round-trip fee on the entry notional.
pub fn close_position(
    position: Position,
    market_price: f64,
    timestamp: NaiveDateTime,
    bar_index: usize,
    reason: ExitReason,
    config: &RiskConfig,
) -> Trade {
    let exit_price = apply_exit_slippage(position.direction, market_price, config.slippage_pct);
    let gross = position.unrealized_pnl(exit_price);
    let fees = fee_for(position.size, config);

    Trade {
        entry_timestamp: position.entry_timestamp,
        exit_timestamp: timestamp,
        direction: position.direction,
        entry_price: position.entry_price,
        exit_price,
        size: position.size,
        pnl: gross - fees,
        fees,
        exit_reason: reason,
        bars_held: bar_index.saturating_sub(position.entry_index),
    }
}
