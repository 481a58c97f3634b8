//! Performance statistics over a trade ledger and its equity curve.

use super::equity::EquityPoint;
use super::position::Trade;

/// Total return divided by max drawdown. A run that never draws down has no
/// finite ratio, so that case is reported explicitly instead of dividing by zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DrawdownRatio {
    Ratio(f64),
    NoDrawdown,
}

impl DrawdownRatio {
    pub fn value(&self) -> Option<f64> {
        match self {
            DrawdownRatio::Ratio(r) => Some(*r),
            DrawdownRatio::NoDrawdown => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stats {
    pub trade_count: usize,
    pub wins: usize,
    pub losses: usize,
    pub breakeven: usize,
    /// Fraction of trades with net pnl > 0; 0 with no trades.
    pub win_rate: f64,
    /// (final_balance - starting_balance) / starting_balance.
    pub total_return: f64,
    /// Largest peak-to-trough fall of the realized balance, as a fraction.
    pub max_drawdown: f64,
    /// Longest run of bars spent below a prior balance peak.
    pub max_drawdown_bars: usize,
    pub return_drawdown: DrawdownRatio,
    pub profit_factor: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub total_fees: f64,
    pub avg_bars_held: f64,
}

impl Stats {
    /// Zeroed statistics for a run with no trades and no equity movement.
    pub fn empty() -> Self {
        Stats {
            trade_count: 0,
            wins: 0,
            losses: 0,
            breakeven: 0,
            win_rate: 0.0,
            total_return: 0.0,
            max_drawdown: 0.0,
            max_drawdown_bars: 0,
            return_drawdown: DrawdownRatio::NoDrawdown,
            profit_factor: 0.0,
            avg_win: 0.0,
            avg_loss: 0.0,
            largest_win: 0.0,
            largest_loss: 0.0,
            total_fees: 0.0,
            avg_bars_held: 0.0,
        }
    }
}

pub fn summarize(trades: &[Trade], equity_curve: &[EquityPoint], starting_balance: f64) -> Stats {
    if trades.is_empty() && equity_curve.is_empty() {
        return Stats::empty();
    }

    let final_balance = starting_balance + trades.iter().map(|t| t.pnl).sum::<f64>();
    let total_return = if starting_balance > 0.0 {
        (final_balance - starting_balance) / starting_balance
    } else {
        0.0
    };

    let (max_drawdown, max_drawdown_bars) = compute_drawdown(equity_curve, starting_balance);

    let return_drawdown = if max_drawdown > 0.0 {
        DrawdownRatio::Ratio(total_return / max_drawdown)
    } else {
        DrawdownRatio::NoDrawdown
    };

    let mut wins = 0usize;
    let mut losses = 0usize;
    let mut breakeven = 0usize;
    let mut total_wins = 0.0_f64;
    let mut total_losses = 0.0_f64;
    let mut largest_win = 0.0_f64;
    let mut largest_loss = 0.0_f64;
    let mut total_fees = 0.0_f64;
    let mut total_bars = 0usize;

    for trade in trades {
        let pnl = trade.pnl;
        if pnl > 0.0 {
            wins += 1;
            total_wins += pnl;
            largest_win = largest_win.max(pnl);
        } else if pnl < 0.0 {
            losses += 1;
            total_losses += pnl.abs();
            largest_loss = largest_loss.max(pnl.abs());
        } else {
            breakeven += 1;
        }
        total_fees += trade.fees;
        total_bars += trade.bars_held;
    }

    let trade_count = trades.len();
    let win_rate = if trade_count > 0 {
        wins as f64 / trade_count as f64
    } else {
        0.0
    };

    let profit_factor = if total_losses > 0.0 {
        total_wins / total_losses
    } else if total_wins > 0.0 {
        f64::INFINITY
    } else {
        0.0
    };

    let avg_win = if wins > 0 { total_wins / wins as f64 } else { 0.0 };
    let avg_loss = if losses > 0 {
        total_losses / losses as f64
    } else {
        0.0
    };
    let avg_bars_held = if trade_count > 0 {
        total_bars as f64 / trade_count as f64
    } else {
        0.0
    };

    Stats {
        trade_count,
        wins,
        losses,
        breakeven,
        win_rate,
        total_return,
        max_drawdown,
        max_drawdown_bars,
        return_drawdown,
        profit_factor,
        avg_win,
        avg_loss,
        largest_win,
        largest_loss,
        total_fees,
        avg_bars_held,
    }
}

fn compute_drawdown(equity_curve: &[EquityPoint], starting_balance: f64) -> (f64, usize) {
    let mut peak = starting_balance;
    let mut max_dd = 0.0_f64;
    let mut current_bars = 0usize;
    let mut max_bars = 0usize;

    for point in equity_curve {
        if point.balance >= peak {
            peak = point.balance;
            current_bars = 0;
        } else if peak > 0.0 {
            max_dd = max_dd.max((peak - point.balance) / peak);
            current_bars += 1;
            max_bars = max_bars.max(current_bars);
        }
    }

    (max_dd, max_bars)
}
