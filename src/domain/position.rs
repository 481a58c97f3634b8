//! Open position and closed trade records.

use chrono::NaiveDateTime;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// +1 for long, -1 for short.
    pub fn sign(self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Long => "long",
            Direction::Short => "short",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    SignalExit,
    EndOfData,
}

impl ExitReason {
    pub fn as_str(self) -> &'static str {
        match self {
            ExitReason::StopLoss => "stop_loss",
            ExitReason::TakeProfit => "take_profit",
            ExitReason::SignalExit => "signal_exit",
            ExitReason::EndOfData => "end_of_data",
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An open position. `size` is the quote-currency notional committed at entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub direction: Direction,
    pub entry_price: f64,
    pub entry_timestamp: NaiveDateTime,
    pub entry_index: usize,
    pub size: f64,
    pub stop_loss_price: Option<f64>,
    pub take_profit_price: Option<f64>,
}

impl Position {
    /// Base-unit quantity implied by the notional.
    pub fn quantity(&self) -> f64 {
        self.size / self.entry_price
    }

    /// Price PnL (before fees) if closed at `price`.
    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.direction.sign() * self.quantity() * (price - self.entry_price)
    }

    /// Whether `price` is at or through the stop.
    pub fn should_stop_loss(&self, price: f64) -> bool {
        match self.stop_loss_price {
            None => false,
            Some(stop) => match self.direction {
                Direction::Long => price <= stop,
                Direction::Short => price >= stop,
            },
        }
    }

    /// Whether `price` is at or through the target.
    pub fn should_take_profit(&self, price: f64) -> bool {
        match self.take_profit_price {
            None => false,
            Some(take) => match self.direction {
                Direction::Long => price >= take,
                Direction::Short => price <= take,
            },
        }
    }
}

/// Read-only view of the engine's position handed to signal functions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PositionState {
    Flat,
    Open {
        direction: Direction,
        entry_price: f64,
        bars_held: usize,
    },
}

impl PositionState {
    pub fn of(position: Option<&Position>, bar_index: usize) -> Self {
        match position {
            None => PositionState::Flat,
            Some(p) => PositionState::Open {
                direction: p.direction,
                entry_price: p.entry_price,
                bars_held: bar_index.saturating_sub(p.entry_index),
            },
        }
    }

    pub fn is_flat(&self) -> bool {
        matches!(self, PositionState::Flat)
    }

    pub fn direction(&self) -> Option<Direction> {
        match self {
            PositionState::Flat => None,
            PositionState::Open { direction, .. } => Some(*direction),
        }
    }
}

/// A closed position. `pnl` is net of `fees`.
#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub entry_timestamp: NaiveDateTime,
    pub exit_timestamp: NaiveDateTime,
    pub direction: Direction,
    pub entry_price: f64,
    pub exit_price: f64,
    pub size: f64,
    pub pnl: f64,
    pub fees: f64,
    pub exit_reason: ExitReason,
    pub bars_held: usize,
}

impl Trade {
    /// PnL before fees.
    pub fn gross_pnl(&self) -> f64 {
        self.pnl + self.fees
    }
}
