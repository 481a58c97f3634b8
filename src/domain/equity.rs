//! Account balance, running peak, daily drawdown breaker and equity curve.

use chrono::{NaiveDate, NaiveDateTime};

use super::position::Trade;

#[derive(Debug, Clone, PartialEq)]
pub struct EquityPoint {
    pub timestamp: NaiveDateTime,
    /// Realized balance after the bar.
    pub balance: f64,
    /// Balance plus unrealized PnL of any open position at the close.
    pub equity: f64,
    pub peak_balance: f64,
    pub drawdown_pct: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EquityState {
    pub balance: f64,
    pub peak_balance: f64,
    /// (peak_balance - balance) / peak_balance, as a fraction.
    pub current_drawdown_pct: f64,
    pub daily_pnl: f64,
    pub daily_start_balance: f64,
    pub current_date: Option<NaiveDate>,
    /// Set once the daily drawdown limit trips; cleared on the next date.
    pub entries_halted: bool,
}

impl EquityState {
    pub fn new(starting_balance: f64) -> Self {
        EquityState {
            balance: starting_balance,
            peak_balance: starting_balance,
            current_drawdown_pct: 0.0,
            daily_pnl: 0.0,
            daily_start_balance: starting_balance,
            current_date: None,
            entries_halted: false,
        }
    }

    /// Start a new trading day when `date` differs from the current one.
    /// Returns true on rollover.
    pub fn roll_date(&mut self, date: NaiveDate) -> bool {
        if self.current_date == Some(date) {
            return false;
        }
        self.current_date = Some(date);
        self.daily_start_balance = self.balance;
        self.daily_pnl = 0.0;
        self.entries_halted = false;
        true
    }

    /// Book a closed trade into the balance, peak and daily PnL.
    pub fn apply_trade(&mut self, trade: &Trade) {
        self.balance += trade.pnl;
        self.daily_pnl += trade.pnl;
        if self.balance > self.peak_balance {
            self.peak_balance = self.balance;
        }
        self.current_drawdown_pct = if self.peak_balance > 0.0 {
            (self.peak_balance - self.balance) / self.peak_balance
        } else {
            0.0
        };
    }

    /// Loss since the start of the day, as a fraction of the day's opening balance.
    pub fn daily_drawdown_pct(&self) -> f64 {
        if self.daily_start_balance > 0.0 {
            ((self.daily_start_balance - self.balance) / self.daily_start_balance).max(0.0)
        } else {
            0.0
        }
    }

    /// Check the breaker against `max_daily_drawdown_pct` (percent units,
    /// 0 disables). Once tripped it stays tripped for the rest of the day.
    pub fn check_daily_breaker(&mut self, max_daily_drawdown_pct: f64) -> bool {
        if !self.entries_halted
            && max_daily_drawdown_pct > 0.0
            && self.daily_drawdown_pct() * 100.0 > max_daily_drawdown_pct
        {
            self.entries_halted = true;
        }
        self.entries_halted
    }

    pub fn snapshot(&self, timestamp: NaiveDateTime, unrealized_pnl: f64) -> EquityPoint {
        EquityPoint {
            timestamp,
            balance: self.balance,
            equity: self.balance + unrealized_pnl,
            peak_balance: self.peak_balance,
            drawdown_pct: self.current_drawdown_pct,
        }
    }
}
