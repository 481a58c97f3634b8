//! Backtest engine: a single forward pass over the candles.
//!
//! Per bar, in order:
//! 1. Calendar date rollover resets the daily breaker
//! 2. A pending next-open entry fills at this bar's open
//! 3. An open position is checked for stop/take inside the bar, then for a
//!    strategy exit at the close
//! 4. When flat (and nothing closed on this bar, and this is not the last
//!    bar) the breaker is checked and the strategy may enter
//! 5. On the last bar any open position is closed at the close
//! 6. An equity point is recorded

use tracing::{debug, info, warn};

use super::candle::Candle;
use super::config_validation::{check_warmup, validate_candles};
use super::equity::{EquityPoint, EquityState};
use super::error::BacktestError;
use super::execution::{close_position, intrabar_exit, open_position, FillTiming};
use super::indicator::IndicatorType;
use super::metrics::{summarize, Stats};
use super::position::{Direction, ExitReason, Position, PositionState, Trade};
use super::risk::RiskConfig;
use super::signal::{MarketData, Signal, SignalFunction};

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    /// Ordered by exit timestamp.
    pub trades: Vec<Trade>,
    pub starting_balance: f64,
    pub final_balance: f64,
    /// One point per candle.
    pub equity_curve: Vec<EquityPoint>,
    pub stats: Stats,
}

/// Every indicator a run of `strategy` under `config` reads, sorted and deduplicated.
pub fn required_indicators(strategy: &dyn SignalFunction, config: &RiskConfig) -> Vec<IndicatorType> {
    let mut indicators = strategy.required_indicators();
    indicators.extend(config.required_indicators());
    indicators.sort();
    indicators.dedup();
    indicators
}

/// Compute indicators for `candles` and run one backtest. Candle checks
/// happen in [`run_on`].
pub fn run(
    candles: Vec<Candle>,
    strategy: &dyn SignalFunction,
    config: &RiskConfig,
) -> Result<BacktestResult, BacktestError> {
    let market = MarketData::new(candles, &required_indicators(strategy, config));
    run_on(&market, strategy, config)
}

/// Run one backtest over precomputed market data.
///
/// `market` is only read, so many runs (different strategies or configs)
/// may share one instance across threads.
pub fn run_on(
    market: &MarketData,
    strategy: &dyn SignalFunction,
    config: &RiskConfig,
) -> Result<BacktestResult, BacktestError> {
    validate_candles(market.candles())?;
    config.validate()?;

    let bars = market.len();
    if let Some(cap) = config.max_bars {
        if bars > cap {
            return Err(BacktestError::invalid(
                "max_bars",
                format!("{bars} candles exceed the cap of {cap}"),
            ));
        }
    }

    let required = required_indicators(strategy, config);
    check_warmup(bars, &required)?;
    let aligned = |t: &IndicatorType| market.indicator(t).is_some_and(|s| s.len() == bars);
    if let Some(missing) = required.iter().find(|t| !aligned(t)) {
        return Err(BacktestError::invalid(
            "indicators",
            format!("market data has no {missing} series covering all {bars} candles"),
        ));
    }

    let mut engine = Engine {
        market,
        strategy,
        config,
        required: &required,
        equity: EquityState::new(config.starting_balance),
        position: None,
        pending: None,
        trades: Vec::new(),
        equity_curve: Vec::with_capacity(bars),
    };
    for index in 0..bars {
        engine.step(index);
    }

    let final_balance = engine.equity.balance;
    let stats = summarize(&engine.trades, &engine.equity_curve, config.starting_balance);

    info!(
        strategy = strategy.name(),
        bars,
        trades = engine.trades.len(),
        final_balance,
        max_drawdown = stats.max_drawdown,
        "backtest complete"
    );

    Ok(BacktestResult {
        trades: engine.trades,
        starting_balance: config.starting_balance,
        final_balance,
        equity_curve: engine.equity_curve,
        stats,
    })
}

/// Entry signalled on one bar, to be filled at the next bar's open.
struct PendingEntry {
    direction: Direction,
    signal_index: usize,
}

struct Engine<'a> {
    market: &'a MarketData,
    strategy: &'a dyn SignalFunction,
    config: &'a RiskConfig,
    required: &'a [IndicatorType],
    equity: EquityState,
    position: Option<Position>,
    pending: Option<PendingEntry>,
    trades: Vec<Trade>,
    equity_curve: Vec<EquityPoint>,
}

impl Engine<'_> {
    fn step(&mut self, index: usize) {
        let market = self.market;
        let candles = market.candles();
        let candle = &candles[index];
        let is_last = index + 1 == candles.len();

        if self.equity.roll_date(candle.date()) {
            debug!(date = %candle.date(), balance = self.equity.balance, "new trading day");
        }

        if let Some(pending) = self.pending.take() {
            self.enter(pending.direction, candle.open, candle, index, pending.signal_index);
        }

        let mut closed_this_bar = false;
        if let Some(position) = &self.position {
            let exit = intrabar_exit(position, candle, self.config.intrabar_policy).or_else(|| {
                let state = PositionState::of(Some(position), index);
                let signal = self.strategy.evaluate(index, self.market, state);
                is_exit_signal(signal, position.direction)
                    .then_some((ExitReason::SignalExit, candle.close))
            });
            if let Some((reason, price)) = exit {
                self.close(price, candle, index, reason);
                closed_this_bar = true;
            }
        }

        if self.position.is_none() && !closed_this_bar && !is_last && self.indicators_ready(index) {
            self.evaluate_entry(candle, index);
        }

        if is_last && self.position.is_some() {
            self.close(candle.close, candle, index, ExitReason::EndOfData);
        }

        let unrealized = self
            .position
            .as_ref()
            .map_or(0.0, |p| p.unrealized_pnl(candle.close));
        self.equity_curve
            .push(self.equity.snapshot(candle.timestamp, unrealized));
    }

    fn evaluate_entry(&mut self, candle: &Candle, index: usize) {
        let was_halted = self.equity.entries_halted;
        if self.equity.check_daily_breaker(self.config.max_daily_drawdown_pct) {
            if !was_halted {
                warn!(
                    date = %candle.date(),
                    daily_drawdown_pct = self.equity.daily_drawdown_pct() * 100.0,
                    limit = self.config.max_daily_drawdown_pct,
                    "daily drawdown breaker tripped, entries halted for the day"
                );
            }
            return;
        }

        let direction = match self.strategy.evaluate(index, self.market, PositionState::Flat) {
            Signal::EnterLong => Direction::Long,
            Signal::EnterShort => Direction::Short,
            Signal::Exit | Signal::Hold => return,
        };

        match self.config.fill_timing {
            FillTiming::SignalClose => self.enter(direction, candle.close, candle, index, index),
            FillTiming::NextOpen => {
                self.pending = Some(PendingEntry {
                    direction,
                    signal_index: index,
                })
            }
        }
    }

    fn enter(
        &mut self,
        direction: Direction,
        market_price: f64,
        candle: &Candle,
        index: usize,
        signal_index: usize,
    ) {
        let atr_value = if self.config.uses_atr() {
            self.market
                .value(&IndicatorType::Atr(self.config.atr_period), signal_index)
        } else {
            None
        };

        match open_position(
            direction,
            market_price,
            candle.timestamp,
            index,
            self.equity.balance,
            atr_value,
            self.config,
        ) {
            Ok(position) => {
                debug!(
                    bar = index,
                    %direction,
                    price = position.entry_price,
                    size = position.size,
                    stop_loss = ?position.stop_loss_price,
                    take_profit = ?position.take_profit_price,
                    "opened position"
                );
                self.position = Some(position);
            }
            Err(e) => {
                warn!(bar = index, %direction, error = %e, "entry skipped by risk rules");
            }
        }
    }

    fn close(&mut self, market_price: f64, candle: &Candle, index: usize, reason: ExitReason) {
        let Some(position) = self.position.take() else {
            return;
        };
        let trade = close_position(position, market_price, candle.timestamp, index, reason, self.config);
        self.equity.apply_trade(&trade);
        debug!(
            bar = index,
            direction = %trade.direction,
            exit_price = trade.exit_price,
            pnl = trade.pnl,
            reason = %trade.exit_reason,
            balance = self.equity.balance,
            "closed position"
        );
        self.trades.push(trade);
    }

    fn indicators_ready(&self, index: usize) -> bool {
        self.required.iter().all(|t| {
            self.market
                .indicator(t)
                .is_some_and(|series| series.is_valid_at(index))
        })
    }
}

/// `Exit`, or an entry in the opposite direction, closes the position.
fn is_exit_signal(signal: Signal, held: Direction) -> bool {
    match signal {
        Signal::Exit => true,
        Signal::EnterLong => held == Direction::Short,
        Signal::EnterShort => held == Direction::Long,
        Signal::Hold => false,
    }
}
