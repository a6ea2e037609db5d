//! Backtesting engine
//!
//! Replays the range-breakout rule candle-by-candle over a fixed history and
//! derives the outcome metrics. A run is deterministic: the same history and
//! parameters always produce bit-identical reports, whether invoked once or
//! repeatedly inside a parameter search.

use tracing::debug;

use crate::benchmark::RefWindow;
use crate::ledger::Ledger;
use crate::{BacktestReport, Candle, SimulationError, StrategyParams};

/// Side the strategy currently holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    Flat,
    Long,
}

/// Breakout backtest engine.
///
/// Owns the run settings only; history is borrowed per run so the same
/// immutable candle slice can back many evaluations.
#[derive(Debug, Clone)]
pub struct Backtester {
    initial_capital: f64,
    fee: f64,
    /// Warm-up candles preceding the trading window in the history slice
    warmup: usize,
    params: StrategyParams,
}

impl Backtester {
    pub fn new(initial_capital: f64, fee: f64, warmup: usize, params: StrategyParams) -> Self {
        Backtester {
            initial_capital,
            fee,
            warmup,
            params,
        }
    }

    /// Replay the strategy over `history` and report the outcome.
    ///
    /// `history` holds the warm-up candles first, then the trading window,
    /// oldest first. Fresh ledger and reference window every call; nothing
    /// carries over between runs.
    pub fn run(&self, history: &[Candle]) -> Result<BacktestReport, SimulationError> {
        let (prime, trading) = split_history(history, self.warmup, self.params.window_size)?;
        if trading.is_empty() {
            return Err(SimulationError::EmptyTradingWindow);
        }

        let mut window = RefWindow::new(prime);
        let mut ledger = Ledger::new(self.initial_capital, self.fee);
        let mut position = Position::Flat;

        for candle in trading {
            // Triggers are computed from prior candles only; the window
            // absorbs the current candle afterwards, trade or no trade.
            let range = window.benchmark_range();
            let buy_trigger = candle.open + self.params.k1 * range;
            let sell_trigger = candle.open - self.params.k2 * range;
            window.advance(candle.clone());

            match position {
                Position::Flat if candle.low <= buy_trigger && buy_trigger <= candle.high => {
                    ledger.buy(buy_trigger)?;
                    position = Position::Long;
                    debug!(mts = candle.mts, price = buy_trigger, "buy");
                }
                Position::Long if candle.low <= sell_trigger && sell_trigger <= candle.high => {
                    ledger.sell(sell_trigger)?;
                    position = Position::Flat;
                    debug!(mts = candle.mts, price = sell_trigger, "sell");
                }
                _ => {}
            }
        }

        let last = trading.last().expect("trading window checked non-empty");
        if position == Position::Long {
            ledger.mark_to_market(last.close);
        }

        Ok(derive_report(
            self.initial_capital,
            ledger.cash(),
            trading[0].open,
            last.close,
        ))
    }
}

/// Split a history slice into the priming window and the trading window.
///
/// The priming window is the last `window_size` candles of the warm-up
/// prefix; trading starts right after the warm-up. Window-size errors are
/// configuration failures and surface before any simulation step.
pub fn split_history(
    history: &[Candle],
    warmup: usize,
    window_size: usize,
) -> Result<(&[Candle], &[Candle]), SimulationError> {
    if window_size == 0 {
        return Err(SimulationError::ZeroWindowSize);
    }
    if window_size >= warmup {
        return Err(SimulationError::WindowTooLarge {
            window_size,
            warmup,
        });
    }
    if history.len() < warmup {
        return Err(SimulationError::InsufficientHistory {
            got: history.len(),
            warmup,
        });
    }

    Ok((&history[warmup - window_size..warmup], &history[warmup..]))
}

/// Derive win, market, and relative rates from run balances.
///
/// Rates are rounded half-up to two decimals; the relative rate is the
/// difference of the rounded rates.
pub fn derive_report(
    initial_capital: f64,
    final_cash: f64,
    first_open: f64,
    last_close: f64,
) -> BacktestReport {
    let win_rate_pct = round2((final_cash / initial_capital - 1.0) * 100.0);
    let market_rate_pct = round2((last_close / first_open - 1.0) * 100.0);

    BacktestReport {
        final_cash,
        win_rate_pct,
        market_rate_pct,
        relative_rate_pct: win_rate_pct - market_rate_pct,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
