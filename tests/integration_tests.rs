//! Integration tests for the breakout backtesting system
//!
//! These tests verify that the simulator, ledger, benchmark window, and
//! parameter search work together correctly on small, hand-checkable
//! histories.

use approx::assert_relative_eq;

use breakout_trader::backtest::Backtester;
use breakout_trader::optimizer::{search, Objective, SearchDomain, StepRange};
use breakout_trader::{Candle, SimulationError, StrategyParams};

// =============================================================================
// Test Utilities
// =============================================================================

fn candle(mts: i64, open: f64, high: f64, low: f64, close: f64) -> Candle {
    Candle {
        mts,
        open,
        high,
        low,
        close,
        volume: 1_000.0,
    }
}

/// Deterministic zigzag around a base price: alternating up and down legs
/// wide enough to cross breakout triggers in both directions.
fn zigzag_candles(count: usize, base_price: f64) -> Vec<Candle> {
    (0..count)
        .map(|i| {
            let swing = if i % 2 == 0 { 10.0 } else { -10.0 };
            let open = base_price + swing * 0.2;
            let close = base_price + swing;
            let high = open.max(close) + 5.0;
            let low = open.min(close) - 5.0;
            candle(i as i64 * 3_600_000, open, high, low, close)
        })
        .collect()
}

/// Two warm-up candles with a benchmark range of exactly 20, then a single
/// trading candle: max(110 - 90, 100 - 80) = 20.
fn single_candle_history() -> Vec<Candle> {
    vec![
        candle(0, 95.0, 110.0, 85.0, 90.0),
        candle(1, 90.0, 105.0, 80.0, 100.0),
        candle(2, 100.0, 110.0, 90.0, 105.0),
    ]
}

fn params(k1: f64, k2: f64, window_size: usize) -> StrategyParams {
    StrategyParams {
        k1,
        k2,
        window_size,
    }
}

// =============================================================================
// Simulator Scenarios
// =============================================================================

#[test]
fn test_single_candle_buy_and_mark_to_market() {
    // Fee 0, range 20, k1 0.5: buy trigger 100 + 10 = 110 sits exactly on
    // the candle high, so the trade fires and the run marks to market at
    // the close.
    let backtester = Backtester::new(10_000.0, 0.0, 2, params(0.5, 0.5, 2));
    let report = backtester.run(&single_candle_history()).unwrap();

    assert_relative_eq!(
        report.final_cash,
        10_000.0 / 110.0 * 105.0,
        max_relative = 1e-12
    );
    assert_eq!(report.win_rate_pct, -4.55);
    assert_eq!(report.market_rate_pct, 5.0);
    assert_relative_eq!(report.relative_rate_pct, -9.55);
}

#[test]
fn test_empty_trading_window_refuses_to_report() {
    // The warm-up consumes the whole history; there is no candle to trade
    // or to anchor the market rate on.
    let history = single_candle_history();
    let backtester = Backtester::new(10_000.0, 0.0, 3, params(0.5, 0.5, 2));

    assert_eq!(
        backtester.run(&history).unwrap_err(),
        SimulationError::EmptyTradingWindow
    );
}

#[test]
fn test_fee_drag_on_a_flat_round_trip() {
    // Buy and sell both execute at 105; the only loss is the fee, twice.
    let history = vec![
        candle(0, 100.0, 105.0, 95.0, 100.0),
        // Priming candle: range = max(110 - 100, 100 - 90) = 10
        candle(1, 100.0, 110.0, 90.0, 100.0),
        // Buy trigger 100 + 0.5x10 = 105, inside [96, 106]
        candle(2, 100.0, 106.0, 96.0, 104.0),
        // Window now holds candle 2: range = max(106 - 104, 104 - 96) = 8.
        // Sell trigger 109 - 0.5x8 = 105, inside [104, 112].
        candle(3, 109.0, 112.0, 104.0, 108.0),
    ];

    let backtester = Backtester::new(10_000.0, 0.002, 2, params(0.5, 0.5, 1));
    let report = backtester.run(&history).unwrap();

    assert_relative_eq!(
        report.final_cash,
        10_000.0 * 0.998 * 0.998,
        max_relative = 1e-12
    );
    assert!(report.final_cash < 10_000.0);
    assert_eq!(report.win_rate_pct, -0.4);
}

#[test]
fn test_runs_are_deterministic() {
    let history = zigzag_candles(120, 1_000.0);
    let backtester = Backtester::new(10_000.0, 0.002, 30, params(0.4, 0.4, 12));

    let first = backtester.run(&history).unwrap();
    let second = backtester.run(&history).unwrap();

    assert_eq!(first.final_cash.to_bits(), second.final_cash.to_bits());
    assert_eq!(first, second);
}

#[test]
fn test_relative_rate_ties_win_and_market_rates() {
    let history = zigzag_candles(200, 500.0);
    let backtester = Backtester::new(10_000.0, 0.002, 50, params(0.3, 0.3, 20));
    let report = backtester.run(&history).unwrap();

    assert!(report.final_cash > 0.0);
    assert_relative_eq!(
        report.relative_rate_pct,
        report.win_rate_pct - report.market_rate_pct
    );
}

#[test]
fn test_no_trades_still_reports_market_rate() {
    // Triggers far outside every candle: the run ends flat at the initial
    // capital but the buy-and-hold baseline is still defined.
    let history = zigzag_candles(60, 1_000.0);
    let backtester = Backtester::new(10_000.0, 0.002, 30, params(100.0, 100.0, 10));
    let report = backtester.run(&history).unwrap();

    assert_eq!(report.final_cash, 10_000.0);
    assert_eq!(report.win_rate_pct, 0.0);
    assert_relative_eq!(report.relative_rate_pct, -report.market_rate_pct);
}

// =============================================================================
// Parameter Search
// =============================================================================

#[test]
fn test_rescoring_the_same_params_is_idempotent() {
    let history = zigzag_candles(150, 800.0);
    let objective = Objective::new(&history, 40, 10_000.0, 0.002);
    let candidate = params(0.5, 0.7, 15);

    let first = objective.evaluate(&candidate).unwrap();
    let second = objective.evaluate(&candidate).unwrap();
    assert_eq!(first.to_bits(), second.to_bits());
}

#[test]
fn test_search_outcome_matches_a_rescore_of_its_winner() {
    let history = zigzag_candles(150, 800.0);
    let objective = Objective::new(&history, 40, 10_000.0, 0.002);
    let domain = SearchDomain {
        k1: StepRange {
            min: 0.1,
            max: 2.0,
            step: 0.02,
        },
        k2: StepRange {
            min: 0.1,
            max: 2.0,
            step: 0.02,
        },
        window_min: 5,
        window_max: 40,
    };

    let outcome = search(&objective, &domain, 30, Some(9)).unwrap();
    assert_eq!(outcome.evals, 30);

    // Nothing leaks between evaluations: scoring the winner again outside
    // the search reproduces the reported best win rate exactly.
    let rescored = -objective.evaluate(&outcome.best_params).unwrap();
    assert_eq!(rescored.to_bits(), outcome.best_win_rate_pct.to_bits());
}

#[test]
fn test_search_aborts_on_configuration_errors() {
    let history = zigzag_candles(60, 800.0);
    let objective = Objective::new(&history, 40, 10_000.0, 0.002);
    // Every candidate window is at least as large as the warm-up count.
    let domain = SearchDomain {
        k1: StepRange {
            min: 0.5,
            max: 0.5,
            step: 0.02,
        },
        k2: StepRange {
            min: 0.5,
            max: 0.5,
            step: 0.02,
        },
        window_min: 40,
        window_max: 41,
    };

    assert!(matches!(
        search(&objective, &domain, 10, Some(3)).unwrap_err(),
        SimulationError::WindowTooLarge { .. }
    ));
}
