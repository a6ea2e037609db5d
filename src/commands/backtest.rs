//! Backtest command implementation

use anyhow::Result;
use tracing::info;

use breakout_trader::backtest::Backtester;

pub fn run(
    config_path: Option<String>,
    csv: Option<String>,
    capital_override: Option<f64>,
    k1_override: Option<f64>,
    k2_override: Option<f64>,
    window_override: Option<usize>,
) -> Result<()> {
    info!("Starting backtest");

    let mut config = super::load_config(config_path.as_deref())?;

    // Apply overrides
    if let Some(capital) = capital_override {
        info!("Overriding initial capital to: {:.2}", capital);
        config.trading.initial_capital = capital;
    }
    if let Some(k1) = k1_override {
        info!("Overriding k1 to: {}", k1);
        config.strategy.k1 = k1;
    }
    if let Some(k2) = k2_override {
        info!("Overriding k2 to: {}", k2);
        config.strategy.k2 = k2;
    }
    if let Some(window) = window_override {
        info!("Overriding window size to: {}", window);
        config.strategy.window_size = window;
    }

    config.validate()?;

    let candles = super::load_history(&config, csv.as_deref())?;
    info!("History ready: {} candles", candles.len());

    info!("Running backtest with {}", config.strategy);
    let backtester = Backtester::new(
        config.trading.initial_capital,
        config.trading.fee,
        config.data.max_window,
        config.strategy.clone(),
    );
    let report = backtester.run(&candles)?;

    super::print_report(config.trading.initial_capital, &report);

    info!("Backtest completed successfully");
    Ok(())
}
