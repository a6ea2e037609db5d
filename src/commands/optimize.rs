//! Optimize command implementation with progress tracking

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use breakout_trader::backtest::Backtester;
use breakout_trader::optimizer::{self, Objective, SearchDomain};

pub fn run(
    config_path: Option<String>,
    csv: Option<String>,
    evals_override: Option<usize>,
    seed_override: Option<u64>,
) -> Result<()> {
    info!("Starting parameter search");

    let mut config = super::load_config(config_path.as_deref())?;

    if let Some(evals) = evals_override {
        info!("Overriding search budget to: {} trials", evals);
        config.search.max_evals = evals;
    }
    if let Some(seed) = seed_override {
        info!("Overriding search seed to: {}", seed);
        config.search.seed = Some(seed);
    }

    config.validate()?;

    let candles = super::load_history(&config, csv.as_deref())?;
    info!("History ready: {} candles", candles.len());

    let objective = Objective::new(
        &candles,
        config.data.max_window,
        config.trading.initial_capital,
        config.trading.fee,
    );
    let domain = SearchDomain {
        k1: config.search.k1,
        k2: config.search.k2,
        window_min: config.search.window_min,
        window_max: config.search.window_max,
    };

    println!("\n{}", "=".repeat(60));
    println!("PARAMETER SEARCH");
    println!("{}", "=".repeat(60));
    println!("  Symbol:     {} ({})", config.data.symbol, config.data.timeframe);
    println!(
        "  k1 grid:    [{}, {}] step {}",
        domain.k1.min, domain.k1.max, domain.k1.step
    );
    println!(
        "  k2 grid:    [{}, {}] step {}",
        domain.k2.min, domain.k2.max, domain.k2.step
    );
    println!(
        "  window:     [{}, {})",
        domain.window_min, domain.window_max
    );
    println!("  Trials:     {}", config.search.max_evals);
    println!("{}\n", "=".repeat(60));

    let pb = ProgressBar::new(config.search.max_evals as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{percent:>3}%|{bar:40}| {pos}/{len} [{elapsed}<{eta}] {msg}")
            .unwrap()
            .progress_chars("█░ "),
    );

    let outcome = optimizer::search_with_progress(
        &objective,
        &domain,
        config.search.max_evals,
        config.search.seed,
        &pb,
    )?;
    pb.finish_with_message(format!("best {:.2}%", outcome.best_win_rate_pct));

    println!("\nBest parameters: {}", outcome.best_params);
    println!("Best win rate:   {:.2}%", outcome.best_win_rate_pct);

    // Replay the winning parameters once more for the full report.
    info!("Re-running backtest with best parameters: {}", outcome.best_params);
    let backtester = Backtester::new(
        config.trading.initial_capital,
        config.trading.fee,
        config.data.max_window,
        outcome.best_params.clone(),
    );
    let report = backtester.run(&candles)?;

    super::print_report(config.trading.initial_capital, &report);

    info!("Parameter search completed successfully");
    Ok(())
}
