//! CLI command implementations

pub mod backtest;
pub mod download;
pub mod optimize;

use anyhow::Result;
use tracing::info;

use breakout_trader::data::{self, BitfinexFetcher, HistoryRequest};
use breakout_trader::{BacktestReport, Candle, Config};

/// Load the run's candle history: a local CSV if given, the API otherwise.
pub(crate) fn load_history(config: &Config, csv: Option<&str>) -> Result<Vec<Candle>> {
    match csv {
        Some(path) => {
            info!("Loading candles from CSV: {}", path);
            data::load_csv(path)
        }
        None => {
            let request = HistoryRequest::from_config(&config.data)?;
            BitfinexFetcher::new().fetch_history(&request)
        }
    }
}

pub(crate) fn print_report(initial_capital: f64, report: &BacktestReport) {
    println!("\n{}", "=".repeat(60));
    println!("BACKTEST RESULTS");
    println!("{}", "=".repeat(60));
    println!("Initial Capital:    {:.2}", initial_capital);
    println!("Final Balance:      {:.2}", report.final_cash);
    println!("Absolute Return:    {:.2}%", report.win_rate_pct);
    println!("Market Return:      {:.2}%", report.market_rate_pct);
    println!("Relative Return:    {:.2}%", report.relative_rate_pct);
    println!("{}", "=".repeat(60));
}

/// Load the configuration file, or fall back to the built-in defaults.
pub(crate) fn load_config(config_path: Option<&str>) -> Result<Config> {
    match config_path {
        Some(path) => {
            let config = Config::from_file(path)?;
            info!("Loaded configuration from: {}", path);
            Ok(config)
        }
        None => {
            info!("Using built-in default configuration");
            Ok(Config::default())
        }
    }
}
