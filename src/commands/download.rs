//! Download command implementation

use anyhow::Result;
use std::path::Path;
use tracing::info;

use breakout_trader::data::{self, BitfinexFetcher, HistoryRequest};

pub fn run(config_path: Option<String>, output: Option<String>) -> Result<()> {
    info!("Starting download");

    let config = super::load_config(config_path.as_deref())?;

    let request = HistoryRequest::from_config(&config.data)?;
    let candles = BitfinexFetcher::new().fetch_history(&request)?;

    let output = output.unwrap_or_else(|| {
        format!("data/{}_{}.csv", config.data.symbol, config.data.timeframe)
    });
    if let Some(parent) = Path::new(&output).parent() {
        std::fs::create_dir_all(parent)?;
    }
    data::save_csv(&candles, &output)?;

    println!("Saved {} candles to {}", candles.len(), output);
    Ok(())
}
