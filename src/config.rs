//! Configuration management
//!
//! Loads the sectioned JSON configuration file and exposes it as one
//! immutable structure passed by reference into each component.

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::optimizer::StepRange;
use crate::{SimulationError, StrategyParams};

/// Datetime pattern accepted for the data window bounds
pub const DATETIME_PATTERN: &str = "%Y-%m-%d %H:%M:%S";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub trading: TradingConfig,
    #[serde(default = "default_strategy")]
    pub strategy: StrategyParams,
    #[serde(default)]
    pub search: SearchConfig,
}

impl Config {
    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref()).context("Failed to read config file")?;
        let config: Config =
            serde_json::from_str(&contents).context("Failed to parse config JSON")?;
        Ok(config)
    }

    /// Fail fast on settings that would only blow up mid-run.
    pub fn validate(&self) -> Result<()> {
        if self.strategy.window_size == 0 {
            return Err(SimulationError::ZeroWindowSize.into());
        }
        if self.strategy.window_size >= self.data.max_window {
            return Err(SimulationError::WindowTooLarge {
                window_size: self.strategy.window_size,
                warmup: self.data.max_window,
            }
            .into());
        }

        ensure!(self.strategy.k1 > 0.0, "k1 must be positive");
        ensure!(self.strategy.k2 > 0.0, "k2 must be positive");
        ensure!(
            self.trading.initial_capital > 0.0,
            "initial capital must be positive"
        );
        ensure!(
            (0.0..1.0).contains(&self.trading.fee),
            "fee must be a proportional rate in [0, 1)"
        );

        let search = &self.search;
        ensure!(
            search.k1.min > 0.0 && search.k2.min > 0.0,
            "search bounds for k1/k2 must be positive"
        );
        ensure!(
            search.k1.step > 0.0 && search.k2.step > 0.0,
            "search steps must be positive"
        );
        ensure!(
            search.window_min >= 1 && search.window_min < search.window_max,
            "search window range must be non-empty and start at 1 or above"
        );
        ensure!(
            search.window_max <= self.data.max_window,
            "search window range must stay below the warm-up candle count"
        );
        ensure!(search.max_evals > 0, "search budget must be at least 1 trial");

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data: DataConfig::default(),
            trading: TradingConfig::default(),
            strategy: default_strategy(),
            search: SearchConfig::default(),
        }
    }
}

fn default_strategy() -> StrategyParams {
    StrategyParams {
        k1: 0.56,
        k2: 0.58,
        window_size: 11,
    }
}

/// Candle source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    pub symbol: String,
    /// Candle timeframe string, e.g. "1h" or "15m"
    pub timeframe: String,
    /// Bitfinex section, "hist" or "last"
    pub section: String,
    /// Inclusive start of the trading window, UTC, pattern `%Y-%m-%d %H:%M:%S`
    pub start: String,
    /// Exclusive end of the trading window
    pub end: String,
    /// Warm-up candles fetched before `start`; the upper bound for any window size
    pub max_window: usize,
}

impl DataConfig {
    pub fn start_ms(&self) -> Result<i64> {
        parse_datetime_ms(&self.start)
    }

    pub fn end_ms(&self) -> Result<i64> {
        parse_datetime_ms(&self.end)
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        DataConfig {
            symbol: "tBTCUSD".to_string(),
            timeframe: "1h".to_string(),
            section: "hist".to_string(),
            start: "2018-07-01 00:00:00".to_string(),
            end: "2019-01-01 00:00:00".to_string(),
            max_window: 300,
        }
    }
}

/// Trading configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingConfig {
    /// Initial cash balance, denominated in the quote currency of the symbol
    pub initial_capital: f64,
    /// Proportional fee applied once per buy or sell, e.g. 0.002 = 0.2%
    pub fee: f64,
}

impl Default for TradingConfig {
    fn default() -> Self {
        TradingConfig {
            initial_capital: 10_000.0,
            fee: 0.002,
        }
    }
}

/// Parameter search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Buy-trigger multiplier grid
    pub k1: StepRange,
    /// Sell-trigger multiplier grid
    pub k2: StepRange,
    /// Smallest window size to try
    pub window_min: usize,
    /// Exclusive upper bound on the window size
    pub window_max: usize,
    /// Evaluation budget for one search
    pub max_evals: usize,
    /// Fix the sampler for reproducible searches
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
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
            window_min: 10,
            window_max: 300,
            max_evals: 100,
            seed: None,
        }
    }
}

fn parse_datetime_ms(value: &str) -> Result<i64> {
    let parsed = chrono::NaiveDateTime::parse_from_str(value, DATETIME_PATTERN)
        .with_context(|| format!("Failed to parse datetime: {value}"))?;
    Ok(parsed.and_utc().timestamp_millis())
}
