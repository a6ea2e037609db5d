//! Core data types used across the backtesting system

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by the simulation core and the candle ingestion path.
///
/// Configuration and data-integrity variants abort a run before or during
/// simulation; no partial metrics are ever reported.
#[derive(Debug, Error, PartialEq)]
pub enum SimulationError {
    #[error("window size must be at least 1")]
    ZeroWindowSize,

    #[error("window size ({window_size}) must be smaller than the warm-up candle count ({warmup})")]
    WindowTooLarge { window_size: usize, warmup: usize },

    #[error("history has {got} candles but the warm-up window alone needs {warmup}")]
    InsufficientHistory { got: usize, warmup: usize },

    #[error("no trading candles after the warm-up split")]
    EmptyTradingWindow,

    #[error("candle {index} has no slot for field {field}")]
    MissingField { index: usize, field: CandleField },

    #[error("unknown candle field name: {0}")]
    UnknownField(String),

    #[error("trade price must be positive, got {price}")]
    InvalidPrice { price: f64 },
}

/// Named slots a candle row can carry, in whatever order the source uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CandleField {
    MilliTimeStamp,
    Open,
    Close,
    High,
    Low,
    Volume,
}

impl CandleField {
    pub fn as_str(&self) -> &'static str {
        match self {
            CandleField::MilliTimeStamp => "mts",
            CandleField::Open => "open",
            CandleField::Close => "close",
            CandleField::High => "high",
            CandleField::Low => "low",
            CandleField::Volume => "volume",
        }
    }

    /// Parse a field name as it appears in a CSV header or source docs.
    pub fn from_name(name: &str) -> Result<Self, SimulationError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "mts" | "millitimestamp" | "timestamp" => Ok(CandleField::MilliTimeStamp),
            "open" => Ok(CandleField::Open),
            "close" => Ok(CandleField::Close),
            "high" => Ok(CandleField::High),
            "low" => Ok(CandleField::Low),
            "volume" => Ok(CandleField::Volume),
            other => Err(SimulationError::UnknownField(other.to_string())),
        }
    }
}

impl std::fmt::Display for CandleField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Positional field layout of raw candle rows.
///
/// Sources describe which slot holds which value; rows are resolved through
/// the schema exactly once, at ingestion, into typed [`Candle`]s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    fields: Vec<CandleField>,
}

impl Schema {
    pub fn new(fields: Vec<CandleField>) -> Self {
        Schema { fields }
    }

    /// Field order of the Bitfinex v2 candles endpoint.
    pub fn bitfinex() -> Self {
        Schema::new(vec![
            CandleField::MilliTimeStamp,
            CandleField::Open,
            CandleField::Close,
            CandleField::High,
            CandleField::Low,
            CandleField::Volume,
        ])
    }

    /// Build a schema from header names, e.g. a CSV header row.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self, SimulationError> {
        let fields = names
            .iter()
            .map(|n| CandleField::from_name(n.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Schema::new(fields))
    }

    pub fn index_of(&self, field: CandleField) -> Option<usize> {
        self.fields.iter().position(|f| *f == field)
    }

    pub fn fields(&self) -> &[CandleField] {
        &self.fields
    }
}

/// OHLCV candlestick, timestamped in milliseconds since the epoch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub mts: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// Resolve one raw row into a typed candle through the source schema.
    ///
    /// `index` is the row position within the fetched page, used only for
    /// error reporting. A slot the schema promises but the row lacks is a
    /// data-integrity failure, never coerced to zero.
    pub fn from_slots(index: usize, slots: &[f64], schema: &Schema) -> Result<Self, SimulationError> {
        let slot = |field: CandleField| -> Result<f64, SimulationError> {
            schema
                .index_of(field)
                .and_then(|i| slots.get(i).copied())
                .ok_or(SimulationError::MissingField { index, field })
        };

        Ok(Candle {
            mts: slot(CandleField::MilliTimeStamp)? as i64,
            open: slot(CandleField::Open)?,
            high: slot(CandleField::High)?,
            low: slot(CandleField::Low)?,
            close: slot(CandleField::Close)?,
            volume: slot(CandleField::Volume)?,
        })
    }
}

/// Breakout strategy parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyParams {
    /// Buy-trigger multiplier on the benchmark range
    pub k1: f64,
    /// Sell-trigger multiplier on the benchmark range
    pub k2: f64,
    /// Trailing reference window length
    pub window_size: usize,
}

impl std::fmt::Display for StrategyParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "k1={:.2}, k2={:.2}, window_size={}",
            self.k1, self.k2, self.window_size
        )
    }
}

/// Outcome of one backtest run, derived from final vs initial balances
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    pub final_cash: f64,
    pub win_rate_pct: f64,
    pub market_rate_pct: f64,
    pub relative_rate_pct: f64,
}
