//! Data loading and management
//!
//! Fetches historical OHLCV candles from the Bitfinex public API, with
//! pagination and rate-limit backoff, and reads/writes a local CSV store so
//! backtests can run offline. Raw rows are resolved into typed [`Candle`]s
//! through the source [`Schema`] at ingestion; downstream code never touches
//! positional slots again.

use anyhow::{bail, Context, Result};
use std::path::Path;
use std::thread::sleep;
use std::time::Duration;
use tracing::{info, warn};

use crate::{Candle, Schema};

// =============================================================================
// Constants
// =============================================================================

const BITFINEX_CANDLES_URL: &str = "https://api.bitfinex.com/v2/candles/trade";

/// Bitfinex caps candle responses at 5000 rows per request
const PAGE_LIMIT: usize = 5000;

const RATELIMIT_BACKOFF: Duration = Duration::from_secs(5);

// =============================================================================
// Timeframes
// =============================================================================

/// Convert a timeframe string like "1h" or "15m" to its interval in ms.
pub fn interval_ms(timeframe: &str) -> Result<i64> {
    let (count, unit) = timeframe.split_at(timeframe.len().saturating_sub(1));
    let count: i64 = count
        .parse()
        .with_context(|| format!("Invalid timeframe: {timeframe}"))?;

    let unit_ms = match unit {
        "m" => 60_000,
        "h" => 3_600_000,
        "D" => 86_400_000,
        _ => bail!("Unsupported timeframe unit: {timeframe}"),
    };

    Ok(count * unit_ms)
}

// =============================================================================
// Bitfinex Candle Fetcher
// =============================================================================

/// One historical candle request, timestamps in epoch milliseconds.
#[derive(Debug, Clone)]
pub struct HistoryRequest {
    pub symbol: String,
    pub timeframe: String,
    pub section: String,
    pub start_ms: i64,
    pub end_ms: i64,
    /// Candles to fetch before `start_ms` so the reference window can prime
    pub warmup: usize,
}

impl HistoryRequest {
    pub fn from_config(data: &crate::config::DataConfig) -> Result<Self> {
        Ok(HistoryRequest {
            symbol: data.symbol.clone(),
            timeframe: data.timeframe.clone(),
            section: data.section.clone(),
            start_ms: data.start_ms()?,
            end_ms: data.end_ms()?,
            warmup: data.max_window,
        })
    }
}

/// Window actually requested from the API: pulled back by the warm-up span
/// at the front and by one interval at the back, so the last candle closes
/// before the configured end.
fn request_bounds(request: &HistoryRequest, interval: i64) -> (i64, i64) {
    (
        request.start_ms - request.warmup as i64 * interval,
        request.end_ms - interval,
    )
}

/// Fetch historical OHLCV data from the Bitfinex public candles endpoint.
pub struct BitfinexFetcher {
    client: reqwest::blocking::Client,
}

impl Default for BitfinexFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl BitfinexFetcher {
    pub fn new() -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        BitfinexFetcher { client }
    }

    /// Fetch the full candle history for `request`, oldest first.
    ///
    /// Pages through full responses, advancing the start cursor past the
    /// last received candle. Rate-limit responses are absorbed here with a
    /// sleep-and-retry; callers never see a partial or error page.
    pub fn fetch_history(&self, request: &HistoryRequest) -> Result<Vec<Candle>> {
        let interval = interval_ms(&request.timeframe)?;
        let (mut start, end) = request_bounds(request, interval);

        let url = format!(
            "{}:{}:{}/{}",
            BITFINEX_CANDLES_URL, request.timeframe, request.symbol, request.section
        );
        let schema = Schema::bitfinex();

        info!(
            "Fetching {} {} candles from {} to {}",
            request.symbol, request.timeframe, start, end
        );

        let mut candles: Vec<Candle> = Vec::new();
        loop {
            let rows = self.fetch_page(&url, start, end)?;
            let page_len = rows.len();
            let page_base = candles.len();

            for (i, row) in rows.into_iter().enumerate() {
                candles.push(Candle::from_slots(page_base + i, &row, &schema)?);
            }

            info!("  Fetched {} candles ({} total)", page_len, candles.len());

            if page_len < PAGE_LIMIT {
                break;
            }
            match candles.last() {
                Some(last) if last.mts + interval < end => start = last.mts + interval,
                _ => break,
            }
        }

        // The endpoint is asked for ascending order; enforce it anyway and
        // drop duplicate timestamps before anything downstream sees them.
        candles.sort_by_key(|c| c.mts);
        candles.dedup_by_key(|c| c.mts);

        info!("Total candles fetched: {}", candles.len());
        Ok(candles)
    }

    /// Fetch one page of raw rows, retrying through rate-limit responses.
    fn fetch_page(&self, url: &str, start: i64, end: i64) -> Result<Vec<Vec<f64>>> {
        loop {
            let response: serde_json::Value = self
                .client
                .get(url)
                .query(&[
                    ("limit", PAGE_LIMIT.to_string()),
                    ("start", start.to_string()),
                    ("end", end.to_string()),
                    ("sort", "1".to_string()),
                ])
                .send()
                .context("Failed to send candle request")?
                .json()
                .context("Failed to parse candle response")?;

            if is_ratelimit_error(&response) {
                warn!("Rate limited, retrying in {:?}", RATELIMIT_BACKOFF);
                sleep(RATELIMIT_BACKOFF);
                continue;
            }

            return parse_rows(&response);
        }
    }
}

/// Bitfinex signals errors as `["error", code, "message"]`.
fn is_ratelimit_error(response: &serde_json::Value) -> bool {
    match response.as_array() {
        Some(items) if items.first().and_then(|v| v.as_str()) == Some("error") => items
            .iter()
            .filter_map(|v| v.as_str())
            .any(|s| s.contains("ratelimit")),
        _ => false,
    }
}

fn parse_rows(response: &serde_json::Value) -> Result<Vec<Vec<f64>>> {
    let rows = match response.as_array() {
        Some(rows) => rows,
        None => bail!("Unexpected candle response shape: {response}"),
    };

    if rows.first().map(|v| v.is_string()).unwrap_or(false) {
        bail!("Candle API error: {response}");
    }

    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            let slots = row
                .as_array()
                .with_context(|| format!("Row {i} is not an array"))?;
            slots
                .iter()
                .map(|v| v.as_f64())
                .collect::<Option<Vec<f64>>>()
                .with_context(|| format!("Row {i} holds a non-numeric slot"))
        })
        .collect()
}

// =============================================================================
// CSV Store
// =============================================================================

/// Column order used by [`save_csv`]; [`load_csv`] accepts any order the
/// header declares.
const CSV_HEADER: [&str; 6] = ["mts", "open", "high", "low", "close", "volume"];

/// Save candles to a CSV file with a schema header row.
pub fn save_csv(candles: &[Candle], path: impl AsRef<Path>) -> Result<()> {
    let mut writer = csv::Writer::from_path(path.as_ref()).context("Failed to create CSV file")?;

    writer.write_record(CSV_HEADER)?;
    for candle in candles {
        writer.write_record(&[
            candle.mts.to_string(),
            candle.open.to_string(),
            candle.high.to_string(),
            candle.low.to_string(),
            candle.close.to_string(),
            candle.volume.to_string(),
        ])?;
    }
    writer.flush()?;

    info!("Saved {} candles to {}", candles.len(), path.as_ref().display());
    Ok(())
}

/// Load candles from a CSV file, resolving columns through the header row.
pub fn load_csv(path: impl AsRef<Path>) -> Result<Vec<Candle>> {
    let mut reader = csv::Reader::from_path(path.as_ref()).context("Failed to open CSV file")?;

    let headers: Vec<String> = reader
        .headers()
        .context("Failed to read CSV header")?
        .iter()
        .map(|h| h.to_string())
        .collect();
    let schema = Schema::from_names(&headers)?;

    let mut candles = Vec::new();
    for (row_idx, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Failed to read row {}", row_idx + 1))?;
        let slots = record
            .iter()
            .map(|field| field.trim().parse::<f64>())
            .collect::<Result<Vec<f64>, _>>()
            .with_context(|| format!("Failed to parse row {}", row_idx + 1))?;

        candles.push(Candle::from_slots(row_idx, &slots, &schema)?);
    }

    info!(
        "Loaded {} candles from {}",
        candles.len(),
        path.as_ref().display()
    );
    Ok(candles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_interval_ms() {
        assert_eq!(interval_ms("1h").unwrap(), 3_600_000);
        assert_eq!(interval_ms("15m").unwrap(), 900_000);
        assert_eq!(interval_ms("1D").unwrap(), 86_400_000);
        assert!(interval_ms("1x").is_err());
        assert!(interval_ms("h").is_err());
    }

    #[test]
    fn test_request_bounds_shift_for_warmup_and_final_interval() {
        let request = HistoryRequest {
            symbol: "tBTCUSD".to_string(),
            timeframe: "1h".to_string(),
            section: "hist".to_string(),
            start_ms: 1_000_000_000,
            end_ms: 2_000_000_000,
            warmup: 300,
        };

        let (start, end) = request_bounds(&request, 3_600_000);
        assert_eq!(start, 1_000_000_000 - 300 * 3_600_000);
        assert_eq!(end, 2_000_000_000 - 3_600_000);
    }

    #[test]
    fn test_ratelimit_error_detection() {
        assert!(is_ratelimit_error(&json!([
            "error",
            11010,
            "ratelimit: error"
        ])));
        assert!(!is_ratelimit_error(&json!(["error", 10020, "symbol: invalid"])));
        assert!(!is_ratelimit_error(&json!([[0, 1.0, 2.0, 3.0, 4.0, 5.0]])));
    }

    #[test]
    fn test_parse_rows_rejects_api_errors_and_bad_slots() {
        assert!(parse_rows(&json!(["error", 10020, "symbol: invalid"])).is_err());
        assert!(parse_rows(&json!([[0, 1.0, null, 3.0, 4.0, 5.0]])).is_err());

        let rows = parse_rows(&json!([[0, 1.0, 2.0, 3.0, 4.0, 5.0]])).unwrap();
        assert_eq!(rows, vec![vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]]);
    }

    #[test]
    fn test_csv_store_round_trip() {
        let candles = vec![
            Candle {
                mts: 1_530_403_200_000,
                open: 100.0,
                high: 110.0,
                low: 90.0,
                close: 105.0,
                volume: 12.5,
            },
            Candle {
                mts: 1_530_406_800_000,
                open: 105.0,
                high: 112.0,
                low: 101.0,
                close: 108.0,
                volume: 9.25,
            },
        ];

        let path = std::env::temp_dir().join(format!(
            "breakout_trader_csv_test_{}.csv",
            std::process::id()
        ));
        save_csv(&candles, &path).unwrap();
        let loaded = load_csv(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded, candles);
    }

    #[test]
    fn test_csv_unknown_column_is_an_error() {
        let path = std::env::temp_dir().join(format!(
            "breakout_trader_csv_bad_header_{}.csv",
            std::process::id()
        ));
        std::fs::write(&path, "mts,open,high,low,close,vwap\n0,1,2,3,4,5\n").unwrap();

        let err = load_csv(&path).unwrap_err();
        std::fs::remove_file(&path).ok();
        assert!(err.to_string().contains("unknown candle field name"));
    }
}
