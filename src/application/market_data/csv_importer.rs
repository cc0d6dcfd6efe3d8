//! Bulk-imports OHLCV candles from CSV, routing rows that fail to parse or
//! validate to a dead-letter queue instead of aborting the whole import.

use crate::domain::market::candle::Candle;
use crate::domain::market::timeframe::Timeframe;
use chrono::{NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::warn;

/// Unix-ms values are always larger than this (2100-01-01T00:00:00Z in
/// seconds); anything above it is treated as milliseconds, not seconds.
const MS_DISAMBIGUATION_THRESHOLD: i64 = 4_102_444_800;

/// One row that failed to become a `Candle`, serialized so it can be
/// written to a dead-letter JSONL file for later inspection/replay.
#[derive(Debug, Clone, Serialize)]
pub struct DeadLetter {
    pub line_number: usize,
    pub raw: String,
    pub error: String,
    pub at: i64,
}

pub struct CsvImportResult {
    pub candles: Vec<Candle>,
    pub dead_letters: Vec<DeadLetter>,
}

struct Columns {
    time: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: Option<usize>,
}

const REQUIRED_COLUMNS: [&str; 5] = ["time", "open", "high", "low", "close"];

fn resolve_columns(headers: &csv::StringRecord) -> Result<Columns, String> {
    let normalized: Vec<String> = headers.iter().map(|h| h.trim().to_lowercase()).collect();
    let find = |name: &str| normalized.iter().position(|h| h == name);

    let mut missing = Vec::new();
    for name in REQUIRED_COLUMNS {
        if find(name).is_none() {
            missing.push(name);
        }
    }
    if !missing.is_empty() {
        return Err(format!("missing required column(s): {}", missing.join(", ")));
    }

    Ok(Columns {
        time: find("time").unwrap(),
        open: find("open").unwrap(),
        high: find("high").unwrap(),
        low: find("low").unwrap(),
        close: find("close").unwrap(),
        volume: find("volume"),
    })
}

/// Parse `time` as Unix seconds, Unix milliseconds, or ISO-8601 (with or
/// without a `Z` suffix, or space-separated date/time).
fn parse_time(raw: &str) -> Result<i64, String> {
    let s = raw.trim();
    if let Ok(n) = s.parse::<i64>() {
        return Ok(if n > MS_DISAMBIGUATION_THRESHOLD { n / 1000 } else { n });
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Ok(dt.timestamp());
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(ndt.and_utc().timestamp());
        }
    }
    Err(format!("unrecognized time format '{raw}'"))
}

/// Parse a CSV import with header row `time,open,high,low,close[,volume]`
/// (case-insensitive, whitespace-trimmed column names, in any order).
/// `symbol` and `timeframe` are fixed per-import since CSV dumps are always
/// single-symbol, single-timeframe; `source` is stamped onto every candle.
pub fn import_csv(csv_bytes: &[u8], symbol: &str, timeframe: Timeframe, source: &str) -> CsvImportResult {
    let at = Utc::now().timestamp();
    let mut candles = Vec::new();
    let mut dead_letters = Vec::new();

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(csv_bytes);

    let headers = match reader.headers() {
        Ok(h) => h.clone(),
        Err(e) => {
            dead_letters.push(DeadLetter {
                line_number: 1,
                raw: String::new(),
                error: format!("reading header row: {e}"),
                at,
            });
            return CsvImportResult { candles, dead_letters };
        }
    };

    let columns = match resolve_columns(&headers) {
        Ok(c) => c,
        Err(e) => {
            dead_letters.push(DeadLetter {
                line_number: 1,
                raw: headers.iter().collect::<Vec<_>>().join(","),
                error: e,
                at,
            });
            return CsvImportResult { candles, dead_letters };
        }
    };

    for (i, record) in reader.records().enumerate() {
        let line_number = i + 2; // +1 for header, +1 for 1-indexing
        match record {
            Ok(row) => match row_to_candle(&row, &columns, symbol, timeframe, source) {
                Ok(candle) => candles.push(candle),
                Err(e) => {
                    warn!(line_number, error = %e, "candle validation failed during CSV import");
                    dead_letters.push(DeadLetter {
                        line_number,
                        raw: row.iter().collect::<Vec<_>>().join(","),
                        error: e,
                        at,
                    });
                }
            },
            Err(e) => {
                dead_letters.push(DeadLetter {
                    line_number,
                    raw: String::new(),
                    error: e.to_string(),
                    at,
                });
            }
        }
    }

    CsvImportResult { candles, dead_letters }
}

fn row_to_candle(
    row: &csv::StringRecord,
    columns: &Columns,
    symbol: &str,
    timeframe: Timeframe,
    source: &str,
) -> Result<Candle, String> {
    let field = |idx: usize| row.get(idx).ok_or_else(|| format!("missing column at index {idx}"));
    let parse_decimal = |s: &str| Decimal::from_str(s.trim()).map_err(|e| format!("bad decimal '{s}': {e}"));

    let timestamp = parse_time(field(columns.time)?)?;
    let aligned = timeframe.align(timestamp);
    let open = parse_decimal(field(columns.open)?)?;
    let high = parse_decimal(field(columns.high)?)?;
    let low = parse_decimal(field(columns.low)?)?;
    let close = parse_decimal(field(columns.close)?)?;
    let volume = match columns.volume {
        Some(idx) => parse_decimal(field(idx)?)?,
        None => Decimal::ZERO,
    };

    Candle::new(symbol, timeframe, aligned, open, high, low, close, volume, source).map_err(|e| e.to_string())
}

/// Serialize dead letters as newline-delimited JSON for a dead-letter file.
pub fn dead_letters_to_jsonl(dead_letters: &[DeadLetter]) -> String {
    dead_letters
        .iter()
        .filter_map(|d| serde_json::to_string(d).ok())
        .collect::<Vec<_>>()
        .join("\n")
}
