//! JSON Lines input files.
//!
//! Candles: one bar per line, oldest first.
//!
//! ```text
//! {"open_time":"2024-03-04T10:00:00Z","open":"100","high":"101","low":"99","close":"100.5","volume":"12"}
//! ```
//!
//! Fills: one execution per line. `instrument` and `timeframe` default to
//! the market the file is loaded for.
//!
//! ```text
//! {"order_no":"A","side":"buy","price":"10","quantity":"5","fill_time":"2024-03-04T10:00:00Z"}
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tdbot_core::{Candle, CandleSeries, Fill, Instrument, OrderNo, OrderSide, Price, Size, TimeframeId};
use tracing::debug;

use crate::config::MarketConfig;
use crate::error::{AppError, AppResult};

#[derive(Debug, Deserialize)]
struct CandleRecord {
    open_time: DateTime<Utc>,
    open: Price,
    high: Price,
    low: Price,
    close: Price,
    #[serde(default)]
    volume: Size,
}

#[derive(Debug, Deserialize)]
struct FillRecord {
    order_no: OrderNo,
    side: OrderSide,
    price: Price,
    quantity: Size,
    fill_time: DateTime<Utc>,
    #[serde(default)]
    instrument: Option<Instrument>,
    #[serde(default)]
    timeframe: Option<TimeframeId>,
}

/// Parse every non-blank line of a JSON Lines file, keeping each record's
/// 1-based line number.
fn read_jsonl<T: DeserializeOwned>(path: &Path) -> AppResult<Vec<(usize, T)>> {
    let file = File::open(path).map_err(|e| AppError::Input {
        path: path.display().to_string(),
        line: 0,
        reason: e.to_string(),
    })?;

    let mut records = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).map_err(|e| AppError::Input {
            path: path.display().to_string(),
            line: index + 1,
            reason: e.to_string(),
        })?;
        records.push((index + 1, record));
    }
    Ok(records)
}

/// Load the candle series of a market from its configured file.
pub fn load_candles(market: &MarketConfig) -> AppResult<CandleSeries> {
    let records: Vec<(usize, CandleRecord)> = read_jsonl(&market.candles_path)?;
    let candles = records
        .into_iter()
        .map(|(_, r)| {
            Candle::new(
                r.open_time,
                r.open,
                r.high,
                r.low,
                r.close,
                r.volume,
                market.timeframe,
            )
        })
        .collect::<Vec<_>>();
    debug!(
        market = %market.label(),
        bars = candles.len(),
        path = %market.candles_path.display(),
        "Loaded candles"
    );
    Ok(CandleSeries::new(market.instrument(), market.timeframe, candles)?)
}

/// Load fills for `market`, filling in its instrument and canonical id
/// where a line omits them.
///
/// Fills are validated here; scope membership is checked by settlement.
pub fn load_fills(path: &Path, market: &MarketConfig) -> AppResult<Vec<Fill>> {
    let records: Vec<(usize, FillRecord)> = read_jsonl(path)?;
    let mut fills = Vec::with_capacity(records.len());
    for (line, r) in records {
        let fill = Fill::new(
            r.order_no,
            r.instrument.unwrap_or_else(|| market.instrument()),
            r.timeframe.unwrap_or_else(|| market.canonical_id()),
            r.side,
            r.price,
            r.quantity,
            r.fill_time,
        );
        fill.validate().map_err(|e| AppError::Input {
            path: path.display().to_string(),
            line,
            reason: e.to_string(),
        })?;
        fills.push(fill);
    }
    debug!(market = %market.label(), fills = fills.len(), path = %path.display(), "Loaded fills");
    Ok(fills)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Write;
    use std::path::PathBuf;
    use tdbot_core::{CoreError, Timeframe};
    use tempfile::TempDir;

    fn market(candles_path: PathBuf) -> MarketConfig {
        MarketConfig {
            instrument: "BTCUSDT".to_string(),
            timeframe: Timeframe::H1,
            alternate_timeframe_id: Some("1h-b".to_string()),
            candles_path,
        }
    }

    fn write_lines(dir: &TempDir, name: &str, lines: &[&str]) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = File::create(&path).unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        path
    }

    #[test]
    fn test_load_candles() {
        let dir = TempDir::new().unwrap();
        let path = write_lines(
            &dir,
            "candles.jsonl",
            &[
                r#"{"open_time":"2024-03-04T10:00:00Z","open":"100","high":"101","low":"99","close":"100.5","volume":"12"}"#,
                "",
                r#"{"open_time":"2024-03-04T11:00:00Z","open":100.5,"high":102,"low":100,"close":101}"#,
            ],
        );
        let series = load_candles(&market(path)).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.timeframe(), Timeframe::H1);
        let last = series.last().unwrap();
        assert_eq!(last.close, Price::new(dec!(101)));
        assert_eq!(last.volume, Size::default());
    }

    #[test]
    fn test_unordered_candles_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_lines(
            &dir,
            "candles.jsonl",
            &[
                r#"{"open_time":"2024-03-04T11:00:00Z","open":"1","high":"1","low":"1","close":"1"}"#,
                r#"{"open_time":"2024-03-04T10:00:00Z","open":"1","high":"1","low":"1","close":"1"}"#,
            ],
        );
        assert!(matches!(
            load_candles(&market(path)),
            Err(AppError::Core(CoreError::MalformedSeries { index: 1, .. }))
        ));
    }

    #[test]
    fn test_bad_line_reports_position() {
        let dir = TempDir::new().unwrap();
        let path = write_lines(
            &dir,
            "candles.jsonl",
            &[
                r#"{"open_time":"2024-03-04T10:00:00Z","open":"1","high":"1","low":"1","close":"1"}"#,
                r#"{"open_time":"not a time"}"#,
            ],
        );
        match load_candles(&market(path)) {
            Err(AppError::Input { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_missing_file_is_input_error() {
        let dir = TempDir::new().unwrap();
        let result = load_candles(&market(dir.path().join("absent.jsonl")));
        assert!(matches!(result, Err(AppError::Input { line: 0, .. })));
    }

    #[test]
    fn test_load_fills_with_defaults() {
        let dir = TempDir::new().unwrap();
        let path = write_lines(
            &dir,
            "fills.jsonl",
            &[
                r#"{"order_no":"A","side":"buy","price":"10","quantity":"5","fill_time":"2024-03-04T10:00:00Z"}"#,
                r#"{"order_no":"C","side":"sell","price":"14","quantity":"3","fill_time":"2024-03-04T12:00:00Z","timeframe":"1h-b"}"#,
            ],
        );
        let fills = load_fills(&path, &market(dir.path().join("unused"))).unwrap();
        assert_eq!(fills.len(), 2);
        assert_eq!(fills[0].instrument, Instrument::new("BTCUSDT"));
        assert_eq!(fills[0].timeframe, TimeframeId::new("1h"));
        assert_eq!(fills[0].unmatched_quantity, Size::new(dec!(5)));
        assert_eq!(fills[1].side, OrderSide::Sell);
        assert_eq!(fills[1].timeframe, TimeframeId::new("1h-b"));
    }

    #[test]
    fn test_invalid_fill_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_lines(
            &dir,
            "fills.jsonl",
            &[r#"{"order_no":"A","side":"buy","price":"10","quantity":"0","fill_time":"2024-03-04T10:00:00Z"}"#],
        );
        match load_fills(&path, &market(dir.path().join("unused"))) {
            Err(AppError::Input { line, reason, .. }) => {
                assert_eq!(line, 1);
                assert!(reason.contains("non-positive quantity"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_invalid_fill_after_blank_line_reports_file_line() {
        let dir = TempDir::new().unwrap();
        let path = write_lines(
            &dir,
            "fills.jsonl",
            &[
                r#"{"order_no":"A","side":"buy","price":"10","quantity":"5","fill_time":"2024-03-04T10:00:00Z"}"#,
                "",
                r#"{"order_no":"B","side":"sell","price":"-1","quantity":"5","fill_time":"2024-03-04T11:00:00Z"}"#,
            ],
        );
        match load_fills(&path, &market(dir.path().join("unused"))) {
            Err(AppError::Input { line, .. }) => assert_eq!(line, 3),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
