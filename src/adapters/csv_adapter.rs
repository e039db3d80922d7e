//! CSV file data adapter.
//!
//! Bars live in one file per series, named `{symbol}_{timeframe}.csv`, with
//! columns `timestamp,open,high,low,close,volume` and timestamps formatted
//! as `%Y-%m-%d %H:%M:%S`. The provider is part of the port contract but
//! plays no role in file naming.

use chrono::NaiveDateTime;
use std::fs;
use std::path::PathBuf;

use crate::domain::error::SentraderError;
use crate::domain::ohlcv::Bar;
use crate::ports::data_port::DataPort;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str, timeframe: &str) -> PathBuf {
        self.base_path.join(format!("{}_{}.csv", symbol, timeframe))
    }

    fn read_all(&self, symbol: &str, timeframe: &str) -> Result<Vec<Bar>, SentraderError> {
        let path = self.csv_path(symbol, timeframe);
        let content = fs::read_to_string(&path).map_err(|e| SentraderError::Database {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;
        parse_bars(&content)
    }
}

fn get_field<'a>(
    record: &'a csv::StringRecord,
    index: usize,
    name: &str,
) -> Result<&'a str, SentraderError> {
    record.get(index).ok_or_else(|| SentraderError::Database {
        reason: format!("missing {} column", name),
    })
}

fn parse_f64(value: &str, name: &str) -> Result<f64, SentraderError> {
    value.parse().map_err(|e| SentraderError::Database {
        reason: format!("invalid {} value: {}", name, e),
    })
}

/// Parse `timestamp,open,high,low,close,volume` rows into bars, sorted by
/// timestamp.
pub fn parse_bars(content: &str) -> Result<Vec<Bar>, SentraderError> {
    let mut rdr = csv::Reader::from_reader(content.as_bytes());
    let mut bars = Vec::new();

    for result in rdr.records() {
        let record = result.map_err(|e| SentraderError::Database {
            reason: format!("CSV parse error: {}", e),
        })?;

        let ts_str = get_field(&record, 0, "timestamp")?;
        let timestamp =
            NaiveDateTime::parse_from_str(ts_str, TIMESTAMP_FORMAT).map_err(|e| {
                SentraderError::Database {
                    reason: format!("invalid timestamp format: {}", e),
                }
            })?;

        let open = parse_f64(get_field(&record, 1, "open")?, "open")?;
        let high = parse_f64(get_field(&record, 2, "high")?, "high")?;
        let low = parse_f64(get_field(&record, 3, "low")?, "low")?;
        let close = parse_f64(get_field(&record, 4, "close")?, "close")?;
        let volume: i64 = get_field(&record, 5, "volume")?
            .parse()
            .map_err(|e| SentraderError::Database {
                reason: format!("invalid volume value: {}", e),
            })?;

        bars.push(Bar {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        });
    }

    bars.sort_by_key(|b| b.timestamp);
    Ok(bars)
}

impl DataPort for CsvAdapter {
    fn fetch_ohlcv(
        &self,
        symbol: &str,
        timeframe: &str,
        _provider: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<Bar>, SentraderError> {
        let mut bars = self.read_all(symbol, timeframe)?;
        bars.retain(|b| b.timestamp >= start && b.timestamp <= end);
        Ok(bars)
    }

    fn list_symbols(&self) -> Result<Vec<String>, SentraderError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| SentraderError::Database {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut symbols = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| SentraderError::Database {
                reason: format!("directory entry error: {}", e),
            })?;
            let name = entry.file_name();
            let name_str = name.to_string_lossy();
            if let Some(stem) = name_str.strip_suffix(".csv") {
                if let Some((symbol, _timeframe)) = stem.rsplit_once('_') {
                    let symbol = symbol.to_string();
                    if !symbols.contains(&symbol) {
                        symbols.push(symbol);
                    }
                }
            }
        }

        symbols.sort();
        Ok(symbols)
    }

    fn get_data_range(
        &self,
        symbol: &str,
        timeframe: &str,
        _provider: &str,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, SentraderError> {
        if !self.csv_path(symbol, timeframe).exists() {
            return Ok(None);
        }
        let bars = self.read_all(symbol, timeframe)?;
        match (bars.first(), bars.last()) {
            (Some(first), Some(last)) => {
                Ok(Some((first.timestamp, last.timestamp, bars.len())))
            }
            _ => Ok(None),
        }
    }
}
