//! Backtest result output adapter: per-bar rows as CSV, metrics as JSON.
//!
//! Row CSV columns: `timestamp,open,high,low,close,volume,signal,position,
//! trade_price,equity`. Floats are written in shortest round-trip form so
//! a reloaded file reproduces the run exactly. `trade_price` is empty on
//! bars without a fill.

use chrono::NaiveDateTime;
use std::fs;
use std::path::Path;

use crate::adapters::csv_adapter::TIMESTAMP_FORMAT;
use crate::domain::error::SentraderError;
use crate::domain::metrics::Metrics;
use crate::domain::ohlcv::Bar;
use crate::domain::signal::SignalIntent;
use crate::domain::simulator::{PositionState, SimRow};
use crate::ports::result_port::ResultPort;

pub struct CsvResultAdapter;

impl CsvResultAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CsvResultAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultPort for CsvResultAdapter {
    fn write_rows(&self, rows: &[SimRow], path: &Path) -> Result<(), SentraderError> {
        let mut wtr = csv::Writer::from_path(path).map_err(|e| SentraderError::Export {
            reason: format!("failed to open {}: {}", path.display(), e),
        })?;

        wtr.write_record([
            "timestamp",
            "open",
            "high",
            "low",
            "close",
            "volume",
            "signal",
            "position",
            "trade_price",
            "equity",
        ])
        .map_err(|e| SentraderError::Export {
            reason: format!("CSV write error: {}", e),
        })?;

        for row in rows {
            let record = [
                row.bar.timestamp.format(TIMESTAMP_FORMAT).to_string(),
                row.bar.open.to_string(),
                row.bar.high.to_string(),
                row.bar.low.to_string(),
                row.bar.close.to_string(),
                row.bar.volume.to_string(),
                row.signal.as_int().to_string(),
                row.position.as_int().to_string(),
                row.trade_price.map_or(String::new(), |p| p.to_string()),
                row.equity.to_string(),
            ];
            wtr.write_record(&record).map_err(|e| SentraderError::Export {
                reason: format!("CSV write error: {}", e),
            })?;
        }

        wtr.flush().map_err(|e| SentraderError::Export {
            reason: format!("CSV flush error: {}", e),
        })?;
        Ok(())
    }

    fn write_metrics(&self, metrics: &Metrics, path: &Path) -> Result<(), SentraderError> {
        let json = serde_json::to_string_pretty(metrics).map_err(|e| SentraderError::Export {
            reason: format!("JSON serialize error: {}", e),
        })?;
        fs::write(path, json).map_err(|e| SentraderError::Export {
            reason: format!("failed to write {}: {}", path.display(), e),
        })?;
        Ok(())
    }
}

fn field_error(name: &str, detail: impl std::fmt::Display) -> SentraderError {
    SentraderError::Export {
        reason: format!("invalid {} value: {}", name, detail),
    }
}

fn get_field<'a>(
    record: &'a csv::StringRecord,
    index: usize,
    name: &str,
) -> Result<&'a str, SentraderError> {
    record.get(index).ok_or_else(|| SentraderError::Export {
        reason: format!("missing {} column", name),
    })
}

fn parse_f64(record: &csv::StringRecord, index: usize, name: &str) -> Result<f64, SentraderError> {
    get_field(record, index, name)?
        .parse()
        .map_err(|e| field_error(name, e))
}

/// Reload an exported row file. Inverse of [`ResultPort::write_rows`] up to
/// the flattening of `Flat` into `Hold` in the signal column.
pub fn read_rows(path: &Path) -> Result<Vec<SimRow>, SentraderError> {
    let content = fs::read_to_string(path).map_err(|e| SentraderError::Export {
        reason: format!("failed to read {}: {}", path.display(), e),
    })?;

    let mut rdr = csv::Reader::from_reader(content.as_bytes());
    let mut rows = Vec::new();

    for result in rdr.records() {
        let record = result.map_err(|e| SentraderError::Export {
            reason: format!("CSV parse error: {}", e),
        })?;

        let timestamp = NaiveDateTime::parse_from_str(
            get_field(&record, 0, "timestamp")?,
            TIMESTAMP_FORMAT,
        )
        .map_err(|e| field_error("timestamp", e))?;

        let bar = Bar {
            timestamp,
            open: parse_f64(&record, 1, "open")?,
            high: parse_f64(&record, 2, "high")?,
            low: parse_f64(&record, 3, "low")?,
            close: parse_f64(&record, 4, "close")?,
            volume: get_field(&record, 5, "volume")?
                .parse()
                .map_err(|e| field_error("volume", e))?,
        };

        let signal_int: i8 = get_field(&record, 6, "signal")?
            .parse()
            .map_err(|e| field_error("signal", e))?;
        let signal = SignalIntent::from_int(signal_int)
            .ok_or_else(|| field_error("signal", signal_int))?;

        let position_int: i8 = get_field(&record, 7, "position")?
            .parse()
            .map_err(|e| field_error("position", e))?;
        let position = PositionState::from_int(position_int)
            .ok_or_else(|| field_error("position", position_int))?;

        let trade_field = get_field(&record, 8, "trade_price")?;
        let trade_price = if trade_field.is_empty() {
            None
        } else {
            Some(trade_field.parse().map_err(|e| field_error("trade_price", e))?)
        };

        rows.push(SimRow {
            bar,
            signal,
            position,
            trade_price,
            equity: parse_f64(&record, 9, "equity")?,
        });
    }

    Ok(rows)
}
