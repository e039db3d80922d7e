//! SQLite data adapter.
//!
//! Bars are keyed by (symbol, timeframe, provider, timestamp); timestamps
//! are stored as `%Y-%m-%d %H:%M:%S` text, which sorts correctly as a
//! string.

use chrono::NaiveDateTime;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;

use crate::adapters::csv_adapter::TIMESTAMP_FORMAT;
use crate::domain::error::SentraderError;
use crate::domain::ohlcv::Bar;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, SentraderError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| SentraderError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("sqlite", "pool_size", 4) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool =
            Pool::builder()
                .max_size(pool_size)
                .build(manager)
                .map_err(|e: r2d2::Error| SentraderError::Database {
                    reason: e.to_string(),
                })?;

        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, SentraderError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e: r2d2::Error| SentraderError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    pub fn initialize_schema(&self) -> Result<(), SentraderError> {
        let conn = self
            .pool
            .get()
            .map_err(|e: r2d2::Error| SentraderError::Database {
                reason: e.to_string(),
            })?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS ohlcv (
                symbol TEXT NOT NULL,
                timeframe TEXT NOT NULL,
                provider TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                open REAL NOT NULL,
                high REAL NOT NULL,
                low REAL NOT NULL,
                close REAL NOT NULL,
                volume INTEGER NOT NULL,
                PRIMARY KEY (symbol, timeframe, provider, timestamp)
            );
            CREATE INDEX IF NOT EXISTS idx_ohlcv_series
                ON ohlcv(symbol, timeframe, provider);
            CREATE INDEX IF NOT EXISTS idx_ohlcv_timestamp ON ohlcv(timestamp);",
        )
        .map_err(|e: rusqlite::Error| SentraderError::DatabaseQuery {
            reason: e.to_string(),
        })?;

        Ok(())
    }

    pub fn insert_bars(
        &self,
        symbol: &str,
        timeframe: &str,
        provider: &str,
        bars: &[Bar],
    ) -> Result<(), SentraderError> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e: r2d2::Error| SentraderError::Database {
                reason: e.to_string(),
            })?;

        let tx =
            conn.transaction()
                .map_err(|e: rusqlite::Error| SentraderError::DatabaseQuery {
                    reason: e.to_string(),
                })?;

        for bar in bars {
            tx.execute(
                "INSERT OR REPLACE INTO ohlcv
                     (symbol, timeframe, provider, timestamp, open, high, low, close, volume)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    symbol,
                    timeframe,
                    provider,
                    bar.timestamp.format(TIMESTAMP_FORMAT).to_string(),
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close,
                    bar.volume
                ],
            )
            .map_err(|e: rusqlite::Error| SentraderError::DatabaseQuery {
                reason: e.to_string(),
            })?;
        }

        tx.commit()
            .map_err(|e: rusqlite::Error| SentraderError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        Ok(())
    }
}

impl DataPort for SqliteAdapter {
    fn fetch_ohlcv(
        &self,
        symbol: &str,
        timeframe: &str,
        provider: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<Bar>, SentraderError> {
        let conn = self
            .pool
            .get()
            .map_err(|e: r2d2::Error| SentraderError::Database {
                reason: e.to_string(),
            })?;

        let start_str = start.format(TIMESTAMP_FORMAT).to_string();
        let end_str = end.format(TIMESTAMP_FORMAT).to_string();

        let query = "SELECT timestamp, open, high, low, close, volume
                     FROM ohlcv
                     WHERE symbol = ?1 AND timeframe = ?2 AND provider = ?3
                       AND timestamp >= ?4 AND timestamp <= ?5
                     ORDER BY timestamp ASC";

        let mut stmt =
            conn.prepare(query)
                .map_err(|e: rusqlite::Error| SentraderError::DatabaseQuery {
                    reason: e.to_string(),
                })?;

        let rows = stmt
            .query_map(params![symbol, timeframe, provider, start_str, end_str], |row| {
                let ts_str: String = row.get(0)?;
                let timestamp = NaiveDateTime::parse_from_str(&ts_str, TIMESTAMP_FORMAT)
                    .map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(
                            ts_str.len(),
                            rusqlite::types::Type::Text,
                            Box::new(e),
                        )
                    })?;
                Ok(Bar {
                    timestamp,
                    open: row.get(1)?,
                    high: row.get(2)?,
                    low: row.get(3)?,
                    close: row.get(4)?,
                    volume: row.get(5)?,
                })
            })
            .map_err(|e: rusqlite::Error| SentraderError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        let mut bars = Vec::new();
        for row in rows {
            bars.push(
                row.map_err(|e: rusqlite::Error| SentraderError::DatabaseQuery {
                    reason: e.to_string(),
                })?,
            );
        }

        Ok(bars)
    }

    fn list_symbols(&self) -> Result<Vec<String>, SentraderError> {
        let conn = self
            .pool
            .get()
            .map_err(|e: r2d2::Error| SentraderError::Database {
                reason: e.to_string(),
            })?;

        let query = "SELECT DISTINCT symbol FROM ohlcv ORDER BY symbol";

        let mut stmt =
            conn.prepare(query)
                .map_err(|e: rusqlite::Error| SentraderError::DatabaseQuery {
                    reason: e.to_string(),
                })?;

        let rows = stmt
            .query_map([], |row| row.get(0))
            .map_err(|e: rusqlite::Error| SentraderError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        let mut symbols = Vec::new();
        for row in rows {
            symbols.push(
                row.map_err(|e: rusqlite::Error| SentraderError::DatabaseQuery {
                    reason: e.to_string(),
                })?,
            );
        }

        Ok(symbols)
    }

    fn get_data_range(
        &self,
        symbol: &str,
        timeframe: &str,
        provider: &str,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, SentraderError> {
        let conn = self
            .pool
            .get()
            .map_err(|e: r2d2::Error| SentraderError::Database {
                reason: e.to_string(),
            })?;

        let query = "SELECT MIN(timestamp), MAX(timestamp), COUNT(*)
                     FROM ohlcv
                     WHERE symbol = ?1 AND timeframe = ?2 AND provider = ?3";

        let result: (Option<String>, Option<String>, i64) = conn
            .query_row(query, params![symbol, timeframe, provider], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })
            .map_err(|e: rusqlite::Error| SentraderError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        match result {
            (Some(min_str), Some(max_str), count) if count > 0 => {
                let min = NaiveDateTime::parse_from_str(&min_str, TIMESTAMP_FORMAT).map_err(
                    |e: chrono::ParseError| SentraderError::Database {
                        reason: e.to_string(),
                    },
                )?;
                let max = NaiveDateTime::parse_from_str(&max_str, TIMESTAMP_FORMAT).map_err(
                    |e: chrono::ParseError| SentraderError::Database {
                        reason: e.to_string(),
                    },
                )?;
                Ok(Some((min, max, count as usize)))
            }
            _ => Ok(None),
        }
    }
}
