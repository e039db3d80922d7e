//! OHLCV data access port trait.

use chrono::NaiveDateTime;

use crate::domain::error::SentraderError;
use crate::domain::ohlcv::Bar;

pub trait DataPort {
    /// Fetch bars for one symbol/timeframe/provider, sorted by timestamp,
    /// restricted to `[start, end]` inclusive.
    fn fetch_ohlcv(
        &self,
        symbol: &str,
        timeframe: &str,
        provider: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<Bar>, SentraderError>;

    /// All symbols the store knows about, sorted.
    fn list_symbols(&self) -> Result<Vec<String>, SentraderError>;

    /// First timestamp, last timestamp, and bar count for a series, or
    /// `None` when the store holds no bars for it.
    fn get_data_range(
        &self,
        symbol: &str,
        timeframe: &str,
        provider: &str,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, SentraderError>;
}
