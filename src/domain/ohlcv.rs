//! OHLCV bar representation and data-quality checks.

use chrono::NaiveDateTime;
use std::fmt;

/// One OHLCV observation. Immutable once loaded into a series.
#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

impl Bar {
    pub fn has_finite_prices(&self) -> bool {
        self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite()
    }
}

/// Non-fatal data-quality findings. Collected and reported, never raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityIssue {
    /// high < max(open, close)
    HighBelowBody,
    /// low > min(open, close)
    LowAboveBody,
    NegativeVolume,
    /// timestamp not strictly greater than the previous bar's
    NonMonotonicTimestamp,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataQualityWarning {
    pub index: usize,
    pub timestamp: NaiveDateTime,
    pub issue: QualityIssue,
}

impl fmt::Display for DataQualityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match self.issue {
            QualityIssue::HighBelowBody => "high below max(open, close)",
            QualityIssue::LowAboveBody => "low above min(open, close)",
            QualityIssue::NegativeVolume => "negative volume",
            QualityIssue::NonMonotonicTimestamp => "non-monotonic timestamp",
        };
        write!(f, "bar {} at {}: {}", self.index, self.timestamp, what)
    }
}

/// Scan a bar series for tolerable-but-flaggable data problems.
pub fn scan_quality(bars: &[Bar]) -> Vec<DataQualityWarning> {
    let mut warnings = Vec::new();
    for (i, bar) in bars.iter().enumerate() {
        if bar.high < bar.open.max(bar.close) {
            warnings.push(DataQualityWarning {
                index: i,
                timestamp: bar.timestamp,
                issue: QualityIssue::HighBelowBody,
            });
        }
        if bar.low > bar.open.min(bar.close) {
            warnings.push(DataQualityWarning {
                index: i,
                timestamp: bar.timestamp,
                issue: QualityIssue::LowAboveBody,
            });
        }
        if bar.volume < 0 {
            warnings.push(DataQualityWarning {
                index: i,
                timestamp: bar.timestamp,
                issue: QualityIssue::NegativeVolume,
            });
        }
        if i > 0 && bar.timestamp <= bars[i - 1].timestamp {
            warnings.push(DataQualityWarning {
                index: i,
                timestamp: bar.timestamp,
                issue: QualityIssue::NonMonotonicTimestamp,
            });
        }
    }
    warnings
}
