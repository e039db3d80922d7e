//! Backtest result output port trait.

use std::path::Path;

use crate::domain::error::SentraderError;
use crate::domain::metrics::Metrics;
use crate::domain::simulator::SimRow;

pub trait ResultPort {
    /// Persist the per-bar simulation rows.
    fn write_rows(&self, rows: &[SimRow], path: &Path) -> Result<(), SentraderError>;

    /// Persist the metrics report.
    fn write_metrics(&self, metrics: &Metrics, path: &Path) -> Result<(), SentraderError>;
}
