//! Core domain types and logic.

pub mod ohlcv;
pub mod signal;
pub mod indicator;
pub mod strategy;
pub mod simulator;
pub mod metrics;
pub mod error;
