//! Technical indicators.
//!
//! All indicators are pure functions over a close-price slice and return a
//! series of the same length. Warmup bars are `NaN`; comparisons against
//! `NaN` are false, which signal producers rely on to stay quiet until an
//! indicator is fully formed.

pub mod sma;
pub mod ema;
pub mod macd;

pub use ema::ema;
pub use macd::{macd, MacdOutput};
pub use sma::sma;
