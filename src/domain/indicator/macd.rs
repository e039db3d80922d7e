//! MACD (Moving Average Convergence Divergence).
//!
//! Line = EMA(fast) - EMA(slow)
//! Signal = EMA(line, signal_span)
//! Histogram = Line - Signal

use super::ema::ema;

#[derive(Debug, Clone, PartialEq)]
pub struct MacdOutput {
    pub line: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

pub fn macd(values: &[f64], fast: usize, slow: usize, signal_span: usize) -> MacdOutput {
    let ema_fast = ema(values, fast);
    let ema_slow = ema(values, slow);
    let line: Vec<f64> = ema_fast
        .iter()
        .zip(&ema_slow)
        .map(|(f, s)| f - s)
        .collect();
    let signal = ema(&line, signal_span);
    let histogram: Vec<f64> = line.iter().zip(&signal).map(|(l, s)| l - s).collect();
    MacdOutput {
        line,
        signal,
        histogram,
    }
}
