//! Shared helpers for integration tests.
#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};

use sentrader::domain::ohlcv::Bar;
use sentrader::domain::signal::SignalIntent;

pub fn base_timestamp() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 15)
        .unwrap()
        .and_hms_opt(10, 0, 0)
        .unwrap()
}

pub fn make_bars(closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar {
                timestamp: base_timestamp() + chrono::Duration::minutes(5 * i as i64),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume: 10_000,
            }
        })
        .collect()
}

pub fn signals_from_ints(ints: &[i8]) -> Vec<SignalIntent> {
    ints.iter()
        .map(|&v| SignalIntent::from_int(v).unwrap())
        .collect()
}

pub fn bars_to_csv(bars: &[Bar]) -> String {
    let mut out = String::from("timestamp,open,high,low,close,volume\n");
    for bar in bars {
        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            bar.timestamp.format("%Y-%m-%d %H:%M:%S"),
            bar.open,
            bar.high,
            bar.low,
            bar.close,
            bar.volume
        ));
    }
    out
}
