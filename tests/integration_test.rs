//! End-to-end pipeline tests: data port -> strategy -> simulator ->
//! metrics -> export.

mod common;

use approx::assert_relative_eq;
use std::fs;
use tempfile::TempDir;

use common::{bars_to_csv, base_timestamp, make_bars, signals_from_ints};
use sentrader::adapters::csv_adapter::CsvAdapter;
use sentrader::adapters::csv_result_adapter::{read_rows, CsvResultAdapter};
use sentrader::domain::metrics::Metrics;
use sentrader::domain::signal::{Direction, SignalIntent};
use sentrader::domain::simulator::{self, PositionState};
use sentrader::domain::strategy::{MaCrossStrategy, SignalStrategy};
use sentrader::ports::data_port::DataPort;
use sentrader::ports::result_port::ResultPort;

fn trending_closes(n: usize) -> Vec<f64> {
    // A flat stretch, a rally, a selloff: enough movement to make a
    // crossover strategy trade both ways.
    (0..n)
        .map(|i| {
            if i < 20 {
                100.0
            } else if i < 40 {
                100.0 + (i - 19) as f64 * 2.0
            } else {
                140.0 - (i - 39) as f64 * 1.5
            }
        })
        .collect()
}

#[test]
fn csv_pipeline_end_to_end() {
    let dir = TempDir::new().unwrap();
    let data_path = dir.path().to_path_buf();
    let bars = make_bars(&trending_closes(60));
    fs::write(data_path.join("BTCUSDT_5m.csv"), bars_to_csv(&bars)).unwrap();

    let data_port = CsvAdapter::new(data_path);
    let fetched = data_port
        .fetch_ohlcv(
            "BTCUSDT",
            "5m",
            "binance",
            base_timestamp(),
            base_timestamp() + chrono::Duration::hours(12),
        )
        .unwrap();
    assert_eq!(fetched.len(), 60);

    let strategy = MaCrossStrategy { fast: 5, slow: 10 };
    let signals = strategy.generate_signals(&fetched);
    let result = simulator::run(&fetched, &signals, 10_000.0, 0.0005).unwrap();
    assert_eq!(result.rows.len(), 60);
    assert!(result.warnings.is_empty());

    // The rally must produce a long entry and the selloff a reversal.
    assert!(result
        .rows
        .iter()
        .any(|r| r.position == PositionState::Long));
    assert!(result
        .rows
        .iter()
        .any(|r| r.position == PositionState::Short));

    let metrics = Metrics::from_rows(&result.rows, 0.02).unwrap();
    assert!(metrics.num_trades >= 1);
    assert!(metrics.winrate >= 0.0 && metrics.winrate <= 1.0);
    assert!(metrics.max_drawdown <= 0.0);
    assert!(metrics.time_in_market > 0.0);

    // Export both artifacts and reload the rows.
    let result_port = CsvResultAdapter::new();
    let rows_path = dir.path().join("backtest_BTCUSDT_5m.csv");
    let metrics_path = dir.path().join("metrics_BTCUSDT_5m.json");
    result_port.write_rows(&result.rows, &rows_path).unwrap();
    result_port.write_metrics(&metrics, &metrics_path).unwrap();

    let reloaded = read_rows(&rows_path).unwrap();
    assert_eq!(reloaded.len(), result.rows.len());
    for (orig, back) in result.rows.iter().zip(&reloaded) {
        assert_eq!(back.bar.timestamp, orig.bar.timestamp);
        assert_eq!(back.position, orig.position);
        assert_eq!(back.trade_price, orig.trade_price);
        assert_relative_eq!(back.equity, orig.equity, max_relative = 1e-9);
        assert_eq!(back.signal.as_int(), orig.signal.as_int());
    }

    // Metrics recomputed from the reloaded rows must agree.
    let metrics_back = Metrics::from_rows(&reloaded, 0.02).unwrap();
    assert_eq!(metrics_back.num_trades, metrics.num_trades);
    assert_relative_eq!(
        metrics_back.total_return,
        metrics.total_return,
        max_relative = 1e-9
    );

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&metrics_path).unwrap()).unwrap();
    assert_eq!(json["num_trades"], metrics.num_trades);
}

#[test]
fn explicit_signal_run_matches_hand_computation() {
    let bars = make_bars(&[100.0, 102.0, 101.0, 105.0, 103.0]);
    let signals = signals_from_ints(&[1, 0, -1, 0, -1]);
    let result = simulator::run(&bars, &signals, 1_000.0, 0.0).unwrap();

    assert_eq!(result.rows[0].signal, SignalIntent::Enter(Direction::Long));
    assert_relative_eq!(result.final_equity(), 1_010.0, max_relative = 1e-12);

    let metrics = Metrics::from_rows(&result.rows, 0.0).unwrap();
    // One closed trade (the long), one open short left uncounted.
    assert_eq!(metrics.num_trades, 1);
    assert_relative_eq!(metrics.winrate, 1.0, max_relative = 1e-12);
}

#[cfg(feature = "sqlite")]
mod sqlite_pipeline {
    use super::*;
    use sentrader::adapters::sqlite_adapter::SqliteAdapter;

    #[test]
    fn sqlite_pipeline_end_to_end() {
        let bars = make_bars(&trending_closes(60));

        let store = SqliteAdapter::in_memory().unwrap();
        store.initialize_schema().unwrap();
        store.insert_bars("BTCUSDT", "5m", "binance", &bars).unwrap();

        let (min, max, count) = store
            .get_data_range("BTCUSDT", "5m", "binance")
            .unwrap()
            .unwrap();
        assert_eq!(count, 60);
        assert_eq!(min, bars[0].timestamp);
        assert_eq!(max, bars[59].timestamp);

        let fetched = store
            .fetch_ohlcv("BTCUSDT", "5m", "binance", min, max)
            .unwrap();
        assert_eq!(fetched, bars);

        let strategy = MaCrossStrategy { fast: 5, slow: 10 };
        let signals = strategy.generate_signals(&fetched);
        let result = simulator::run(&fetched, &signals, 10_000.0, 0.0).unwrap();
        let metrics = Metrics::from_rows(&result.rows, 0.0).unwrap();
        assert!(metrics.num_trades >= 1);
    }
}
