//! Bar-by-bar backtest simulator.
//!
//! The simulator walks bars and signals in lockstep and keeps a single
//! position at a time, sized as 100% of current equity. All transitions
//! execute at the bar's close. A reversal settles the open position and
//! opens the opposite one on the same bar, at the same price. Equity is
//! realized-only: it changes exactly when a position is settled, so the
//! equity column is a step function of closed trades.

use chrono::NaiveDateTime;

use crate::domain::error::SentraderError;
use crate::domain::ohlcv::{scan_quality, Bar, DataQualityWarning};
use crate::domain::signal::{Direction, SignalIntent};

/// Everything a backtest run needs, resolved from config plus CLI overrides.
#[derive(Debug, Clone)]
pub struct BacktestConfig {
    pub symbol: String,
    pub timeframe: String,
    pub provider: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub initial_balance: f64,
    pub fee_rate: f64,
    pub risk_free_rate: f64,
}

/// The simulator's view of the account, between bars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionState {
    Flat,
    Long,
    Short,
}

impl PositionState {
    pub fn as_int(self) -> i8 {
        match self {
            PositionState::Flat => 0,
            PositionState::Long => 1,
            PositionState::Short => -1,
        }
    }

    pub fn from_int(value: i8) -> Option<PositionState> {
        match value {
            0 => Some(PositionState::Flat),
            1 => Some(PositionState::Long),
            -1 => Some(PositionState::Short),
            _ => None,
        }
    }

    fn direction(self) -> Option<Direction> {
        match self {
            PositionState::Flat => None,
            PositionState::Long => Some(Direction::Long),
            PositionState::Short => Some(Direction::Short),
        }
    }
}

impl From<Direction> for PositionState {
    fn from(d: Direction) -> Self {
        match d {
            Direction::Long => PositionState::Long,
            Direction::Short => PositionState::Short,
        }
    }
}

/// One simulated bar: the input bar, the signal that was applied, and the
/// account state after applying it.
#[derive(Debug, Clone, PartialEq)]
pub struct SimRow {
    pub bar: Bar,
    pub signal: SignalIntent,
    pub position: PositionState,
    /// Fill price when the position changed on this bar, `None` otherwise.
    pub trade_price: Option<f64>,
    pub equity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimResult {
    pub rows: Vec<SimRow>,
    pub warnings: Vec<DataQualityWarning>,
}

impl SimResult {
    pub fn final_equity(&self) -> f64 {
        self.rows.last().map_or(0.0, |r| r.equity)
    }
}

/// Run the simulation over a bar series and its same-length signal series.
pub fn run(
    bars: &[Bar],
    signals: &[SignalIntent],
    initial_balance: f64,
    fee_rate: f64,
) -> Result<SimResult, SentraderError> {
    if bars.is_empty() {
        return Err(SentraderError::InvalidInput {
            reason: "empty bar series".into(),
        });
    }
    if bars.len() != signals.len() {
        return Err(SentraderError::InvalidInput {
            reason: format!(
                "bar/signal length mismatch: {} bars, {} signals",
                bars.len(),
                signals.len()
            ),
        });
    }
    // Catches NaN as well as non-positive balances.
    if !(initial_balance > 0.0) || !initial_balance.is_finite() {
        return Err(SentraderError::InvalidInput {
            reason: format!("initial balance must be positive, got {initial_balance}"),
        });
    }
    if !(fee_rate >= 0.0) || !fee_rate.is_finite() {
        return Err(SentraderError::InvalidInput {
            reason: format!("fee rate must be non-negative, got {fee_rate}"),
        });
    }
    for (i, bar) in bars.iter().enumerate() {
        if !bar.has_finite_prices() {
            return Err(SentraderError::InvalidInput {
                reason: format!("non-finite price at bar {i}"),
            });
        }
    }

    let warnings = scan_quality(bars);

    let mut rows = Vec::with_capacity(bars.len());
    let mut position = PositionState::Flat;
    let mut entry_price = 0.0;
    let mut equity = initial_balance;

    for (i, (bar, &signal)) in bars.iter().zip(signals).enumerate() {
        let mut trade_price = None;
        let target = signal.direction().map(PositionState::from);

        if let Some(next) = target {
            if next != position {
                if let Some(open_dir) = position.direction() {
                    equity = settle(entry_price, bar.close, equity, fee_rate, open_dir, i)?;
                }
                position = next;
                entry_price = bar.close;
                trade_price = Some(bar.close);
            }
        }

        rows.push(SimRow {
            bar: bar.clone(),
            signal,
            position,
            trade_price,
            equity,
        });
    }

    Ok(SimResult { rows, warnings })
}

/// Realize a closed trade: percent return on the full equity stake, minus a
/// fee proportional to the traded price move.
fn settle(
    entry: f64,
    exit: f64,
    equity: f64,
    fee_rate: f64,
    direction: Direction,
    index: usize,
) -> Result<f64, SentraderError> {
    if entry == 0.0 {
        return Err(SentraderError::Numeric {
            index,
            reason: "zero entry price".into(),
        });
    }
    let pnl = match direction {
        Direction::Long => (exit - entry) / entry * equity,
        Direction::Short => (entry - exit) / entry * equity,
    };
    let fee = (exit - entry).abs() / entry * fee_rate * equity;
    if !pnl.is_finite() || !fee.is_finite() {
        return Err(SentraderError::Numeric {
            index,
            reason: "non-finite trade settlement".into(),
        });
    }
    let next = equity + pnl - fee;
    if !next.is_finite() {
        return Err(SentraderError::Numeric {
            index,
            reason: "non-finite equity".into(),
        });
    }
    if next <= 0.0 {
        return Err(SentraderError::Numeric {
            index,
            reason: format!("equity depleted ({next})"),
        });
    }
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn make_bars(closes: &[f64]) -> Vec<Bar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Bar {
                timestamp: NaiveDate::from_ymd_opt(2024, 1, 1)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap()
                    + chrono::Duration::minutes(5 * i as i64),
                open: close,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: 1_000,
            })
            .collect()
    }

    fn signals_from_ints(ints: &[i8]) -> Vec<SignalIntent> {
        ints.iter().map(|&v| SignalIntent::from_int(v).unwrap()).collect()
    }

    #[test]
    fn long_then_reversal_settles_on_same_bar() {
        let bars = make_bars(&[100.0, 102.0, 101.0, 105.0, 103.0]);
        let signals = signals_from_ints(&[1, 0, -1, 0, -1]);
        let result = run(&bars, &signals, 1_000.0, 0.0).unwrap();

        // Bar 0: enter long at 100.
        assert_eq!(result.rows[0].position, PositionState::Long);
        assert_eq!(result.rows[0].trade_price, Some(100.0));
        assert!((result.rows[0].equity - 1_000.0).abs() < f64::EPSILON);

        // Bar 1: hold, nothing realized.
        assert_eq!(result.rows[1].position, PositionState::Long);
        assert_eq!(result.rows[1].trade_price, None);
        assert!((result.rows[1].equity - 1_000.0).abs() < f64::EPSILON);

        // Bar 2: reversal at 101. Long settles (+1%), short opens same bar.
        assert_eq!(result.rows[2].position, PositionState::Short);
        assert_eq!(result.rows[2].trade_price, Some(101.0));
        assert!((result.rows[2].equity - 1_010.0).abs() < 1e-9);

        // Bar 4: already short, repeated short signal is a no-op.
        assert_eq!(result.rows[4].position, PositionState::Short);
        assert_eq!(result.rows[4].trade_price, None);
        assert!((result.rows[4].equity - 1_010.0).abs() < 1e-9);
    }

    #[test]
    fn equity_is_a_step_function_of_settlements() {
        let bars = make_bars(&[100.0, 110.0, 120.0, 90.0]);
        let signals = signals_from_ints(&[1, 0, 0, -1]);
        let result = run(&bars, &signals, 1_000.0, 0.0).unwrap();

        // Equity changes only on the reversal bar.
        assert!((result.rows[0].equity - 1_000.0).abs() < f64::EPSILON);
        assert!((result.rows[1].equity - 1_000.0).abs() < f64::EPSILON);
        assert!((result.rows[2].equity - 1_000.0).abs() < f64::EPSILON);
        // Long 100 -> 90 is -10%.
        assert!((result.rows[3].equity - 900.0).abs() < 1e-9);
    }

    #[test]
    fn fees_scale_with_price_move() {
        let bars = make_bars(&[100.0, 110.0]);
        let signals = signals_from_ints(&[1, -1]);
        let result = run(&bars, &signals, 1_000.0, 0.001).unwrap();

        // pnl = 10% of 1000 = 100; fee = 10% * 0.001 * 1000 = 0.1
        assert!((result.final_equity() - 1_099.9).abs() < 1e-9);
    }

    #[test]
    fn compounding_uses_current_equity() {
        let bars = make_bars(&[100.0, 110.0, 121.0]);
        let signals = signals_from_ints(&[1, -1, 1]);
        let result = run(&bars, &signals, 1_000.0, 0.0).unwrap();

        // Long settles at +10% (equity 1100), short settles at -10% of 1100.
        assert!((result.rows[1].equity - 1_100.0).abs() < 1e-9);
        assert!((result.rows[2].equity - 990.0).abs() < 1e-9);
    }

    #[test]
    fn trade_price_set_iff_position_changed() {
        let bars = make_bars(&[100.0, 101.0, 102.0, 103.0, 104.0, 105.0]);
        let signals = signals_from_ints(&[0, 1, 1, 0, -1, 0]);
        let result = run(&bars, &signals, 1_000.0, 0.0).unwrap();

        let mut prev = PositionState::Flat;
        for row in &result.rows {
            if row.position != prev {
                assert_eq!(row.trade_price, Some(row.bar.close));
            } else {
                assert_eq!(row.trade_price, None);
            }
            prev = row.position;
        }
    }

    #[test]
    fn rerun_is_deterministic() {
        let bars = make_bars(&[100.0, 103.0, 99.0, 104.0, 101.0, 98.0]);
        let signals = signals_from_ints(&[1, 0, -1, 1, 0, -1]);
        let a = run(&bars, &signals, 5_000.0, 0.0005).unwrap();
        let b = run(&bars, &signals, 5_000.0, 0.0005).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn hold_and_flat_behave_identically() {
        let bars = make_bars(&[100.0, 102.0, 104.0]);
        let with_flat = vec![
            SignalIntent::Enter(Direction::Long),
            SignalIntent::Flat,
            SignalIntent::Flat,
        ];
        let with_hold = vec![
            SignalIntent::Enter(Direction::Long),
            SignalIntent::Hold,
            SignalIntent::Hold,
        ];
        let a = run(&bars, &with_flat, 1_000.0, 0.0).unwrap();
        let b = run(&bars, &with_hold, 1_000.0, 0.0).unwrap();
        for (ra, rb) in a.rows.iter().zip(&b.rows) {
            assert_eq!(ra.position, rb.position);
            assert_eq!(ra.trade_price, rb.trade_price);
            assert!((ra.equity - rb.equity).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn open_position_is_never_marked_to_market() {
        // A long that never closes leaves equity at the initial balance.
        let bars = make_bars(&[100.0, 200.0, 300.0]);
        let signals = signals_from_ints(&[1, 0, 0]);
        let result = run(&bars, &signals, 1_000.0, 0.0).unwrap();
        assert!((result.final_equity() - 1_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_bars_rejected() {
        let result = run(&[], &[], 1_000.0, 0.0);
        assert!(matches!(result, Err(SentraderError::InvalidInput { .. })));
    }

    #[test]
    fn length_mismatch_rejected() {
        let bars = make_bars(&[100.0, 101.0]);
        let signals = signals_from_ints(&[1]);
        let result = run(&bars, &signals, 1_000.0, 0.0);
        assert!(matches!(result, Err(SentraderError::InvalidInput { .. })));
    }

    #[test]
    fn non_positive_balance_rejected() {
        let bars = make_bars(&[100.0]);
        let signals = signals_from_ints(&[0]);
        for balance in [0.0, -50.0, f64::NAN] {
            let result = run(&bars, &signals, balance, 0.0);
            assert!(matches!(result, Err(SentraderError::InvalidInput { .. })));
        }
    }

    #[test]
    fn negative_fee_rejected() {
        let bars = make_bars(&[100.0]);
        let signals = signals_from_ints(&[0]);
        let result = run(&bars, &signals, 1_000.0, -0.01);
        assert!(matches!(result, Err(SentraderError::InvalidInput { .. })));
    }

    #[test]
    fn non_finite_price_rejected() {
        let mut bars = make_bars(&[100.0, 101.0]);
        bars[1].close = f64::NAN;
        let signals = signals_from_ints(&[1, 0]);
        let result = run(&bars, &signals, 1_000.0, 0.0);
        assert!(matches!(result, Err(SentraderError::InvalidInput { .. })));
    }

    #[test]
    fn zero_entry_price_is_numeric_error() {
        let bars = make_bars(&[0.0, 100.0]);
        let signals = signals_from_ints(&[1, -1]);
        let result = run(&bars, &signals, 1_000.0, 0.0);
        assert!(matches!(
            result,
            Err(SentraderError::Numeric { index: 1, .. })
        ));
    }

    #[test]
    fn equity_depletion_is_numeric_error() {
        // Long from 100 to 0.0001 loses essentially the whole stake; with a
        // fee on top the account goes non-positive.
        let bars = make_bars(&[100.0, 0.0001]);
        let signals = signals_from_ints(&[1, -1]);
        let result = run(&bars, &signals, 1_000.0, 0.01);
        assert!(matches!(result, Err(SentraderError::Numeric { .. })));
    }

    #[test]
    fn quality_warnings_are_carried() {
        let mut bars = make_bars(&[100.0, 101.0]);
        bars[1].volume = -1;
        let signals = signals_from_ints(&[0, 0]);
        let result = run(&bars, &signals, 1_000.0, 0.0).unwrap();
        assert_eq!(result.warnings.len(), 1);
    }
}
