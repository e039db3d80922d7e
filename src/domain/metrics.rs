//! Performance metrics over a close-price and signal series.
//!
//! Metrics are computed against a carried-position model, not the
//! simulator's account state: each bar is attributed to the last nonzero
//! signal seen strictly before it, and bar returns compound through an
//! always-fully-invested equity curve. This model marks open positions to
//! market every bar, so the two models agree on closed trades but differ
//! on open ones. Trade-level statistics come from a ledger rebuilt from
//! the signal series alone.

use serde::Serialize;

use crate::domain::error::SentraderError;
use crate::domain::signal::{Direction, SignalIntent};
use crate::domain::simulator::SimRow;

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Position attributed to each bar: the last nonzero signal strictly
/// before it. Bar 0 is always flat.
pub fn carried_positions(signals: &[i8]) -> Vec<i8> {
    let mut out = Vec::with_capacity(signals.len());
    let mut held = 0i8;
    for &s in signals {
        out.push(held);
        if s != 0 {
            held = s;
        }
    }
    out
}

/// Simple bar-over-bar returns. The first return is zero.
pub fn bar_returns(closes: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(closes.len());
    for (i, &c) in closes.iter().enumerate() {
        if i == 0 {
            out.push(0.0);
        } else {
            out.push((c - closes[i - 1]) / closes[i - 1]);
        }
    }
    out
}

/// Total compounded return and the per-bar strategy returns behind it.
pub fn calc_pnl(closes: &[f64], signals: &[i8]) -> (f64, Vec<f64>) {
    let carried = carried_positions(signals);
    let returns = bar_returns(closes);
    let strategy_returns: Vec<f64> = carried
        .iter()
        .zip(&returns)
        .map(|(&p, &r)| p as f64 * r)
        .collect();
    let total: f64 = strategy_returns.iter().map(|r| 1.0 + r).product::<f64>() - 1.0;
    (total, strategy_returns)
}

/// A closed trade reconstructed from the signal series.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerTrade {
    pub direction: Direction,
    pub entry_price: f64,
    pub exit_price: f64,
}

impl LedgerTrade {
    pub fn trade_return(&self) -> f64 {
        match self.direction {
            Direction::Long => (self.exit_price - self.entry_price) / self.entry_price,
            Direction::Short => (self.entry_price - self.exit_price) / self.entry_price,
        }
    }

    pub fn is_win(&self) -> bool {
        self.trade_return() > 0.0
    }
}

/// Rebuild the closed-trade ledger. A nonzero signal opens a position at
/// that bar's close; an opposite nonzero signal closes it and opens the
/// reverse; repeated same-direction signals are ignored. A position still
/// open at the end of the series is not a trade.
pub fn build_trade_ledger(closes: &[f64], signals: &[i8]) -> Vec<LedgerTrade> {
    let mut trades = Vec::new();
    let mut open: Option<(i8, f64)> = None;
    for (&close, &signal) in closes.iter().zip(signals) {
        if signal == 0 {
            continue;
        }
        match open {
            None => open = Some((signal, close)),
            Some((held, entry)) if held != signal => {
                let direction = if held == 1 { Direction::Long } else { Direction::Short };
                trades.push(LedgerTrade {
                    direction,
                    entry_price: entry,
                    exit_price: close,
                });
                open = Some((signal, close));
            }
            Some(_) => {}
        }
    }
    trades
}

/// Fraction of winning trades and the trade count. No trades yields zero.
pub fn winrate(trades: &[LedgerTrade]) -> (f64, usize) {
    let n = trades.len();
    if n == 0 {
        return (0.0, 0);
    }
    let wins = trades.iter().filter(|t| t.is_win()).count();
    (wins as f64 / n as f64, n)
}

/// Deepest peak-to-trough decline of the compounded equity curve. Always
/// non-positive.
pub fn max_drawdown(strategy_returns: &[f64]) -> f64 {
    let mut equity = 1.0;
    let mut peak = 1.0;
    let mut worst = 0.0f64;
    for &r in strategy_returns {
        equity *= 1.0 + r;
        if equity > peak {
            peak = equity;
        }
        worst = worst.min(equity / peak - 1.0);
    }
    worst
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Sample standard deviation (ddof = 1). Fewer than two values yields zero.
fn sample_std(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (n as f64 - 1.0);
    var.sqrt()
}

/// Annualized Sharpe ratio over per-bar excess returns. Degenerate series
/// (too short, or zero dispersion) yields zero.
pub fn sharpe_ratio(strategy_returns: &[f64], risk_free_rate: f64) -> f64 {
    let rf_per_bar = risk_free_rate / TRADING_DAYS_PER_YEAR;
    let excess: Vec<f64> = strategy_returns.iter().map(|r| r - rf_per_bar).collect();
    let std = sample_std(&excess);
    if std == 0.0 {
        return 0.0;
    }
    mean(&excess) / std * TRADING_DAYS_PER_YEAR.sqrt()
}

/// Annualized Sortino ratio: like Sharpe but dispersion is taken over the
/// negative excess returns only.
pub fn sortino_ratio(strategy_returns: &[f64], risk_free_rate: f64) -> f64 {
    let rf_per_bar = risk_free_rate / TRADING_DAYS_PER_YEAR;
    let excess: Vec<f64> = strategy_returns.iter().map(|r| r - rf_per_bar).collect();
    let downside: Vec<f64> = excess.iter().copied().filter(|r| *r < 0.0).collect();
    let std = sample_std(&downside);
    if std == 0.0 {
        return 0.0;
    }
    mean(&excess) / std * TRADING_DAYS_PER_YEAR.sqrt()
}

/// Gross profit over gross loss across bar returns. No losing bars yields
/// positive infinity.
pub fn profit_factor(strategy_returns: &[f64]) -> f64 {
    let gross_profit: f64 = strategy_returns.iter().filter(|r| **r > 0.0).sum();
    let gross_loss: f64 = -strategy_returns.iter().filter(|r| **r < 0.0).sum::<f64>();
    if gross_loss == 0.0 {
        f64::INFINITY
    } else {
        gross_profit / gross_loss
    }
}

/// Mean return of winning trades and of losing trades. Zero-return trades
/// belong to neither average.
pub fn avg_win_loss(trades: &[LedgerTrade]) -> (f64, f64) {
    let wins: Vec<f64> = trades
        .iter()
        .map(LedgerTrade::trade_return)
        .filter(|r| *r > 0.0)
        .collect();
    let losses: Vec<f64> = trades
        .iter()
        .map(LedgerTrade::trade_return)
        .filter(|r| *r < 0.0)
        .collect();
    (mean(&wins), mean(&losses))
}

/// Mean return per trade across the whole ledger. No trades yields zero.
pub fn expectancy(trades: &[LedgerTrade]) -> f64 {
    let returns: Vec<f64> = trades.iter().map(LedgerTrade::trade_return).collect();
    mean(&returns)
}

/// Longest winning and losing streaks in trade order. A zero-return trade
/// counts as a loss.
pub fn max_consecutive(trades: &[LedgerTrade]) -> (usize, usize) {
    let mut max_win = 0usize;
    let mut max_loss = 0usize;
    let mut streak = 0usize;
    let mut streak_is_win = false;
    for trade in trades {
        let win = trade.is_win();
        if streak > 0 && win == streak_is_win {
            streak += 1;
        } else {
            streak = 1;
            streak_is_win = win;
        }
        if win {
            max_win = max_win.max(streak);
        } else {
            max_loss = max_loss.max(streak);
        }
    }
    (max_win, max_loss)
}

/// Geometric annualization of the total return over `n_bars - 1` return
/// observations, at 252 bars per year. One bar or fewer yields zero.
pub fn annualized_return(total_return: f64, n_bars: usize) -> f64 {
    if n_bars <= 1 {
        return 0.0;
    }
    let n_years = (n_bars - 1) as f64 / TRADING_DAYS_PER_YEAR;
    (1.0 + total_return).powf(1.0 / n_years) - 1.0
}

/// Annualized return over drawdown magnitude. Zero drawdown yields
/// positive infinity.
pub fn calmar_ratio(annualized: f64, max_dd: f64) -> f64 {
    if max_dd == 0.0 {
        f64::INFINITY
    } else {
        annualized / max_dd.abs()
    }
}

/// Fraction of bars with a carried position.
pub fn time_in_market(signals: &[i8]) -> f64 {
    if signals.is_empty() {
        return 0.0;
    }
    let carried = carried_positions(signals);
    carried.iter().filter(|p| **p != 0).count() as f64 / signals.len() as f64
}

/// The full metrics report. Non-finite values serialize as JSON null.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metrics {
    pub total_return: f64,
    pub winrate: f64,
    pub num_trades: usize,
    pub max_drawdown: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub profit_factor: f64,
    pub expectancy: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub max_consecutive_win: usize,
    pub max_consecutive_loss: usize,
    pub annualized_return: f64,
    pub calmar_ratio: f64,
    pub time_in_market: f64,
}

impl Metrics {
    /// Compute the full report from a close series and its signal series.
    pub fn compute(
        closes: &[f64],
        signals: &[SignalIntent],
        risk_free_rate: f64,
    ) -> Result<Metrics, SentraderError> {
        if closes.is_empty() {
            return Err(SentraderError::InvalidInput {
                reason: "empty close series".into(),
            });
        }
        if closes.len() != signals.len() {
            return Err(SentraderError::InvalidInput {
                reason: format!(
                    "close/signal length mismatch: {} closes, {} signals",
                    closes.len(),
                    signals.len()
                ),
            });
        }
        for (i, &c) in closes.iter().enumerate() {
            if !c.is_finite() {
                return Err(SentraderError::InvalidInput {
                    reason: format!("non-finite close at bar {i}"),
                });
            }
        }

        let ints: Vec<i8> = signals.iter().map(|s| s.as_int()).collect();
        let (total_return, strategy_returns) = calc_pnl(closes, &ints);
        for (i, r) in strategy_returns.iter().enumerate() {
            if !r.is_finite() {
                return Err(SentraderError::Numeric {
                    index: i,
                    reason: "non-finite bar return".into(),
                });
            }
        }

        let trades = build_trade_ledger(closes, &ints);
        let (winrate, num_trades) = winrate(&trades);
        let (avg_win, avg_loss) = avg_win_loss(&trades);
        let (max_consecutive_win, max_consecutive_loss) = max_consecutive(&trades);
        let max_dd = max_drawdown(&strategy_returns);
        let annualized = annualized_return(total_return, closes.len());

        Ok(Metrics {
            total_return,
            winrate,
            num_trades,
            max_drawdown: max_dd,
            sharpe_ratio: sharpe_ratio(&strategy_returns, risk_free_rate),
            sortino_ratio: sortino_ratio(&strategy_returns, risk_free_rate),
            profit_factor: profit_factor(&strategy_returns),
            expectancy: expectancy(&trades),
            avg_win,
            avg_loss,
            max_consecutive_win,
            max_consecutive_loss,
            annualized_return: annualized,
            calmar_ratio: calmar_ratio(annualized, max_dd),
            time_in_market: time_in_market(&ints),
        })
    }

    /// Compute from simulated rows, using each row's close and signal.
    pub fn from_rows(rows: &[SimRow], risk_free_rate: f64) -> Result<Metrics, SentraderError> {
        let closes: Vec<f64> = rows.iter().map(|r| r.bar.close).collect();
        let signals: Vec<SignalIntent> = rows.iter().map(|r| r.signal).collect();
        Metrics::compute(&closes, &signals, risk_free_rate)
    }
}
