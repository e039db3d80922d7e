//! Signal-producing strategies.

use crate::domain::error::SentraderError;
use crate::domain::indicator::{macd, sma};
use crate::domain::ohlcv::Bar;
use crate::domain::signal::{Direction, SignalIntent};
use crate::ports::config_port::ConfigPort;

/// Maps an OHLCV series to a same-length signal series.
pub trait SignalStrategy {
    fn name(&self) -> &str;
    fn generate_signals(&self, bars: &[Bar]) -> Vec<SignalIntent>;
}

/// Moving-average crossover. Emits `Enter(Long)` on the bar where the fast
/// SMA crosses above the slow SMA, `Enter(Short)` on the cross below, and
/// `Flat` everywhere else. Its zeros carry no positional meaning.
#[derive(Debug, Clone)]
pub struct MaCrossStrategy {
    pub fast: usize,
    pub slow: usize,
}

impl Default for MaCrossStrategy {
    fn default() -> Self {
        MaCrossStrategy { fast: 10, slow: 20 }
    }
}

impl SignalStrategy for MaCrossStrategy {
    fn name(&self) -> &str {
        "ma_cross"
    }

    fn generate_signals(&self, bars: &[Bar]) -> Vec<SignalIntent> {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let fast = sma(&closes, self.fast);
        let slow = sma(&closes, self.slow);

        let mut out = Vec::with_capacity(bars.len());
        let mut prev_above = false;
        for i in 0..bars.len() {
            // NaN warmup compares false, keeping the strategy quiet until
            // both averages are formed.
            let above = fast[i] > slow[i];
            let intent = if i == 0 {
                SignalIntent::Flat
            } else if above && !prev_above {
                SignalIntent::Enter(Direction::Long)
            } else if !above && prev_above {
                SignalIntent::Enter(Direction::Short)
            } else {
                SignalIntent::Flat
            };
            out.push(intent);
            prev_above = above;
        }
        out
    }
}

/// Candle-body + trend + momentum confluence, filtered down to reversal
/// points. Raw signal: long when the bar closes up, above the trend SMA,
/// with positive MACD histogram; short on the mirrored condition. A bar is
/// emitted as `Enter` only when its raw signal is nonzero and differs from
/// the previous bar's raw signal; all other bars are `Hold`, meaning the
/// open position rides until the next reversal.
#[derive(Debug, Clone)]
pub struct ComboStrategy {
    pub ma_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
}

impl Default for ComboStrategy {
    fn default() -> Self {
        ComboStrategy {
            ma_period: 20,
            macd_fast: 5,
            macd_slow: 25,
            macd_signal: 5,
        }
    }
}

impl SignalStrategy for ComboStrategy {
    fn name(&self) -> &str {
        "combo"
    }

    fn generate_signals(&self, bars: &[Bar]) -> Vec<SignalIntent> {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let trend = sma(&closes, self.ma_period);
        let hist = macd(&closes, self.macd_fast, self.macd_slow, self.macd_signal).histogram;

        let raw: Vec<i8> = bars
            .iter()
            .enumerate()
            .map(|(i, bar)| {
                if bar.close > bar.open && bar.close > trend[i] && hist[i] > 0.0 {
                    1
                } else if bar.close < bar.open && bar.close < trend[i] && hist[i] < 0.0 {
                    -1
                } else {
                    0
                }
            })
            .collect();

        raw.iter()
            .enumerate()
            .map(|(i, &r)| {
                let prev = if i == 0 { 0 } else { raw[i - 1] };
                if r != 0 && r != prev {
                    let dir = if r == 1 { Direction::Long } else { Direction::Short };
                    SignalIntent::Enter(dir)
                } else {
                    SignalIntent::Hold
                }
            })
            .collect()
    }
}

/// Build a strategy from `[strategy]` config keys. A name override (from
/// the command line) takes precedence over the config file.
pub fn from_config(
    config: &dyn ConfigPort,
    name_override: Option<&str>,
) -> Result<Box<dyn SignalStrategy>, SentraderError> {
    let name = name_override
        .map(str::to_string)
        .or_else(|| config.get_string("strategy", "name"))
        .unwrap_or_else(|| "combo".to_string());
    match name.as_str() {
        "ma_cross" => Ok(Box::new(MaCrossStrategy {
            fast: config.get_int("strategy", "fast", 10) as usize,
            slow: config.get_int("strategy", "slow", 20) as usize,
        })),
        "combo" => Ok(Box::new(ComboStrategy {
            ma_period: config.get_int("strategy", "ma_period", 20) as usize,
            macd_fast: config.get_int("strategy", "macd_fast", 5) as usize,
            macd_slow: config.get_int("strategy", "macd_slow", 25) as usize,
            macd_signal: config.get_int("strategy", "macd_signal", 5) as usize,
        })),
        other => Err(SentraderError::UnknownStrategy {
            name: other.to_string(),
        }),
    }
}
