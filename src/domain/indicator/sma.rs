//! Simple moving average.

/// Rolling mean over `period` values. The first `period - 1` outputs are
/// `NaN` (not enough history).
pub fn sma(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 {
        return vec![f64::NAN; values.len()];
    }
    let mut out = Vec::with_capacity(values.len());
    let mut sum = 0.0;
    for (i, &v) in values.iter().enumerate() {
        sum += v;
        if i >= period {
            sum -= values[i - period];
        }
        if i + 1 >= period {
            out.push(sum / period as f64);
        } else {
            out.push(f64::NAN);
        }
    }
    out
}
