//! Exponential moving average.

/// Exponentially weighted mean with `alpha = 2 / (span + 1)`, seeded at the
/// first value. Recursive form (no adjustment weighting), so there is no
/// warmup `NaN` region.
pub fn ema(values: &[f64], span: usize) -> Vec<f64> {
    if span == 0 {
        return vec![f64::NAN; values.len()];
    }
    let Some(&first) = values.first() else {
        return Vec::new();
    };
    let alpha = 2.0 / (span as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut prev = first;
    out.push(prev);
    for &v in &values[1..] {
        prev = alpha * v + (1.0 - alpha) * prev;
        out.push(prev);
    }
    out
}
