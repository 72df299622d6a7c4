//! Series Operations
//!
//! Trailing-window aggregation, time-aligned shifting, forward fill, and the
//! bounded-horizon differencing used to measure how far a signal has moved
//! since its last trustworthy sample. NaN marks missing data throughout; all
//! operations tolerate it and propagate it instead of failing.

/// Trailing rolling maximum.
///
/// The window at sample `t` covers the `window` samples ending at `t` (fewer
/// near the start of the series). The result is NaN unless the window holds
/// at least `min_periods` non-NaN values; NaN samples are excluded from the
/// aggregation itself.
pub fn rolling_max(values: &[f64], window: usize, min_periods: usize) -> Vec<f64> {
    rolling(values, window, min_periods, f64::max)
}

/// Trailing rolling minimum. Same window semantics as [`rolling_max`].
pub fn rolling_min(values: &[f64], window: usize, min_periods: usize) -> Vec<f64> {
    rolling(values, window, min_periods, f64::min)
}

fn rolling(
    values: &[f64],
    window: usize,
    min_periods: usize,
    fold: fn(f64, f64) -> f64,
) -> Vec<f64> {
    let n = values.len();
    if window == 0 {
        return vec![f64::NAN; n];
    }
    let required = min_periods.max(1);
    let mut out = vec![f64::NAN; n];
    for t in 0..n {
        let start = (t + 1).saturating_sub(window);
        let mut acc = f64::NAN;
        let mut count = 0usize;
        for &v in &values[start..=t] {
            if v.is_finite() {
                acc = if count == 0 { v } else { fold(acc, v) };
                count += 1;
            }
        }
        if count >= required {
            out[t] = acc;
        }
    }
    out
}

/// Time-aligned shift: `periods > 0` lags the series, `periods < 0` leads it.
/// Vacated boundary samples are NaN.
pub fn shift(values: &[f64], periods: isize) -> Vec<f64> {
    let n = values.len() as isize;
    (0..n)
        .map(|t| {
            let source = t - periods;
            if source >= 0 && source < n {
                values[source as usize]
            } else {
                f64::NAN
            }
        })
        .collect()
}

/// Propagate the last finite value over trailing NaN samples, in place.
/// Leading NaN samples are left untouched.
pub fn forward_fill(values: &mut [f64]) {
    let mut last = f64::NAN;
    for v in values.iter_mut() {
        if v.is_finite() {
            last = *v;
        } else if last.is_finite() {
            *v = last;
        }
    }
}

/// Result of [`bounded_diff`]: the validity-gated signal, its last
/// trustworthy value, and the movement between the two.
#[derive(Debug, Clone)]
pub struct BoundedDiff {
    /// `values[t]` where `valid[t]` holds and the sample is finite, else NaN.
    pub current: Vec<f64>,
    /// Value of the most recent valid sample strictly before `t`, at most
    /// `max_gap` samples ago; NaN when no such sample exists.
    pub previous: Vec<f64>,
    /// `current - previous`, NaN whenever either side is NaN.
    pub delta: Vec<f64>,
}

/// Difference each sample against the last valid sample within a bounded
/// horizon.
///
/// For every `t` the reference is the greatest `t' < t` with `valid[t']`
/// true, a finite value, and `t - t' <= max_gap` samples. Invalid stretches
/// longer than the horizon yield the NaN "no comparison" sentinel.
pub fn bounded_diff(values: &[f64], valid: &[bool], max_gap: usize) -> BoundedDiff {
    debug_assert_eq!(values.len(), valid.len());
    let n = values.len();
    let mut current = vec![f64::NAN; n];
    let mut previous = vec![f64::NAN; n];
    let mut delta = vec![f64::NAN; n];
    let mut last_valid: Option<usize> = None;
    for t in 0..n {
        if let Some(j) = last_valid {
            if t - j <= max_gap {
                previous[t] = values[j];
            }
        }
        if valid[t] && values[t].is_finite() {
            current[t] = values[t];
            last_valid = Some(t);
        }
        delta[t] = current[t] - previous[t];
    }
    BoundedDiff {
        current,
        previous,
        delta,
    }
}
