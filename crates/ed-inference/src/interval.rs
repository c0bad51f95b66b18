//! Empirical quantiles and central credible intervals.

use ed_core::{Error, Result};

/// Quantile of sorted data by linear interpolation between order statistics.
///
/// - `q=0` returns min
/// - `q=1` returns max
/// - empty input returns `NaN`
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    match sorted {
        [] => f64::NAN,
        [only] => *only,
        _ => {
            let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            let t = pos - lo as f64;
            if lo == hi { sorted[lo] } else { sorted[lo] + t * (sorted[hi] - sorted[lo]) }
        }
    }
}

/// Sorted copy of `draws`.
pub fn sorted(draws: &[f64]) -> Vec<f64> {
    let mut v = draws.to_vec();
    v.sort_by(f64::total_cmp);
    v
}

/// Reject credible levels outside the open unit interval.
pub fn validate_level(level: f64) -> Result<()> {
    if !(level.is_finite() && level > 0.0 && level < 1.0) {
        return Err(Error::Validation(format!("credible level must be in (0,1), got {level}")));
    }
    Ok(())
}

/// Central credible interval at `level` from already sorted draws.
pub fn central_interval_sorted(sorted: &[f64], level: f64) -> (f64, f64) {
    let tail = (1.0 - level) / 2.0;
    (quantile_sorted(sorted, tail), quantile_sorted(sorted, 1.0 - tail))
}

/// Central credible interval at `level`.
pub fn central_interval(draws: &[f64], level: f64) -> Result<(f64, f64)> {
    validate_level(level)?;
    if draws.is_empty() {
        return Err(Error::Aggregation("cannot form an interval from zero draws".to_string()));
    }
    Ok(central_interval_sorted(&sorted(draws), level))
}
