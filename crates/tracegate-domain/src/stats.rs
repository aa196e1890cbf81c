//! Statistics primitives.
//!
//! All reductions reject NaN/infinite inputs instead of propagating them.
//! Negative values are legal here (bootstrap deltas are signed); sample
//! admission rejects negative measurements before anything reaches this
//! module.

use crate::DomainError;

fn ensure_finite(values: &[f64]) -> Result<(), DomainError> {
    if values.iter().any(|v| !v.is_finite()) {
        return Err(DomainError::InvalidInput);
    }
    Ok(())
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut v = values.to_vec();
    v.sort_unstable_by(|a, b| a.total_cmp(b));
    v
}

/// Median with linear interpolation for even-length samples.
pub fn median(values: &[f64]) -> Result<f64, DomainError> {
    if values.is_empty() {
        return Err(DomainError::EmptySample);
    }
    ensure_finite(values)?;
    Ok(median_sorted(&sorted(values)))
}

pub(crate) fn median_sorted(sorted: &[f64]) -> f64 {
    debug_assert!(!sorted.is_empty());
    let n = sorted.len();
    let mid = n / 2;
    if n % 2 == 1 {
        sorted[mid]
    } else {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    }
}

/// Percentile by linear interpolation between the two nearest ranks
/// (Hyndman & Fan type 7, the numpy default).
pub fn percentile(values: &[f64], q: f64) -> Result<f64, DomainError> {
    if values.is_empty() {
        return Err(DomainError::EmptySample);
    }
    if !(0.0..=1.0).contains(&q) {
        return Err(DomainError::InvalidQuantile(q));
    }
    ensure_finite(values)?;
    Ok(percentile_sorted(&sorted(values), q))
}

pub(crate) fn percentile_sorted(sorted: &[f64], q: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let h = (n - 1) as f64 * q;
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
    }
}

/// Median absolute deviation from the sample median.
pub fn mad(values: &[f64]) -> Result<f64, DomainError> {
    let m = median(values)?;
    let deviations: Vec<f64> = values.iter().map(|v| (v - m).abs()).collect();
    median(&deviations)
}

pub fn mean(values: &[f64]) -> Result<f64, DomainError> {
    if values.is_empty() {
        return Err(DomainError::EmptySample);
    }
    ensure_finite(values)?;
    Ok(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (unbiased, n-1 denominator).
pub fn std_dev(values: &[f64]) -> Result<f64, DomainError> {
    if values.len() < 2 {
        return Err(DomainError::InsufficientSamples);
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    Ok((ss / (values.len() - 1) as f64).sqrt())
}

/// Coefficient of variation as a percentage.
pub fn cv_pct(values: &[f64]) -> Result<f64, DomainError> {
    let m = mean(values)?;
    if m == 0.0 {
        return Err(DomainError::UndefinedCv);
    }
    Ok(std_dev(values)? / m * 100.0)
}

/// Count of Tukey outliers: points outside [Q1 - 1.5 IQR, Q3 + 1.5 IQR].
pub fn iqr_outlier_count(values: &[f64]) -> Result<usize, DomainError> {
    if values.is_empty() {
        return Err(DomainError::EmptySample);
    }
    ensure_finite(values)?;
    let s = sorted(values);
    let q1 = percentile_sorted(&s, 0.25);
    let q3 = percentile_sorted(&s, 0.75);
    let iqr = q3 - q1;
    let lo = q1 - 1.5 * iqr;
    let hi = q3 + 1.5 * iqr;
    Ok(s.iter().filter(|&&v| v < lo || v > hi).count())
}
