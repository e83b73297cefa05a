use crate::analyzers::types::Summary;

/// Computes the arithmetic mean of a slice of values. Returns `None` for empty input.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Computes the population standard deviation given a pre-computed mean.
/// Returns 0.0 for empty input.
pub fn stddev(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;

    variance.sqrt()
}

/// Mean, standard deviation and range of the values, `None` when empty.
pub fn summarize(values: &[f64]) -> Option<Summary> {
    let mean = mean(values)?;
    Some(Summary {
        mean,
        stddev: stddev(values, mean),
        min: values.iter().copied().fold(f64::INFINITY, f64::min),
        max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    })
}

/// `part` as a percentage of `total`; 0 when `total` is 0.
pub fn pct(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    part as f64 / total as f64 * 100.0
}

pub fn clamp_unit(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

/// Share of `score` an objective of the given weight is worth, rounded half
/// away from zero to whole points.
///
/// The weight is read as a percentage and the product is settled to nine
/// decimals before rounding, so `90 × 0.35` gives 32 rather than the 31 a
/// plain `(90.0 * 0.35).round()` yields.
pub fn apportion_points(score: f64, weight: f64) -> f64 {
    let percent = (weight * 100.0 * 1e6).round() / 1e6;
    let points = score * percent / 100.0;
    ((points * 1e9).round() / 1e9).round()
}
