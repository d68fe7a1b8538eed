//! Small numeric helpers shared by the detectors
//!
//! Every helper is total: empty input or a zero denominator yields 0.0, overflow
//! saturates at the largest finite value, and NaN never comes back out.

use serde::{Deserialize, Serialize};

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let total = values.iter().sum::<f64>();
    if total.is_finite() {
        return total / n;
    }
    // sum overflowed: divide first
    saturate(values.iter().map(|v| v / n).sum())
}

/// Population standard deviation (0.0 for fewer than two values)
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let direct = population_std_dev(values);
    if direct.is_finite() {
        return direct;
    }

    // squares overflowed: rescale into [-1, 1] and scale the result back
    let scale = values.iter().fold(0.0f64, |m, v| m.max(v.abs()));
    if scale == 0.0 || !scale.is_finite() {
        return 0.0;
    }
    let scaled: Vec<f64> = values.iter().map(|v| v / scale).collect();
    saturate(population_std_dev(&scaled) * scale)
}

fn population_std_dev(values: &[f64]) -> f64 {
    let avg = mean(values);
    let variance = values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Sum that saturates instead of overflowing to infinity
pub fn sum(values: impl IntoIterator<Item = f64>) -> f64 {
    saturate(values.into_iter().sum())
}

/// std_dev / mean, 0.0 when the mean is zero
pub fn coefficient_of_variation(values: &[f64]) -> f64 {
    let avg = mean(values);
    if avg == 0.0 {
        return 0.0;
    }
    safe_div(std_dev(values), avg)
}

/// Divide; a zero denominator or NaN gives 0.0, overflow saturates
pub fn safe_div(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        return 0.0;
    }
    saturate(numerator / denominator)
}

/// NaN to 0.0, ±infinity to the largest finite value of that sign
pub fn saturate(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(f64::MIN, f64::MAX)
    }
}

pub fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Clamp into [0, 1]; +infinity saturates to 1.0, NaN to 0.0
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

/// Successive differences of a sequence
pub fn deltas(values: &[f64]) -> Vec<f64> {
    values.windows(2).map(|w| saturate(w[1] - w[0])).collect()
}

/// Historical range a raw metric is rescaled against
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricRange {
    pub min: f64,
    pub max: f64,
}

impl MetricRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub const fn up_to(max: f64) -> Self {
        Self { min: 0.0, max }
    }

    /// Linear rescale into [0, 1]; a degenerate range maps to 0.0
    ///
    /// Monotonic in `raw`: values past either end of the range clamp to that end.
    pub fn normalize(&self, raw: f64) -> f64 {
        let span = self.max - self.min;
        if span <= 0.0 || !span.is_finite() {
            return 0.0;
        }
        clamp_unit((raw - self.min) / span)
    }
}
