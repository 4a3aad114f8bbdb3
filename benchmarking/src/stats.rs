// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Small statistics over run times.

use itertools::Itertools;

/// Median of `values`, or `None` if there are none. NaNs are not expected.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let sorted = values
        .iter()
        .copied()
        .sorted_by(|a, b| a.total_cmp(b))
        .collect::<Vec<_>>();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(sorted[mid])
    } else {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    }
}

/// The largest distance from `center` to any value, so that every value lies
/// within `center ± deviation`.
pub fn max_deviation(values: &[f64], center: f64) -> f64 {
    values
        .iter()
        .map(|v| (v - center).abs())
        .fold(0.0, f64::max)
}

/// Harmonic mean `n / Σ 1/xᵢ`. Only defined for a non-empty list of positive
/// values.
pub fn harmonic_mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() || values.iter().any(|v| v.is_nan() || *v <= 0.0) {
        return None;
    }
    let reciprocal_sum: f64 = values.iter().map(|v| 1.0 / v).sum();
    Some(values.len() as f64 / reciprocal_sum)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn median_of_odd_and_even() {
        assert_eq!(median(&[]), None);
        assert_eq!(median(&[3.0]), Some(3.0));
        assert_eq!(median(&[5.0, 1.0, 3.0]), Some(3.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
    }

    #[test]
    fn deviation_covers_every_value() {
        let values = [1.0, 1.5, 4.0];
        let m = median(&values).unwrap();
        let d = max_deviation(&values, m);
        assert!(close(d, 2.5));
        assert!(values.iter().all(|v| (v - m).abs() <= d));
        assert_eq!(max_deviation(&[], 1.0), 0.0);
    }

    #[test]
    fn harmonic_mean_of_ratios() {
        // 3 / (1 + 1/2 + 1/4)
        assert!(close(harmonic_mean(&[1.0, 2.0, 4.0]).unwrap(), 3.0 / 1.75));
        assert!(close(harmonic_mean(&[0.5, 0.5]).unwrap(), 0.5));
        // dominated by the smallest ratio
        assert!(harmonic_mean(&[0.1, 10.0]).unwrap() < 1.0);
    }

    #[test]
    fn harmonic_mean_undefined() {
        assert_eq!(harmonic_mean(&[]), None);
        assert_eq!(harmonic_mean(&[1.0, 0.0]), None);
        assert_eq!(harmonic_mean(&[1.0, -2.0]), None);
        assert_eq!(harmonic_mean(&[f64::NAN]), None);
    }
}
