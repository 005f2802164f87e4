//! Histogram-based p-values against a permutation null distribution.

use crate::config::Alternative;

/// Empirical p-values of `observed` against a null distribution.
///
/// The tail rule matches the test's sidedness: two-sided compares |value|,
/// upper tail counts null >= observed, lower tail counts null <= observed.
/// A p-value of 0 is impossible by construction: the result is floored at
/// 1 / null.len(), so every returned value lies in [1/n, 1].
///
/// # Panics
///
/// Panics if `null` is empty.
pub fn pval_from_histogram(observed: &[f64], null: &[f64], tail: Alternative) -> Vec<f64> {
    assert!(!null.is_empty(), "null distribution must not be empty");

    let n = null.len() as f64;
    let floor = 1.0 / n;

    observed
        .iter()
        .map(|&obs| {
            let count = match tail {
                Alternative::TwoSided => null.iter().filter(|&&v| v.abs() >= obs.abs()).count(),
                Alternative::Greater => null.iter().filter(|&&v| v >= obs).count(),
                Alternative::Less => null.iter().filter(|&&v| v <= obs).count(),
            };
            (count as f64 / n).max(floor)
        })
        .collect()
}
