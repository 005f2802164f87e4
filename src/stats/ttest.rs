//! Vectorized two-sample and paired t-tests.
//!
//! Both tests operate on an (elements x subjects) view and compute every
//! element simultaneously. Elements with zero variance are defined to have
//! t = 0, p = 1 rather than propagating a division by zero; outputs never
//! contain NaN.

use ndarray::{Array1, ArrayView2, Axis};
use statrs::distribution::{ContinuousCDF, StudentsT};

use crate::config::Alternative;
use crate::error::PermvoxError;

/// Elementwise t statistics with their p-values.
#[derive(Debug, Clone)]
pub struct TtestMaps {
    /// Per-element t statistic.
    pub t: Array1<f64>,
    /// Per-element p-value under the configured alternative.
    pub p: Array1<f64>,
}

/// Convert a t statistic to a p-value under the given alternative.
///
/// `dist` must be a standard Student-t distribution with the test's degrees
/// of freedom. Results are clamped to [0, 1] against floating-point drift.
pub(super) fn t_pvalue(t: f64, dist: &StudentsT, alternative: Alternative) -> f64 {
    let p = match alternative {
        Alternative::TwoSided => 2.0 * (1.0 - dist.cdf(t.abs())),
        Alternative::Greater => 1.0 - dist.cdf(t),
        Alternative::Less => dist.cdf(t),
    };
    p.clamp(0.0, 1.0)
}

/// Build the Student-t distribution for `df` degrees of freedom.
///
/// Callers validate subject counts first, so `df` is always positive here.
pub(super) fn student_t(df: f64) -> StudentsT {
    StudentsT::new(0.0, 1.0, df).expect("degrees of freedom are validated positive")
}

/// Independent two-sample t statistic per element (no p-values).
///
/// The first `n_a` columns of `data` are group A, the remainder group B.
/// Uses the pooled-variance estimator with n - 2 degrees of freedom.
/// Elements whose pooled standard error is zero get t = 0.
///
/// This is the hot-loop entry point: the permutation orchestrator calls it
/// once per permutation and only needs the statistic, not p-values.
///
/// # Errors
///
/// [`PermvoxError::InvalidArgument`] when either group has fewer than two
/// members.
pub fn ttest_ind_stat(
    data: ArrayView2<'_, f64>,
    n_a: usize,
) -> Result<Array1<f64>, PermvoxError> {
    let n_total = data.ncols();
    let n_b = n_total.saturating_sub(n_a);
    if n_a < 2 || n_b < 2 {
        return Err(PermvoxError::invalid(
            "n_a",
            format!("each group needs at least 2 subjects, got {n_a} and {n_b}"),
        ));
    }

    let na = n_a as f64;
    let nb = n_b as f64;
    let df = na + nb - 2.0;
    let norm = (1.0 / na + 1.0 / nb).sqrt();

    let mut t = Array1::zeros(data.nrows());
    for (row, out) in data.axis_iter(Axis(0)).zip(t.iter_mut()) {
        let (a, b) = row.split_at(Axis(0), n_a);

        let mean_a = a.sum() / na;
        let mean_b = b.sum() / nb;
        let ss_a: f64 = a.iter().map(|x| (x - mean_a).powi(2)).sum();
        let ss_b: f64 = b.iter().map(|x| (x - mean_b).powi(2)).sum();

        let pooled = ((ss_a + ss_b) / df).sqrt();
        let se = pooled * norm;
        if se > 0.0 {
            *out = (mean_a - mean_b) / se;
        }
    }
    Ok(t)
}

/// Independent two-sample t-test per element.
///
/// See [`ttest_ind_stat`] for the statistic; this adds p-values under
/// `alternative`. Zero-variance elements report t = 0, p = 1.
///
/// # Errors
///
/// [`PermvoxError::InvalidArgument`] when either group has fewer than two
/// members.
pub fn ttest_ind(
    data: ArrayView2<'_, f64>,
    n_a: usize,
    alternative: Alternative,
) -> Result<TtestMaps, PermvoxError> {
    let t = ttest_ind_stat(data, n_a)?;
    let df = (data.ncols() - 2) as f64;
    let dist = student_t(df);
    let p = t.mapv(|ti| t_pvalue(ti, &dist, alternative));
    Ok(TtestMaps { t, p })
}

/// Paired t statistic per element (no p-values).
///
/// Columns `0..n_pairs` are paired one-to-one with columns
/// `n_pairs..2 * n_pairs`; the statistic is the one-sample t of the paired
/// differences with n_pairs - 1 degrees of freedom. Elements whose paired
/// differences have zero variance get t = 0.
///
/// # Errors
///
/// [`PermvoxError::InvalidArgument`] when `data` does not hold exactly
/// `2 * n_pairs` columns, or when there are fewer than two pairs.
pub fn ttest_rel_stat(
    data: ArrayView2<'_, f64>,
    n_pairs: usize,
) -> Result<Array1<f64>, PermvoxError> {
    if n_pairs < 2 {
        return Err(PermvoxError::invalid(
            "n_pairs",
            format!("paired test needs at least 2 pairs, got {n_pairs}"),
        ));
    }
    if data.ncols() != 2 * n_pairs {
        return Err(PermvoxError::invalid(
            "n_pairs",
            format!(
                "paired test needs equal halves: expected {} columns, got {}",
                2 * n_pairs,
                data.ncols()
            ),
        ));
    }

    let n = n_pairs as f64;
    let mut t = Array1::zeros(data.nrows());
    for (row, out) in data.axis_iter(Axis(0)).zip(t.iter_mut()) {
        let mean_d: f64 = (0..n_pairs).map(|j| row[j] - row[n_pairs + j]).sum::<f64>() / n;
        let ss_d: f64 = (0..n_pairs)
            .map(|j| {
                let d = row[j] - row[n_pairs + j];
                (d - mean_d).powi(2)
            })
            .sum();

        let se = (ss_d / (n - 1.0)).sqrt() / n.sqrt();
        if se > 0.0 {
            *out = mean_d / se;
        }
    }
    Ok(t)
}

/// Paired t-test per element.
///
/// See [`ttest_rel_stat`] for the statistic; this adds p-values under
/// `alternative`. Zero-variance elements report t = 0, p = 1.
///
/// # Errors
///
/// [`PermvoxError::InvalidArgument`] on unequal halves or fewer than two
/// pairs.
pub fn ttest_rel(
    data: ArrayView2<'_, f64>,
    n_pairs: usize,
    alternative: Alternative,
) -> Result<TtestMaps, PermvoxError> {
    let t = ttest_rel_stat(data, n_pairs)?;
    let dist = student_t((n_pairs - 1) as f64);
    let p = t.mapv(|ti| t_pvalue(ti, &dist, alternative));
    Ok(TtestMaps { t, p })
}
