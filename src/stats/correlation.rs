//! Elementwise Pearson/Spearman correlation against an effect vector.
//!
//! Correlations are computed for every element simultaneously against a
//! per-subject effect vector, with significance from the Fisher-style
//! t-approximation t = r * sqrt((n - 2) / (1 - r^2)). Elements with zero
//! variance across subjects are masked out by policy (r = 0, p = 1) instead
//! of producing NaN.

use std::fmt;
use std::str::FromStr;

use ndarray::{Array1, Array2, Array3, ArrayView2, ArrayView4, Axis};

use crate::config::Alternative;
use crate::error::PermvoxError;

use super::ttest::{student_t, t_pvalue};

/// Correlation estimator family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrelationKind {
    /// Product-moment correlation on raw values (optionally weighted).
    Pearson,
    /// Rank correlation: Pearson on tie-averaged ranks.
    Spearman,
}

impl CorrelationKind {
    /// Canonical configuration-surface spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            CorrelationKind::Pearson => "pearson",
            CorrelationKind::Spearman => "spearman",
        }
    }
}

impl FromStr for CorrelationKind {
    type Err = PermvoxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pearson" => Ok(CorrelationKind::Pearson),
            "spearman" => Ok(CorrelationKind::Spearman),
            other => Err(PermvoxError::invalid(
                "correlation_type",
                format!("unknown correlation type `{other}`, expected pearson or spearman"),
            )),
        }
    }
}

impl fmt::Display for CorrelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Elementwise correlation output.
#[derive(Debug, Clone)]
pub struct CorrelationMaps {
    /// Correlation coefficient per element (0 where invalid).
    pub r: Array1<f64>,
    /// Transformed t statistic per element (0 where invalid).
    pub t: Array1<f64>,
    /// P-value per element (1 where invalid).
    pub p: Array1<f64>,
    /// True where the element had non-zero variance across subjects.
    pub valid: Array1<bool>,
}

/// Voxelwise correlation output in the spatial shape of the input stack.
#[derive(Debug, Clone)]
pub struct VoxelwiseCorrelation {
    /// Correlation coefficient volume.
    pub r: Array3<f64>,
    /// Transformed t statistic volume.
    pub t: Array3<f64>,
    /// P-value volume.
    pub p: Array3<f64>,
    /// Validity mask: true where the voxel had non-zero variance.
    pub valid: Array3<bool>,
}

/// Tie-averaged 1-based ranks of `values`.
///
/// Equal values receive the average of the ranks they span, the standard
/// Spearman treatment of ties.
pub fn rank_with_ties(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; n];
    let mut i = 0;
    while i < n {
        let mut j = i + 1;
        while j < n && values[order[j]] == values[order[i]] {
            j += 1;
        }
        // Ranks are 1-based; a run of ties spans ranks i+1 ..= j.
        let avg = (i + 1 + j) as f64 / 2.0;
        for &k in &order[i..j] {
            ranks[k] = avg;
        }
        i = j;
    }
    ranks
}

fn validate_inputs(
    n_subjects: usize,
    effect: &[f64],
    kind: CorrelationKind,
    weights: Option<&[f64]>,
) -> Result<(), PermvoxError> {
    if effect.len() != n_subjects {
        return Err(PermvoxError::invalid(
            "effect",
            format!(
                "effect vector length {} does not match subject count {}",
                effect.len(),
                n_subjects
            ),
        ));
    }
    if n_subjects < 3 {
        return Err(PermvoxError::invalid(
            "effect",
            format!("correlation needs at least 3 subjects, got {n_subjects}"),
        ));
    }
    if let Some(w) = weights {
        if kind != CorrelationKind::Pearson {
            return Err(PermvoxError::invalid(
                "weights",
                "subject weights are only supported with pearson",
            ));
        }
        if w.len() != n_subjects {
            return Err(PermvoxError::invalid(
                "weights",
                format!(
                    "weights length {} does not match subject count {}",
                    w.len(),
                    n_subjects
                ),
            ));
        }
    }
    Ok(())
}

/// Weighted Pearson r of one element row against the effect vector.
///
/// Unweighted correlation is the `weights = 1` special case. Returns `None`
/// when either side has zero (weighted) variance.
fn weighted_pearson(row: &[f64], effect: &[f64], weights: &[f64]) -> Option<f64> {
    let w_sum: f64 = weights.iter().sum();
    if w_sum <= 0.0 {
        return None;
    }

    let mut mean_x = 0.0;
    let mut mean_e = 0.0;
    for ((x, e), w) in row.iter().zip(effect).zip(weights) {
        mean_x += w * x;
        mean_e += w * e;
    }
    mean_x /= w_sum;
    mean_e /= w_sum;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_e = 0.0;
    for ((x, e), w) in row.iter().zip(effect).zip(weights) {
        let dx = x - mean_x;
        let de = e - mean_e;
        cov += w * dx * de;
        var_x += w * dx * dx;
        var_e += w * de * de;
    }

    if var_x <= 0.0 || var_e <= 0.0 {
        return None;
    }
    Some(cov / (var_x * var_e).sqrt())
}

/// Core elementwise correlation shared by the full and stat-only entry points.
///
/// Returns (r, valid) per element. Handles Spearman ranking; `assume_ranked`
/// skips re-ranking of the element array when the caller already holds ranks
/// (the effect vector is always ranked under Spearman; ranking is idempotent
/// on rank-valued input, so permuted rank vectors pass through unchanged).
fn correlation_core(
    data: ArrayView2<'_, f64>,
    effect: &[f64],
    kind: CorrelationKind,
    weights: Option<&[f64]>,
    assume_ranked: bool,
) -> Result<(Array1<f64>, Array1<bool>), PermvoxError> {
    validate_inputs(data.ncols(), effect, kind, weights)?;

    let ranked_effect;
    let effect = match kind {
        CorrelationKind::Pearson => effect,
        CorrelationKind::Spearman => {
            ranked_effect = rank_with_ties(effect);
            ranked_effect.as_slice()
        }
    };

    let ranked_data;
    let data = match kind {
        CorrelationKind::Spearman if !assume_ranked => {
            let mut ranked = Array2::zeros(data.raw_dim());
            for (row, mut out) in data.axis_iter(Axis(0)).zip(ranked.axis_iter_mut(Axis(0))) {
                let row: Vec<f64> = row.iter().copied().collect();
                for (slot, rank) in out.iter_mut().zip(rank_with_ties(&row)) {
                    *slot = rank;
                }
            }
            ranked_data = ranked;
            ranked_data.view()
        }
        _ => data.view(),
    };

    let ones;
    let weights = match weights {
        Some(w) => w,
        None => {
            ones = vec![1.0; data.ncols()];
            ones.as_slice()
        }
    };

    let mut r = Array1::zeros(data.nrows());
    let mut valid = Array1::from_elem(data.nrows(), false);
    let mut row_buf = vec![0.0; data.ncols()];
    for (i, row) in data.axis_iter(Axis(0)).enumerate() {
        for (slot, x) in row_buf.iter_mut().zip(row.iter()) {
            *slot = *x;
        }
        if let Some(ri) = weighted_pearson(&row_buf, effect, weights) {
            r[i] = ri;
            valid[i] = true;
        }
    }
    Ok((r, valid))
}

/// Transformed t statistic for a correlation coefficient.
///
/// Clamps 1 - r^2 away from zero so |r| = 1 maps to a large finite t
/// instead of infinity.
fn r_to_t(r: f64, df: f64) -> f64 {
    let denom = (1.0 - r * r).max(f64::EPSILON);
    r * (df / denom).sqrt()
}

/// Elementwise correlation with coefficients, t statistics, and p-values.
///
/// `data` is (elements x subjects); `effect` holds one value per subject.
/// Zero-variance elements are masked: r = 0, t = 0, p = 1, `valid` false.
/// Set `assume_ranked` to skip re-ranking a pre-ranked element array under
/// Spearman.
///
/// # Errors
///
/// [`PermvoxError::InvalidArgument`] on mismatched lengths, fewer than 3
/// subjects, or weights combined with Spearman.
pub fn elementwise_correlation(
    data: ArrayView2<'_, f64>,
    effect: &[f64],
    kind: CorrelationKind,
    weights: Option<&[f64]>,
    assume_ranked: bool,
    alternative: Alternative,
) -> Result<CorrelationMaps, PermvoxError> {
    let (r, valid) = correlation_core(data, effect, kind, weights, assume_ranked)?;

    let df = (data.ncols() - 2) as f64;
    let dist = student_t(df);

    let t = r.mapv(|ri| r_to_t(ri, df));
    let mut p = t.mapv(|ti| t_pvalue(ti, &dist, alternative));
    // Invalid elements carry the degenerate policy values exactly.
    for (pi, ok) in p.iter_mut().zip(valid.iter()) {
        if !ok {
            *pi = 1.0;
        }
    }
    Ok(CorrelationMaps { r, t, p, valid })
}

/// Transformed t statistic map only, for the permutation hot loop.
///
/// Invalid (zero-variance) elements get t = 0, which can never exceed a
/// positive cluster-forming threshold.
///
/// # Errors
///
/// Same contract as [`elementwise_correlation`].
pub fn correlation_stat(
    data: ArrayView2<'_, f64>,
    effect: &[f64],
    kind: CorrelationKind,
    weights: Option<&[f64]>,
    assume_ranked: bool,
) -> Result<Array1<f64>, PermvoxError> {
    let (r, _valid) = correlation_core(data, effect, kind, weights, assume_ranked)?;
    let df = (data.ncols() - 2) as f64;
    Ok(r.mapv(|ri| r_to_t(ri, df)))
}

/// Voxelwise correlation over a 4-D (x, y, z, subjects) stack.
///
/// Validates that the effect vector matches the subject axis and that at
/// least 3 subjects are present, then returns r/t/p volumes of the spatial
/// shape plus the validity mask.
///
/// # Errors
///
/// [`PermvoxError::InvalidArgument`] when effect length differs from the
/// subject count or fewer than 3 subjects are stacked.
pub fn correlation_voxelwise(
    stack: ArrayView4<'_, f64>,
    effect: &[f64],
    kind: CorrelationKind,
    weights: Option<&[f64]>,
    alternative: Alternative,
) -> Result<VoxelwiseCorrelation, PermvoxError> {
    let (nx, ny, nz, n_subj) = stack.dim();
    let n_vox = nx * ny * nz;

    let flat = stack
        .to_owned()
        .into_shape((n_vox, n_subj))
        .expect("stack is contiguous after to_owned");
    let maps = elementwise_correlation(flat.view(), effect, kind, weights, false, alternative)?;

    let shape = (nx, ny, nz);
    Ok(VoxelwiseCorrelation {
        r: maps.r.into_shape(shape).expect("voxel count matches shape"),
        t: maps.t.into_shape(shape).expect("voxel count matches shape"),
        p: maps.p.into_shape(shape).expect("voxel count matches shape"),
        valid: maps
            .valid
            .into_shape(shape)
            .expect("voxel count matches shape"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array4};

    #[test]
    fn rank_handles_ties() {
        let ranks = rank_with_ties(&[10.0, 20.0, 20.0, 5.0]);
        assert_eq!(ranks, vec![2.0, 3.5, 3.5, 1.0]);
    }

    #[test]
    fn rank_is_idempotent_on_ranks() {
        let once = rank_with_ties(&[3.0, 1.0, 2.0, 2.0]);
        let twice = rank_with_ties(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn pearson_perfect_correlation() {
        let data = array![[1.0, 2.0, 3.0, 4.0], [4.0, 3.0, 2.0, 1.0]];
        let effect = [1.0, 2.0, 3.0, 4.0];
        let maps = elementwise_correlation(
            data.view(),
            &effect,
            CorrelationKind::Pearson,
            None,
            false,
            Alternative::TwoSided,
        )
        .unwrap();

        assert!((maps.r[0] - 1.0).abs() < 1e-12);
        assert!((maps.r[1] + 1.0).abs() < 1e-12);
        assert!(maps.t[0] > 1e6, "perfect r clamps to a large finite t");
        assert!(maps.t.iter().all(|t| t.is_finite()));
    }

    #[test]
    fn zero_variance_rows_masked_for_both_kinds() {
        let data = array![[5.0, 5.0, 5.0, 5.0], [1.0, 3.0, 2.0, 4.0]];
        let effect = [1.0, 2.0, 3.0, 4.0];

        for kind in [CorrelationKind::Pearson, CorrelationKind::Spearman] {
            let maps = elementwise_correlation(
                data.view(),
                &effect,
                kind,
                None,
                false,
                Alternative::TwoSided,
            )
            .unwrap();
            assert_eq!(maps.r[0], 0.0, "{kind}: degenerate r");
            assert_eq!(maps.p[0], 1.0, "{kind}: degenerate p");
            assert!(!maps.valid[0]);
            assert!(maps.valid[1]);
        }
    }

    #[test]
    fn spearman_matches_pearson_on_ranks() {
        let data = array![[10.0, 40.0, 20.0, 30.0, 50.0]];
        let effect = [5.0, 1.0, 4.0, 2.0, 3.0];

        let spearman = elementwise_correlation(
            data.view(),
            &effect,
            CorrelationKind::Spearman,
            None,
            false,
            Alternative::TwoSided,
        )
        .unwrap();

        let ranked_row = rank_with_ties(&[10.0, 40.0, 20.0, 30.0, 50.0]);
        let ranked = Array2::from_shape_vec((1, 5), ranked_row).unwrap();
        let pearson_on_ranks = elementwise_correlation(
            ranked.view(),
            &rank_with_ties(&effect),
            CorrelationKind::Pearson,
            None,
            false,
            Alternative::TwoSided,
        )
        .unwrap();

        assert!((spearman.r[0] - pearson_on_ranks.r[0]).abs() < 1e-12);
    }

    #[test]
    fn assume_ranked_skips_row_ranking() {
        let raw = array![[10.0, 40.0, 20.0, 30.0, 50.0]];
        let ranked_row = rank_with_ties(&[10.0, 40.0, 20.0, 30.0, 50.0]);
        let ranked = Array2::from_shape_vec((1, 5), ranked_row).unwrap();
        let effect = [5.0, 1.0, 4.0, 2.0, 3.0];

        let from_raw = elementwise_correlation(
            raw.view(),
            &effect,
            CorrelationKind::Spearman,
            None,
            false,
            Alternative::TwoSided,
        )
        .unwrap();
        let from_ranked = elementwise_correlation(
            ranked.view(),
            &effect,
            CorrelationKind::Spearman,
            None,
            true,
            Alternative::TwoSided,
        )
        .unwrap();

        assert_eq!(from_raw.r, from_ranked.r);
        assert_eq!(from_raw.p, from_ranked.p);
    }

    #[test]
    fn weighted_pearson_downweights_outlier() {
        // Last subject breaks an otherwise perfect correlation; zero weight
        // removes its influence entirely.
        let data = array![[1.0, 2.0, 3.0, 4.0, -10.0]];
        let effect = [1.0, 2.0, 3.0, 4.0, 5.0];
        let weights = [1.0, 1.0, 1.0, 1.0, 0.0];

        let unweighted = elementwise_correlation(
            data.view(),
            &effect,
            CorrelationKind::Pearson,
            None,
            false,
            Alternative::TwoSided,
        )
        .unwrap();
        let weighted = elementwise_correlation(
            data.view(),
            &effect,
            CorrelationKind::Pearson,
            Some(&weights),
            false,
            Alternative::TwoSided,
        )
        .unwrap();

        assert!(unweighted.r[0] < 0.9);
        assert!((weighted.r[0] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn weights_rejected_for_spearman() {
        let data = array![[1.0, 2.0, 3.0]];
        let err = elementwise_correlation(
            data.view(),
            &[1.0, 2.0, 3.0],
            CorrelationKind::Spearman,
            Some(&[1.0, 1.0, 1.0]),
            false,
            Alternative::TwoSided,
        )
        .unwrap_err();
        assert!(matches!(err, PermvoxError::InvalidArgument { param: "weights", .. }));
    }

    #[test]
    fn voxelwise_validates_lengths_and_counts() {
        let stack = Array4::<f64>::zeros((2, 2, 2, 4));

        let err = correlation_voxelwise(
            stack.view(),
            &[1.0, 2.0, 3.0],
            CorrelationKind::Pearson,
            None,
            Alternative::TwoSided,
        )
        .unwrap_err();
        assert!(matches!(err, PermvoxError::InvalidArgument { .. }));

        let small = Array4::<f64>::zeros((2, 2, 2, 2));
        let err = correlation_voxelwise(
            small.view(),
            &[1.0, 2.0],
            CorrelationKind::Pearson,
            None,
            Alternative::TwoSided,
        )
        .unwrap_err();
        assert!(matches!(err, PermvoxError::InvalidArgument { .. }));
    }

    #[test]
    fn voxelwise_shapes_and_mask() {
        let mut stack = Array4::<f64>::zeros((2, 1, 1, 4));
        // Voxel (0,0,0): correlated with effect. Voxel (1,0,0): constant.
        for (s, v) in [0.5, 1.0, 2.0, 3.0].iter().enumerate() {
            stack[[0, 0, 0, s]] = *v;
            stack[[1, 0, 0, s]] = 7.0;
        }
        let out = correlation_voxelwise(
            stack.view(),
            &[1.0, 2.0, 3.0, 4.0],
            CorrelationKind::Pearson,
            None,
            Alternative::TwoSided,
        )
        .unwrap();

        assert_eq!(out.r.dim(), (2, 1, 1));
        assert!(out.valid[[0, 0, 0]]);
        assert!(!out.valid[[1, 0, 0]]);
        assert_eq!(out.r[[1, 0, 0]], 0.0);
        assert_eq!(out.p[[1, 0, 0]], 1.0);
        assert!(out.r[[0, 0, 0]] > 0.9);
    }

    #[test]
    fn unknown_correlation_type_fails() {
        let err = "kendall".parse::<CorrelationKind>().unwrap_err();
        assert!(matches!(
            err,
            PermvoxError::InvalidArgument { param: "correlation_type", .. }
        ));
    }
}
