//! Permutation correction orchestrator.
//!
//! Drives the full inference pipeline: observed statistic map, cluster
//! formation, the (optionally parallel) permutation loop building the
//! max-statistic null distribution, and corrected p-value assignment.
//!
//! Permutations are independent and embarrassingly parallel. Each worker
//! receives read-only views of the loaded dataset and returns only the
//! scalar maximum cluster statistic plus a lightweight assignment record;
//! permuted statistic maps are dropped as soon as they are scored, so peak
//! memory stays bounded by the worker count rather than the permutation
//! count. A panic in any worker propagates to the coordinating thread and
//! aborts the run; there are no silent partial results.

use std::time::Instant;

use log::info;
use ndarray::{Array1, Array2, Array3, Axis};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::cluster::{extract_clusters, max_cluster_score};
use crate::config::{Alternative, ClusterStat, Config, TestKind};
use crate::dataset::GroupDataset;
use crate::error::PermvoxError;
use crate::report::{Assignment, ClusterResult, Metadata, PermutationRecord, PermutationReport};
use crate::stats::{
    correlation_stat, elementwise_correlation, pval_from_histogram, rank_with_ties, ttest_ind,
    ttest_ind_stat, ttest_rel, ttest_rel_stat, CorrelationKind,
};
use crate::thread_pool;

/// Counter-based RNG seed generation using SplitMix64.
///
/// A stateless PRF mapping (base seed, permutation index) to a
/// well-distributed 64-bit seed, so every permutation gets an independent
/// deterministic RNG stream regardless of which worker executes it.
#[inline]
pub(crate) fn counter_rng_seed(base_seed: u64, counter: u64) -> u64 {
    let mut z = base_seed.wrapping_add(counter.wrapping_mul(0x9e37_79b9_7f4a_7c15));
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// Dataset views prepared once before the permutation loop.
///
/// Under Spearman the element rows are rank-transformed here so the hot
/// loop can skip re-ranking: a permuted rank vector is already rank-valued.
struct Prepared {
    data: Array2<f64>,
    effect: Option<Vec<f64>>,
    assume_ranked: bool,
}

/// Main entry point for permutation-corrected group comparison.
///
/// Builder-style configuration over [`Config`]; all options are validated
/// in [`PermutationEngine::run`] before any statistic or permutation work
/// begins.
///
/// # Example
///
/// ```ignore
/// use permvox::{PermutationEngine, TestKind, ClusterStat};
///
/// let report = PermutationEngine::new(TestKind::TtestInd)
///     .threshold(2.5)
///     .permutations(5_000)
///     .cluster_stat(ClusterStat::Mass)
///     .seed(42)
///     .run(&dataset)?;
///
/// for cluster in report.significant_clusters(0.05) {
///     println!("cluster of {} voxels, p = {:.4}", cluster.size, cluster.corrected_p);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct PermutationEngine {
    config: Config,
}

impl PermutationEngine {
    /// Create with default configuration for the given test.
    pub fn new(test: TestKind) -> Self {
        Self {
            config: Config::new(test),
        }
    }

    /// Create with a reduced permutation count for smoke tests and
    /// calibration runs.
    pub fn quick(test: TestKind) -> Self {
        Self {
            config: Config {
                n_permutations: 100,
                ..Config::new(test)
            },
        }
    }

    /// Create from a fully specified configuration.
    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    /// Set the test sidedness.
    pub fn alternative(mut self, alternative: Alternative) -> Self {
        self.config.alternative = alternative;
        self
    }

    /// Set the cluster-forming threshold (positive magnitude).
    pub fn threshold(mut self, threshold: f64) -> Self {
        self.config.threshold = threshold;
        self
    }

    /// Set the number of permutations.
    pub fn permutations(mut self, n: usize) -> Self {
        self.config.n_permutations = n;
        self
    }

    /// Set the cluster scoring metric.
    pub fn cluster_stat(mut self, stat: ClusterStat) -> Self {
        self.config.cluster_stat = stat;
        self
    }

    /// Set an explicit worker count for the permutation loop.
    pub fn workers(mut self, n: usize) -> Self {
        self.config.workers = Some(n);
        self
    }

    /// Set a deterministic base seed for the permutation RNG.
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    /// Set per-subject weights (weighted Pearson only).
    pub fn subject_weights(mut self, weights: Vec<f64>) -> Self {
        self.config.weights = Some(weights);
        self
    }

    /// Current configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the full observed + permutation pipeline.
    ///
    /// # Errors
    ///
    /// [`PermvoxError::InvalidArgument`] when the configuration or its fit to
    /// the dataset fails validation; all validation happens before any
    /// permutation work starts.
    pub fn run(&self, dataset: &GroupDataset) -> Result<PermutationReport, PermvoxError> {
        let start = Instant::now();
        self.config.validate()?;
        self.validate_dataset(dataset)?;

        let config = &self.config;
        let shape = dataset.geometry().shape();
        let n_subjects = dataset.n_subjects();
        let n_group_a = dataset.n_group_a();

        let prepared = self.prepare(dataset);

        // Observed pass: statistic + p maps, then clusters with membership.
        let (stat_flat, p_flat, valid_flat) = self.observed_maps(&prepared, n_group_a)?;
        let stat_map = stat_flat
            .into_shape(shape)
            .expect("element count matches spatial shape");
        let p_map = p_flat
            .into_shape(shape)
            .expect("element count matches spatial shape");
        let valid_mask = valid_flat.map(|v| {
            v.into_shape(shape)
                .expect("element count matches spatial shape")
        });

        let mut observed_clusters =
            extract_clusters(stat_map.view(), config.threshold, config.alternative);
        info!(
            "observed pass: {} supra-threshold cluster(s) at |t| > {}",
            observed_clusters.len(),
            config.threshold
        );

        // Permutation loop: one deterministic RNG stream per 1-based index,
        // scalar maxima only.
        let base_seed = config.seed.unwrap_or_else(|| rand::rng().random());
        let n_perm = config.n_permutations;
        info!(
            "running {} permutations of {} ({} subjects, seed {})",
            n_perm, config.test, n_subjects, base_seed
        );

        let run_one = |index: usize| -> PermutationRecord {
            let seed = counter_rng_seed(base_seed, index as u64);
            let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
            let (assignment, stat) = self.permuted_stat(&prepared, n_group_a, &mut rng);
            let stat3 = stat
                .into_shape(shape)
                .expect("element count matches spatial shape");
            let max_stat = max_cluster_score(
                stat3.view(),
                config.threshold,
                config.alternative,
                config.cluster_stat,
            );
            PermutationRecord {
                index,
                assignment,
                max_stat,
            }
        };

        let records: Vec<PermutationRecord> = thread_pool::install(config.workers, || {
            let mut slots: Vec<Option<PermutationRecord>> = vec![None; n_perm];

            #[cfg(feature = "parallel")]
            slots
                .par_iter_mut()
                .enumerate()
                .for_each(|(i, slot)| *slot = Some(run_one(i + 1)));

            #[cfg(not(feature = "parallel"))]
            for (i, slot) in slots.iter_mut().enumerate() {
                *slot = Some(run_one(i + 1));
            }

            slots
                .into_iter()
                .map(|slot| slot.expect("every permutation slot is filled"))
                .collect()
        });

        let null_distribution: Vec<f64> = records.iter().map(|r| r.max_stat).collect();

        // Corrected p per observed cluster: upper tail on non-negative
        // cluster scores, floored at 1/n by the histogram lookup.
        observed_clusters.sort_by(|a, b| {
            b.score(config.cluster_stat)
                .total_cmp(&a.score(config.cluster_stat))
        });
        let scores: Vec<f64> = observed_clusters
            .iter()
            .map(|c| c.score(config.cluster_stat))
            .collect();
        let corrected = pval_from_histogram(&scores, &null_distribution, Alternative::Greater);

        let mut corrected_p_map = Array3::ones(shape);
        let clusters: Vec<ClusterResult> = observed_clusters
            .into_iter()
            .zip(corrected)
            .enumerate()
            .map(|(rank, (cluster, p))| {
                let flat = corrected_p_map
                    .as_slice_mut()
                    .expect("freshly allocated map is in standard layout");
                for &voxel in &cluster.voxels {
                    flat[voxel] = p;
                }
                ClusterResult {
                    id: rank + 1,
                    size: cluster.size,
                    mass: cluster.mass,
                    score: cluster.score(config.cluster_stat),
                    corrected_p: p,
                    peak_stat: cluster.peak_stat,
                    peak_voxel: unravel(cluster.peak_voxel, shape),
                    voxels: cluster.voxels,
                }
            })
            .collect();

        let elapsed_secs = start.elapsed().as_secs_f64();
        info!(
            "permutation run finished in {:.1}s, min corrected p = {:?}",
            elapsed_secs,
            clusters.first().map(|c| c.corrected_p)
        );

        Ok(PermutationReport {
            stat_map,
            p_map,
            valid_mask,
            corrected_p_map,
            clusters,
            null_distribution,
            records,
            geometry: dataset.geometry().clone(),
            metadata: Metadata {
                test: config.test,
                alternative: config.alternative,
                threshold: config.threshold,
                n_permutations: n_perm,
                cluster_stat: config.cluster_stat,
                subject_ids: dataset.subject_ids().to_vec(),
                n_group_a,
                seed: base_seed,
                workers: config.workers.unwrap_or_else(thread_pool::default_workers),
                elapsed_secs,
            },
        })
    }

    /// Check the configured test against the dataset's design.
    fn validate_dataset(&self, dataset: &GroupDataset) -> Result<(), PermvoxError> {
        let n = dataset.n_subjects();
        match self.config.test {
            TestKind::TtestInd => {
                if dataset.n_group_a() < 2 || dataset.n_group_b() < 2 {
                    return Err(PermvoxError::invalid(
                        "test",
                        format!(
                            "ttest_ind needs two groups of at least 2 subjects, got {} and {}",
                            dataset.n_group_a(),
                            dataset.n_group_b()
                        ),
                    ));
                }
            }
            TestKind::TtestRel => {
                if dataset.n_group_a() != dataset.n_group_b() {
                    return Err(PermvoxError::invalid(
                        "test",
                        format!(
                            "ttest_rel needs equal group sizes, got {} and {}",
                            dataset.n_group_a(),
                            dataset.n_group_b()
                        ),
                    ));
                }
                if dataset.n_group_a() < 2 {
                    return Err(PermvoxError::invalid(
                        "test",
                        "ttest_rel needs at least 2 pairs",
                    ));
                }
            }
            TestKind::Pearson | TestKind::Spearman => {
                if dataset.effect().is_none() {
                    return Err(PermvoxError::invalid(
                        "test",
                        format!("{} needs a dataset with a continuous effect vector", self.config.test),
                    ));
                }
                if n < 3 {
                    return Err(PermvoxError::invalid(
                        "test",
                        format!("correlation needs at least 3 subjects, got {n}"),
                    ));
                }
            }
        }
        if let Some(weights) = &self.config.weights {
            if weights.len() != n {
                return Err(PermvoxError::invalid(
                    "weights",
                    format!("weights length {} does not match subject count {n}", weights.len()),
                ));
            }
        }
        Ok(())
    }

    /// Flatten the stack and rank-transform once under Spearman.
    fn prepare(&self, dataset: &GroupDataset) -> Prepared {
        let data = dataset.element_matrix();
        match self.config.test {
            TestKind::Spearman => {
                let mut ranked = Array2::zeros(data.raw_dim());
                let mut buf = vec![0.0; data.ncols()];
                for (row, mut out) in data.axis_iter(Axis(0)).zip(ranked.axis_iter_mut(Axis(0))) {
                    for (slot, x) in buf.iter_mut().zip(row.iter()) {
                        *slot = *x;
                    }
                    for (slot, rank) in out.iter_mut().zip(rank_with_ties(&buf)) {
                        *slot = rank;
                    }
                }
                let effect = dataset.effect().map(rank_with_ties);
                Prepared {
                    data: ranked,
                    effect,
                    assume_ranked: true,
                }
            }
            _ => Prepared {
                data,
                effect: dataset.effect().map(<[f64]>::to_vec),
                assume_ranked: false,
            },
        }
    }

    fn correlation_kind(&self) -> CorrelationKind {
        match self.config.test {
            TestKind::Spearman => CorrelationKind::Spearman,
            _ => CorrelationKind::Pearson,
        }
    }

    /// Observed statistic/p maps (flat), plus the validity mask for
    /// correlation runs.
    #[allow(clippy::type_complexity)]
    fn observed_maps(
        &self,
        prepared: &Prepared,
        n_group_a: usize,
    ) -> Result<(Array1<f64>, Array1<f64>, Option<Array1<bool>>), PermvoxError> {
        let alternative = self.config.alternative;
        match self.config.test {
            TestKind::TtestInd => {
                let maps = ttest_ind(prepared.data.view(), n_group_a, alternative)?;
                Ok((maps.t, maps.p, None))
            }
            TestKind::TtestRel => {
                let maps = ttest_rel(prepared.data.view(), n_group_a, alternative)?;
                Ok((maps.t, maps.p, None))
            }
            TestKind::Pearson | TestKind::Spearman => {
                let effect = prepared
                    .effect
                    .as_deref()
                    .expect("effect presence validated before the observed pass");
                let maps = elementwise_correlation(
                    prepared.data.view(),
                    effect,
                    self.correlation_kind(),
                    self.config.weights.as_deref(),
                    prepared.assume_ranked,
                    alternative,
                )?;
                Ok((maps.t, maps.p, Some(maps.valid)))
            }
        }
    }

    /// One permutation: randomized assignment plus its flat statistic map.
    ///
    /// Unpaired designs shuffle the group relabeling across all subjects;
    /// paired designs flip members within random pairs; correlation designs
    /// shuffle the effect order. All validation ran before the loop, so the
    /// statistic kernels cannot fail here.
    fn permuted_stat(
        &self,
        prepared: &Prepared,
        n_group_a: usize,
        rng: &mut Xoshiro256PlusPlus,
    ) -> (Assignment, Array1<f64>) {
        let n = prepared.data.ncols();
        match self.config.test {
            TestKind::TtestInd => {
                let mut order: Vec<usize> = (0..n).collect();
                order.shuffle(rng);
                let permuted = prepared.data.select(Axis(1), &order);
                let t = ttest_ind_stat(permuted.view(), n_group_a)
                    .expect("group sizes validated before the permutation loop");
                (Assignment::Relabel(order), t)
            }
            TestKind::TtestRel => {
                let n_pairs = n_group_a;
                let flips: Vec<bool> = (0..n_pairs).map(|_| rng.random_bool(0.5)).collect();
                let mut order: Vec<usize> = (0..n).collect();
                for (pair, &flip) in flips.iter().enumerate() {
                    if flip {
                        order.swap(pair, n_pairs + pair);
                    }
                }
                let permuted = prepared.data.select(Axis(1), &order);
                let t = ttest_rel_stat(permuted.view(), n_pairs)
                    .expect("pairing validated before the permutation loop");
                (Assignment::PairFlip(flips), t)
            }
            TestKind::Pearson | TestKind::Spearman => {
                let effect = prepared
                    .effect
                    .as_deref()
                    .expect("effect presence validated before the permutation loop");
                let mut order: Vec<usize> = (0..n).collect();
                order.shuffle(rng);
                let shuffled: Vec<f64> = order.iter().map(|&j| effect[j]).collect();
                let t = correlation_stat(
                    prepared.data.view(),
                    &shuffled,
                    self.correlation_kind(),
                    self.config.weights.as_deref(),
                    prepared.assume_ranked,
                )
                .expect("correlation inputs validated before the permutation loop");
                (Assignment::EffectOrder(order), t)
            }
        }
    }
}

/// Convert a linear (row-major) voxel index to spatial coordinates.
fn unravel(linear: usize, shape: (usize, usize, usize)) -> (usize, usize, usize) {
    let (_, ny, nz) = shape;
    let z = linear % nz;
    let y = (linear / nz) % ny;
    let x = linear / (ny * nz);
    (x, y, z)
}
