//! Permutation run results and audit records.

use ndarray::Array3;
use serde::{Deserialize, Serialize};

use crate::config::{Alternative, ClusterStat, TestKind};
use crate::types::VolumeGeometry;

/// An observed cluster with its corrected significance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterResult {
    /// Rank of the cluster (1 = highest score).
    pub id: usize,
    /// Extent in voxels.
    pub size: usize,
    /// Mass: sum of |statistic| over member voxels.
    pub mass: f64,
    /// Score under the run's cluster statistic.
    pub score: f64,
    /// Corrected p-value from the max-statistic null distribution.
    pub corrected_p: f64,
    /// Largest |statistic| inside the cluster.
    pub peak_stat: f64,
    /// Spatial index of the peak voxel.
    pub peak_voxel: (usize, usize, usize),
    /// Member voxels as linear indices (kept out of JSON summaries).
    #[serde(skip)]
    pub voxels: Vec<usize>,
}

/// The randomized assignment applied in one permutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Assignment {
    /// Unpaired relabeling: subject order after shuffling; the first
    /// n_group_a entries form the permuted group A.
    Relabel(Vec<usize>),
    /// Paired design: true where the pair's members were swapped.
    PairFlip(Vec<bool>),
    /// Correlation design: subject order applied to the effect vector.
    EffectOrder(Vec<usize>),
}

/// Per-permutation bookkeeping for the audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermutationRecord {
    /// 1-based permutation index.
    pub index: usize,
    /// The randomized assignment applied.
    pub assignment: Assignment,
    /// Maximum cluster statistic of this permutation (0 when no cluster).
    pub max_stat: f64,
}

/// Run parameters and provenance, echoed into every output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    /// Elementwise test that drove the run.
    pub test: TestKind,
    /// Sidedness used for p-values and cluster formation.
    pub alternative: Alternative,
    /// Cluster-forming threshold.
    pub threshold: f64,
    /// Number of permutations in the null distribution.
    pub n_permutations: usize,
    /// Cluster scoring metric.
    pub cluster_stat: ClusterStat,
    /// Subject identifiers in stack order.
    pub subject_ids: Vec<String>,
    /// Size of group A (responders); total count for effect designs.
    pub n_group_a: usize,
    /// Base RNG seed actually used (drawn at run start when unset).
    pub seed: u64,
    /// Worker threads used for the permutation loop.
    pub workers: usize,
    /// Wall-clock duration of the run in seconds.
    pub elapsed_secs: f64,
}

/// Complete result of a permutation run.
///
/// The in-memory report is the source of truth; file outputs under
/// [`crate::output`] are side effects derived from it.
#[derive(Debug, Clone)]
pub struct PermutationReport {
    /// Observed elementwise statistic map.
    pub stat_map: Array3<f64>,
    /// Observed elementwise (uncorrected) p-value map.
    pub p_map: Array3<f64>,
    /// Validity mask for correlation runs (true = non-zero variance).
    pub valid_mask: Option<Array3<bool>>,
    /// Cluster-corrected p-value map: member voxels carry their cluster's
    /// corrected p, background voxels carry 1.
    pub corrected_p_map: Array3<f64>,
    /// Observed clusters, ranked by score (highest first).
    pub clusters: Vec<ClusterResult>,
    /// Null distribution of per-permutation maximum cluster statistics.
    pub null_distribution: Vec<f64>,
    /// Per-permutation audit records, in permutation order.
    pub records: Vec<PermutationRecord>,
    /// Geometry shared with the input maps (affine passed through).
    pub geometry: VolumeGeometry,
    /// Run parameters and provenance.
    pub metadata: Metadata,
}

impl PermutationReport {
    /// Smallest corrected p across observed clusters, if any formed.
    ///
    /// Never below 1 / n_permutations by construction.
    pub fn min_corrected_p(&self) -> Option<f64> {
        self.clusters
            .iter()
            .map(|c| c.corrected_p)
            .min_by(f64::total_cmp)
    }

    /// Clusters surviving the given familywise alpha.
    pub fn significant_clusters(&self, alpha: f64) -> Vec<&ClusterResult> {
        self.clusters
            .iter()
            .filter(|c| c.corrected_p <= alpha)
            .collect()
    }
}
