//! Cluster extraction and scoring.

use ndarray::ArrayView3;

use crate::config::{Alternative, ClusterStat};

use super::label::{label_components, threshold_mask};

/// A supra-threshold connected component with its scores.
///
/// Clusters are ephemeral: the orchestrator keeps the observed set for
/// p-value assignment and immediately discards permuted ones after folding
/// their extremum into the null distribution.
#[derive(Debug, Clone)]
pub struct Cluster {
    /// Component label in the label volume (numbered from 1).
    pub label: u32,
    /// Member voxels as linear (row-major) indices into the statistic map.
    pub voxels: Vec<usize>,
    /// Extent: number of member voxels.
    pub size: usize,
    /// Mass: sum of |statistic| over member voxels.
    pub mass: f64,
    /// Largest |statistic| inside the cluster.
    pub peak_stat: f64,
    /// Linear index of the peak voxel.
    pub peak_voxel: usize,
}

impl Cluster {
    /// Score under the chosen metric.
    pub fn score(&self, stat: ClusterStat) -> f64 {
        match stat {
            ClusterStat::Size => self.size as f64,
            ClusterStat::Mass => self.mass,
        }
    }
}

/// Extract all supra-threshold clusters with full voxel membership.
///
/// Used for the observed pass, where memberships are needed later to paint
/// per-cluster corrected p-values back into a volume.
pub fn extract_clusters(
    stat: ArrayView3<'_, f64>,
    threshold: f64,
    alternative: Alternative,
) -> Vec<Cluster> {
    let mask = threshold_mask(stat, threshold, alternative);
    let (labels, n_labels) = label_components(mask.view());
    if n_labels == 0 {
        return Vec::new();
    }

    let mut clusters: Vec<Cluster> = (1..=n_labels)
        .map(|label| Cluster {
            label,
            voxels: Vec::new(),
            size: 0,
            mass: 0.0,
            peak_stat: 0.0,
            peak_voxel: 0,
        })
        .collect();

    for (linear, (&label, &value)) in labels.iter().zip(stat.iter()).enumerate() {
        if label == 0 {
            continue;
        }
        let cluster = &mut clusters[(label - 1) as usize];
        cluster.voxels.push(linear);
        cluster.size += 1;
        cluster.mass += value.abs();
        if value.abs() > cluster.peak_stat {
            cluster.peak_stat = value.abs();
            cluster.peak_voxel = linear;
        }
    }
    clusters
}

/// Scores of every supra-threshold cluster under the chosen metric.
///
/// The lean path for the permutation loop: accumulates per-label size and
/// mass without storing voxel memberships.
pub fn cluster_scores(
    stat: ArrayView3<'_, f64>,
    threshold: f64,
    alternative: Alternative,
    metric: ClusterStat,
) -> Vec<f64> {
    let mask = threshold_mask(stat, threshold, alternative);
    let (labels, n_labels) = label_components(mask.view());
    if n_labels == 0 {
        return Vec::new();
    }

    let mut sizes = vec![0usize; n_labels as usize];
    let mut masses = vec![0.0f64; n_labels as usize];
    for (&label, &value) in labels.iter().zip(stat.iter()) {
        if label != 0 {
            sizes[(label - 1) as usize] += 1;
            masses[(label - 1) as usize] += value.abs();
        }
    }

    match metric {
        ClusterStat::Size => sizes.into_iter().map(|s| s as f64).collect(),
        ClusterStat::Mass => masses,
    }
}

/// Maximum cluster score of a statistic map, or 0 when no cluster forms.
///
/// A permutation with no supra-threshold cluster contributes 0 to the null
/// distribution rather than being skipped.
pub fn max_cluster_score(
    stat: ArrayView3<'_, f64>,
    threshold: f64,
    alternative: Alternative,
    metric: ClusterStat,
) -> f64 {
    cluster_scores(stat, threshold, alternative, metric)
        .into_iter()
        .fold(0.0, f64::max)
}
