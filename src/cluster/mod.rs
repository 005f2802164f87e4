//! Cluster formation and scoring on thresholded statistic maps.
//!
//! Clusters are maximal 6-connected components (face neighbors only) of the
//! supra-threshold mask. The same connectivity rule applies to observed and
//! permuted maps; each component is scored by extent (voxel count) and mass
//! (sum of |statistic|).

mod label;
mod score;

pub use label::{label_components, threshold_mask};
pub use score::{cluster_scores, extract_clusters, max_cluster_score, Cluster};
