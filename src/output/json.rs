//! JSON serialization of run summaries.

use serde::Serialize;

use crate::report::{ClusterResult, Metadata, PermutationReport};

/// Borrowing summary view: everything except the volumes and raw records.
#[derive(Serialize)]
struct Summary<'a> {
    metadata: &'a Metadata,
    clusters: &'a [ClusterResult],
    null_distribution: &'a [f64],
}

/// Serialize a run summary to a compact JSON string.
///
/// # Errors
///
/// Returns an error if serialization fails (should not happen for a
/// well-formed report).
pub fn to_json(report: &PermutationReport) -> Result<String, serde_json::Error> {
    serde_json::to_string(&Summary {
        metadata: &report.metadata,
        clusters: &report.clusters,
        null_distribution: &report.null_distribution,
    })
}

/// Serialize a run summary to a pretty-printed JSON string.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn to_json_pretty(report: &PermutationReport) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&Summary {
        metadata: &report.metadata,
        clusters: &report.clusters,
        null_distribution: &report.null_distribution,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Alternative, ClusterStat, TestKind};
    use crate::types::{Affine4, VolumeGeometry};
    use ndarray::Array3;

    fn make_report() -> PermutationReport {
        PermutationReport {
            stat_map: Array3::zeros((2, 2, 2)),
            p_map: Array3::ones((2, 2, 2)),
            valid_mask: None,
            corrected_p_map: Array3::ones((2, 2, 2)),
            clusters: vec![ClusterResult {
                id: 1,
                size: 3,
                mass: 9.5,
                score: 3.0,
                corrected_p: 0.02,
                peak_stat: 4.1,
                peak_voxel: (0, 1, 0),
                voxels: vec![0, 1, 2],
            }],
            null_distribution: vec![0.0, 1.0, 2.0],
            records: Vec::new(),
            geometry: VolumeGeometry::new((2, 2, 2), Affine4::identity()),
            metadata: Metadata {
                test: TestKind::TtestInd,
                alternative: Alternative::TwoSided,
                threshold: 2.0,
                n_permutations: 3,
                cluster_stat: ClusterStat::Size,
                subject_ids: vec!["sub-01".into(), "sub-02".into()],
                n_group_a: 1,
                seed: 42,
                workers: 1,
                elapsed_secs: 0.5,
            },
        }
    }

    #[test]
    fn summary_contains_key_fields() {
        let json = to_json(&make_report()).unwrap();
        assert!(json.contains("\"test\":\"ttest_ind\""));
        assert!(json.contains("\"alternative\":\"two-sided\""));
        assert!(json.contains("\"corrected_p\":0.02"));
        assert!(json.contains("null_distribution"));
        // Voxel membership stays out of summaries.
        assert!(!json.contains("\"voxels\""));
    }

    #[test]
    fn pretty_output_parses_back() {
        let json = to_json_pretty(&make_report()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["metadata"]["n_permutations"], 3);
        assert_eq!(value["clusters"][0]["size"], 3);
    }
}
