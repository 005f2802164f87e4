//! Statistical properties of the permutation engine on synthetic datasets.

use ndarray::Array4;
use permvox::{
    Affine4, Alternative, ClusterStat, GroupDataset, PermutationEngine, PermvoxError, TestKind,
    VolumeGeometry,
};

const SHAPE: (usize, usize, usize) = (6, 6, 6);

/// Deterministic low-amplitude pseudo-noise, no RNG state involved.
fn noise(subject: usize, voxel: usize) -> f64 {
    ((subject * 7919 + voxel * 104_729) as f64).sin() * 0.1
}

fn geometry() -> VolumeGeometry {
    VolumeGeometry::new(SHAPE, Affine4::identity())
}

fn in_blob(x: usize, y: usize, z: usize) -> bool {
    (1..3).contains(&x) && (1..3).contains(&y) && (1..3).contains(&z)
}

/// Two groups of noisy maps; group A carries `signal` added inside a
/// 2x2x2 blob.
fn two_group_dataset(signal: f64, n_a: usize, n_b: usize) -> GroupDataset {
    let build = |n: usize, offset: usize, signal: f64| -> Array4<f64> {
        Array4::from_shape_fn((SHAPE.0, SHAPE.1, SHAPE.2, n), |(x, y, z, s)| {
            let voxel = (x * SHAPE.1 + y) * SHAPE.2 + z;
            let mut v = noise(offset + s, voxel);
            if in_blob(x, y, z) {
                v += signal;
            }
            v
        })
    };
    let ids = |prefix: &str, n: usize| -> Vec<String> {
        (0..n).map(|i| format!("{prefix}-{i:02}")).collect()
    };

    GroupDataset::from_groups(
        build(n_a, 0, signal),
        build(n_b, n_a, 0.0),
        ids("resp", n_a),
        ids("ctrl", n_b),
        geometry(),
    )
    .unwrap()
}

/// Continuous-effect dataset: blob voxels track the effect vector.
fn effect_dataset(n: usize) -> GroupDataset {
    let effect: Vec<f64> = (0..n).map(|i| i as f64).collect();
    let data = Array4::from_shape_fn((SHAPE.0, SHAPE.1, SHAPE.2, n), |(x, y, z, s)| {
        let voxel = (x * SHAPE.1 + y) * SHAPE.2 + z;
        let mut v = noise(s, voxel);
        if in_blob(x, y, z) {
            v += 2.0 * s as f64;
        }
        v
    });
    let ids = (0..n).map(|i| format!("sub-{i:02}")).collect();
    GroupDataset::from_effect(data, effect, ids, geometry()).unwrap()
}

#[test]
fn planted_signal_survives_correction() {
    let dataset = two_group_dataset(3.0, 6, 6);
    let report = PermutationEngine::new(TestKind::TtestInd)
        .threshold(3.0)
        .permutations(200)
        .seed(7)
        .run(&dataset)
        .unwrap();

    assert_eq!(report.null_distribution.len(), 200);
    assert_eq!(report.records.len(), 200);

    let significant = report.significant_clusters(0.05);
    assert!(
        !significant.is_empty(),
        "planted 2x2x2 blob should survive correction"
    );
    // The top cluster covers the planted blob (stray supra-threshold noise
    // voxels on the boundary may join it).
    assert!(report.clusters[0].size >= 8);
    let (px, py, pz) = report.clusters[0].peak_voxel;
    assert!(in_blob(px, py, pz));
}

#[test]
fn corrected_p_never_below_permutation_floor() {
    let dataset = two_group_dataset(3.0, 6, 6);
    let report = PermutationEngine::new(TestKind::TtestInd)
        .threshold(2.5)
        .permutations(100)
        .seed(3)
        .run(&dataset)
        .unwrap();

    let floor = 1.0 / 100.0;
    for cluster in &report.clusters {
        assert!(
            cluster.corrected_p >= floor - 1e-12,
            "cluster p {} below floor {floor}",
            cluster.corrected_p
        );
    }
}

#[test]
fn fixed_seed_is_bit_reproducible() {
    let dataset = two_group_dataset(1.5, 5, 5);
    let run = || {
        PermutationEngine::new(TestKind::TtestInd)
            .threshold(2.0)
            .permutations(50)
            .seed(123)
            .workers(2)
            .run(&dataset)
            .unwrap()
    };

    let a = run();
    let b = run();
    assert_eq!(a.stat_map, b.stat_map);
    assert_eq!(a.p_map, b.p_map);
    assert_eq!(a.null_distribution, b.null_distribution);
    assert_eq!(a.corrected_p_map, b.corrected_p_map);
}

#[test]
fn null_distribution_complete_when_no_clusters_ever_form() {
    let dataset = two_group_dataset(0.0, 4, 4);
    let report = PermutationEngine::new(TestKind::TtestInd)
        .threshold(50.0)
        .permutations(64)
        .seed(1)
        .run(&dataset)
        .unwrap();

    assert!(report.clusters.is_empty());
    assert_eq!(report.null_distribution.len(), 64);
    assert!(report.null_distribution.iter().all(|&v| v == 0.0));
    assert!(report.corrected_p_map.iter().all(|&p| p == 1.0));
}

#[test]
fn cluster_mass_scoring_runs_end_to_end() {
    let dataset = two_group_dataset(3.0, 6, 6);
    let report = PermutationEngine::new(TestKind::TtestInd)
        .threshold(3.0)
        .cluster_stat(ClusterStat::Mass)
        .permutations(100)
        .seed(11)
        .run(&dataset)
        .unwrap();

    let top = &report.clusters[0];
    assert!((top.score - top.mass).abs() < 1e-12);
    assert!(top.mass > top.size as f64 * 3.0, "mass sums |t| above threshold");
}

#[test]
fn paired_design_detects_within_pair_shift() {
    // Second half of each pair sits below the first half inside the blob.
    let n_pairs = 8;
    let data = Array4::from_shape_fn(
        (SHAPE.0, SHAPE.1, SHAPE.2, 2 * n_pairs),
        |(x, y, z, s)| {
            let voxel = (x * SHAPE.1 + y) * SHAPE.2 + z;
            let pair = s % n_pairs;
            let mut v = noise(pair, voxel);
            if in_blob(x, y, z) && s < n_pairs {
                v += 2.0;
            }
            v + noise(s, voxel) * 0.1
        },
    );
    let dataset = GroupDataset::from_groups(
        data.slice(ndarray::s![.., .., .., ..n_pairs]).to_owned(),
        data.slice(ndarray::s![.., .., .., n_pairs..]).to_owned(),
        (0..n_pairs).map(|i| format!("sub-{i:02}")).collect(),
        (n_pairs..2 * n_pairs).map(|i| format!("sub-{i:02}")).collect(),
        geometry(),
    )
    .unwrap();

    let report = PermutationEngine::new(TestKind::TtestRel)
        .threshold(3.0)
        .permutations(128)
        .seed(5)
        .run(&dataset)
        .unwrap();

    assert_eq!(report.null_distribution.len(), 128);
    assert!(!report.significant_clusters(0.05).is_empty());
}

#[test]
fn pearson_engine_finds_effect_tracking_blob() {
    let dataset = effect_dataset(8);
    let report = PermutationEngine::new(TestKind::Pearson)
        .threshold(4.5)
        .permutations(200)
        .seed(21)
        .run(&dataset)
        .unwrap();

    assert!(report.valid_mask.is_some());
    assert!(!report.significant_clusters(0.05).is_empty());
    assert!(report.clusters[0].size >= 8);
}

#[test]
fn spearman_engine_agrees_on_monotone_signal() {
    let dataset = effect_dataset(8);
    let report = PermutationEngine::new(TestKind::Spearman)
        .threshold(4.5)
        .permutations(200)
        .seed(22)
        .run(&dataset)
        .unwrap();

    assert!(!report.significant_clusters(0.05).is_empty());
}

#[test]
fn validation_happens_before_any_permutation_work() {
    let dataset = two_group_dataset(1.0, 4, 4);

    // Invalid threshold.
    let err = PermutationEngine::new(TestKind::TtestInd)
        .threshold(-1.0)
        .run(&dataset)
        .unwrap_err();
    assert!(matches!(err, PermvoxError::InvalidArgument { param: "threshold", .. }));

    // Zero permutations.
    let err = PermutationEngine::new(TestKind::TtestInd)
        .permutations(0)
        .run(&dataset)
        .unwrap_err();
    assert!(matches!(err, PermvoxError::InvalidArgument { param: "n_permutations", .. }));

    // Correlation against a dataset without an effect vector.
    let err = PermutationEngine::new(TestKind::Pearson)
        .run(&dataset)
        .unwrap_err();
    assert!(matches!(err, PermvoxError::InvalidArgument { param: "test", .. }));

    // Weights with a rank correlation.
    let err = PermutationEngine::new(TestKind::Spearman)
        .subject_weights(vec![1.0; 8])
        .run(&effect_dataset(8))
        .unwrap_err();
    assert!(matches!(err, PermvoxError::InvalidArgument { param: "weights", .. }));
}

#[test]
fn unknown_configuration_strings_fail_to_parse() {
    assert!("nope".parse::<Alternative>().is_err());
    assert!("anova".parse::<TestKind>().is_err());
    assert!("volume".parse::<ClusterStat>().is_err());
}

#[test]
fn one_sided_runs_respect_the_tail() {
    // Group A above group B: `less` should see nothing where `greater` does.
    let dataset = two_group_dataset(3.0, 6, 6);

    let greater = PermutationEngine::new(TestKind::TtestInd)
        .alternative(Alternative::Greater)
        .threshold(3.0)
        .permutations(100)
        .seed(9)
        .run(&dataset)
        .unwrap();
    assert!(!greater.clusters.is_empty());

    let less = PermutationEngine::new(TestKind::TtestInd)
        .alternative(Alternative::Less)
        .threshold(3.0)
        .permutations(100)
        .seed(9)
        .run(&dataset)
        .unwrap();
    assert!(less.significant_clusters(0.05).is_empty());
}
