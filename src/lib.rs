//! # permvox
//!
//! Permutation-based cluster inference for voxel-wise neuroimaging maps.
//!
//! This crate compares two groups of per-subject 3-D scalar fields (e.g.
//! maximum temporal-interference intensity maps from field simulations) and
//! produces familywise-corrected significance maps via the max-statistic
//! permutation method:
//!
//! 1. An elementwise statistic map (t-test or correlation) is computed for
//!    the observed grouping and thresholded into spatially connected
//!    clusters (6-connectivity).
//! 2. The group assignment is randomly permuted many times; each permutation
//!    contributes only its maximum cluster statistic (extent or mass) to a
//!    null distribution.
//! 3. Each observed cluster's corrected p-value is the fraction of null
//!    maxima at or above its score, floored at 1/n_permutations.
//!
//! ## Quick Start
//!
//! ```ignore
//! use permvox::{MapLoader, PermutationEngine, SubjectTable, TestKind};
//!
//! let table = SubjectTable::from_csv_path("subjects.csv".as_ref())?;
//! let dataset = MapLoader::new("data/").load_groups(&table)?;
//!
//! let report = PermutationEngine::new(TestKind::TtestInd)
//!     .threshold(2.5)
//!     .permutations(5_000)
//!     .seed(42)
//!     .run(&dataset)?;
//!
//! permvox::output::save_report_volumes(&report, "out/".as_ref(), "ttest")?;
//! permvox::output::save_permutation_log(&report, "out/permutations.log".as_ref())?;
//! ```
//!
//! ## Determinism
//!
//! Runs with an explicit seed are fully reproducible: every permutation
//! index maps to its own deterministic RNG stream, independent of the worker
//! that executes it or the worker count.
//!
//! ## Logging
//!
//! Progress and skipped-subject warnings go through the [`log`] facade; the
//! embedding application owns logger installation and lifecycle.

#![warn(missing_docs)]
#![warn(clippy::all)]

// Core modules
mod config;
mod dataset;
mod engine;
mod error;
mod loader;
mod report;
mod thread_pool;
mod types;

// Functional modules
pub mod cluster;
pub mod io;
pub mod output;
pub mod stats;

// Re-exports for public API
pub use config::{Alternative, ClusterStat, Config, TestKind};
pub use dataset::GroupDataset;
pub use engine::PermutationEngine;
pub use error::PermvoxError;
pub use loader::{MapLoader, SubjectRow, SubjectTable};
pub use report::{Assignment, ClusterResult, Metadata, PermutationRecord, PermutationReport};
pub use types::{Affine4, Group, SpatialShape, VolumeGeometry};

/// Run a permutation test with default configuration.
///
/// Convenience wrapper over [`PermutationEngine`] for callers happy with
/// the defaults (two-sided, threshold 2.0, 1,000 permutations, cluster
/// size scoring).
///
/// # Errors
///
/// Same contract as [`PermutationEngine::run`].
pub fn permutation_test(
    dataset: &GroupDataset,
    test: TestKind,
) -> Result<PermutationReport, PermvoxError> {
    PermutationEngine::new(test).run(dataset)
}
