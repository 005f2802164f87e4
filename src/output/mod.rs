//! Result persistence: volumes, audit log, JSON summary, terminal report.
//!
//! Everything here is a side effect derived from the in-memory
//! [`PermutationReport`](crate::report::PermutationReport); nothing is
//! written on a failed run.

mod json;
mod perm_log;
mod terminal;

pub use json::{to_json, to_json_pretty};
pub use perm_log::{save_permutation_log, write_permutation_log};
pub use terminal::format_report;

use std::path::{Path, PathBuf};

use crate::error::PermvoxError;
use crate::io::write_volume;
use crate::report::PermutationReport;

/// Write the statistic, uncorrected-p, and corrected-p volumes.
///
/// Files land in `dir` as `{prefix}_stat.nii.gz`,
/// `{prefix}_p_uncorrected.nii.gz`, and `{prefix}_p_corrected.nii.gz`, all
/// in the geometry of the reference subject map. Returns the written paths.
///
/// # Errors
///
/// Propagates NIfTI writer failures; earlier files may exist when a later
/// write fails.
pub fn save_report_volumes(
    report: &PermutationReport,
    dir: &Path,
    prefix: &str,
) -> Result<Vec<PathBuf>, PermvoxError> {
    let volumes = [
        ("stat", &report.stat_map),
        ("p_uncorrected", &report.p_map),
        ("p_corrected", &report.corrected_p_map),
    ];

    let mut written = Vec::with_capacity(volumes.len());
    for (suffix, volume) in volumes {
        let path = dir.join(format!("{prefix}_{suffix}.nii.gz"));
        write_volume(&path, volume, &report.geometry)?;
        written.push(path);
    }
    Ok(written)
}
