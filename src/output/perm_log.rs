//! Plain-text permutation audit log.
//!
//! One row per permutation: index, the randomized group assignment spelled
//! out by subject identifier, and the resulting maximum cluster statistic.
//! Written for later audit and reproducibility checks, not for parsing.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::error::PermvoxError;
use crate::report::{Assignment, PermutationReport};

/// Render one assignment as a human-readable field.
fn format_assignment(assignment: &Assignment, ids: &[String], n_group_a: usize) -> String {
    match assignment {
        Assignment::Relabel(order) => {
            let group_a: Vec<&str> = order[..n_group_a.min(order.len())]
                .iter()
                .map(|&j| ids[j].as_str())
                .collect();
            format!("group_a=[{}]", group_a.join(","))
        }
        Assignment::PairFlip(flips) => {
            let flipped: Vec<&str> = flips
                .iter()
                .enumerate()
                .filter(|(_, &f)| f)
                .map(|(pair, _)| ids[pair].as_str())
                .collect();
            format!("flipped_pairs=[{}]", flipped.join(","))
        }
        Assignment::EffectOrder(order) => {
            let reordered: Vec<&str> = order.iter().map(|&j| ids[j].as_str()).collect();
            format!("effect_order=[{}]", reordered.join(","))
        }
    }
}

/// Write the permutation log to any writer.
///
/// # Errors
///
/// Propagates I/O errors from the writer.
pub fn write_permutation_log<W: Write>(report: &PermutationReport, mut w: W) -> io::Result<()> {
    let meta = &report.metadata;

    writeln!(w, "# permvox permutation log")?;
    writeln!(
        w,
        "# test={} alternative={} threshold={} cluster_stat={}",
        meta.test, meta.alternative, meta.threshold, meta.cluster_stat
    )?;
    writeln!(
        w,
        "# n_permutations={} seed={} workers={} elapsed_secs={:.2}",
        meta.n_permutations, meta.seed, meta.workers, meta.elapsed_secs
    )?;
    writeln!(w, "# subjects=[{}]", meta.subject_ids.join(","))?;
    writeln!(w)?;

    writeln!(w, "permutation\tmax_{}\tassignment", meta.cluster_stat)?;
    for record in &report.records {
        writeln!(
            w,
            "{}\t{}\t{}",
            record.index,
            record.max_stat,
            format_assignment(&record.assignment, &meta.subject_ids, meta.n_group_a)
        )?;
    }

    writeln!(w)?;
    writeln!(w, "observed clusters ({}):", report.clusters.len())?;
    writeln!(w, "id\tsize\tmass\tscore\tcorrected_p\tpeak")?;
    for cluster in &report.clusters {
        writeln!(
            w,
            "{}\t{}\t{:.4}\t{:.4}\t{:.6}\t({},{},{})",
            cluster.id,
            cluster.size,
            cluster.mass,
            cluster.score,
            cluster.corrected_p,
            cluster.peak_voxel.0,
            cluster.peak_voxel.1,
            cluster.peak_voxel.2
        )?;
    }
    Ok(())
}

/// Write the permutation log to a file.
///
/// # Errors
///
/// [`PermvoxError::Io`] on filesystem failures.
pub fn save_permutation_log(report: &PermutationReport, path: &Path) -> Result<(), PermvoxError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_permutation_log(report, &mut writer)?;
    writer.flush()?;
    Ok(())
}
