//! Terminal output formatting for run summaries.

use colored::Colorize;

use crate::report::PermutationReport;

/// Format a run summary for human-readable terminal output.
pub fn format_report(report: &PermutationReport) -> String {
    let meta = &report.metadata;
    let mut output = String::new();
    let sep = "\u{2500}".repeat(62);

    output.push_str("permvox\n");
    output.push_str(&sep);
    output.push('\n');
    output.push('\n');

    output.push_str(&format!(
        "  Test: {} ({}), threshold {}\n",
        meta.test, meta.alternative, meta.threshold
    ));
    output.push_str(&format!(
        "  Subjects: {} ({} in group A)\n",
        meta.subject_ids.len(),
        meta.n_group_a
    ));
    output.push_str(&format!(
        "  Permutations: {} (seed {}, {} workers, {:.1}s)\n",
        meta.n_permutations, meta.seed, meta.workers, meta.elapsed_secs
    ));
    output.push('\n');

    if report.clusters.is_empty() {
        output.push_str(&format!(
            "  {}\n",
            "No supra-threshold clusters formed".yellow()
        ));
        return output;
    }

    output.push_str(&format!(
        "  {} cluster(s), scored by {}:\n",
        report.clusters.len(),
        meta.cluster_stat
    ));
    for cluster in &report.clusters {
        let line = format!(
            "    #{:<3} size {:>6}  mass {:>10.2}  p = {:.4}  peak ({}, {}, {})",
            cluster.id,
            cluster.size,
            cluster.mass,
            cluster.corrected_p,
            cluster.peak_voxel.0,
            cluster.peak_voxel.1,
            cluster.peak_voxel.2
        );
        if cluster.corrected_p <= 0.05 {
            output.push_str(&format!("{}\n", line.as_str().green().bold()));
        } else {
            output.push_str(&format!("{line}\n"));
        }
    }
    output
}
