//! Elementwise statistics for voxel/vertex maps.
//!
//! Core statistical infrastructure for the permutation engine:
//! - Vectorized two-sample and paired t-tests over (elements x subjects) views
//! - Pearson/Spearman correlation with zero-variance masking
//! - Histogram-based p-value lookup against a permutation null distribution

mod correlation;
mod histogram;
mod ttest;

pub use correlation::{
    correlation_stat, correlation_voxelwise, elementwise_correlation, rank_with_ties,
    CorrelationKind, CorrelationMaps, VoxelwiseCorrelation,
};
pub use histogram::pval_from_histogram;
pub use ttest::{ttest_ind, ttest_ind_stat, ttest_rel, ttest_rel_stat, TtestMaps};
