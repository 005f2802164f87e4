//! Run configuration for permutation inference.
//!
//! String-valued options from the caller's configuration surface are parsed
//! once into closed enums here; the hot permutation loop never re-validates
//! them. Unknown strings fail with an [`PermvoxError::InvalidArgument`]
//! before any statistic or permutation work begins.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PermvoxError;

/// Which elementwise test drives the permutation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestKind {
    /// Independent two-sample t-test (responders vs non-responders).
    TtestInd,
    /// Paired t-test (fixed pairing between the two halves of the stack).
    TtestRel,
    /// Pearson correlation against a continuous effect vector.
    Pearson,
    /// Spearman rank correlation against a continuous effect vector.
    Spearman,
}

impl TestKind {
    /// Whether this test compares against a continuous effect vector.
    pub fn is_correlation(self) -> bool {
        matches!(self, TestKind::Pearson | TestKind::Spearman)
    }

    /// Whether this test uses a fixed subject pairing.
    pub fn is_paired(self) -> bool {
        matches!(self, TestKind::TtestRel)
    }

    /// Canonical configuration-surface spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            TestKind::TtestInd => "ttest_ind",
            TestKind::TtestRel => "ttest_rel",
            TestKind::Pearson => "pearson",
            TestKind::Spearman => "spearman",
        }
    }
}

impl FromStr for TestKind {
    type Err = PermvoxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ttest_ind" => Ok(TestKind::TtestInd),
            "ttest_rel" => Ok(TestKind::TtestRel),
            "pearson" => Ok(TestKind::Pearson),
            "spearman" => Ok(TestKind::Spearman),
            other => Err(PermvoxError::invalid(
                "test",
                format!(
                    "unknown test `{other}`, expected one of \
                     ttest_ind, ttest_rel, pearson, spearman"
                ),
            )),
        }
    }
}

impl fmt::Display for TestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sidedness of the test, shared by p-value computation and cluster-forming
/// threshold application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Alternative {
    /// Both tails: significance from |statistic|.
    TwoSided,
    /// Upper tail only.
    Greater,
    /// Lower tail only.
    Less,
}

impl Alternative {
    /// Canonical configuration-surface spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            Alternative::TwoSided => "two-sided",
            Alternative::Greater => "greater",
            Alternative::Less => "less",
        }
    }
}

impl FromStr for Alternative {
    type Err = PermvoxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "two-sided" => Ok(Alternative::TwoSided),
            "greater" => Ok(Alternative::Greater),
            "less" => Ok(Alternative::Less),
            other => Err(PermvoxError::invalid(
                "alternative",
                format!(
                    "unknown alternative `{other}`, expected one of \
                     two-sided, greater, less"
                ),
            )),
        }
    }
}

impl fmt::Display for Alternative {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a supra-threshold cluster is scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterStat {
    /// Cluster extent: number of member voxels.
    Size,
    /// Cluster mass: sum of |statistic| over member voxels.
    Mass,
}

impl ClusterStat {
    /// Canonical configuration-surface spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            ClusterStat::Size => "size",
            ClusterStat::Mass => "mass",
        }
    }
}

impl FromStr for ClusterStat {
    type Err = PermvoxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "size" => Ok(ClusterStat::Size),
            "mass" => Ok(ClusterStat::Mass),
            other => Err(PermvoxError::invalid(
                "cluster_stat",
                format!("unknown cluster statistic `{other}`, expected size or mass"),
            )),
        }
    }
}

impl fmt::Display for ClusterStat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full configuration of a permutation run.
#[derive(Debug, Clone)]
pub struct Config {
    /// Elementwise test to run.
    pub test: TestKind,

    /// Sidedness for p-values and cluster formation (default: two-sided).
    pub alternative: Alternative,

    /// Cluster-forming threshold on the statistic map (default: 2.0).
    ///
    /// Applied to the tail(s) selected by `alternative`; must be positive
    /// and finite.
    pub threshold: f64,

    /// Number of permutations in the null distribution (default: 1,000).
    pub n_permutations: usize,

    /// Cluster scoring metric (default: size).
    pub cluster_stat: ClusterStat,

    /// Worker count for the permutation loop.
    ///
    /// `None` uses the shared pool sized to the host's cores minus one.
    pub workers: Option<usize>,

    /// Base seed for the permutation RNG; `None` draws one at run start.
    pub seed: Option<u64>,

    /// Optional per-subject weights (weighted Pearson only).
    pub weights: Option<Vec<f64>>,
}

impl Config {
    /// Default configuration for the given test.
    pub fn new(test: TestKind) -> Self {
        Self {
            test,
            alternative: Alternative::TwoSided,
            threshold: 2.0,
            n_permutations: 1_000,
            cluster_stat: ClusterStat::Size,
            workers: None,
            seed: None,
            weights: None,
        }
    }

    /// Validate every field, before any permutation work starts.
    pub fn validate(&self) -> Result<(), PermvoxError> {
        if !self.threshold.is_finite() || self.threshold <= 0.0 {
            return Err(PermvoxError::invalid(
                "threshold",
                format!("cluster-forming threshold must be positive and finite, got {}", self.threshold),
            ));
        }
        if self.n_permutations == 0 {
            return Err(PermvoxError::invalid(
                "n_permutations",
                "permutation count must be a positive integer",
            ));
        }
        if let Some(workers) = self.workers {
            if workers == 0 {
                return Err(PermvoxError::invalid(
                    "workers",
                    "worker count must be at least 1",
                ));
            }
        }
        if let Some(weights) = &self.weights {
            if self.test != TestKind::Pearson {
                return Err(PermvoxError::invalid(
                    "weights",
                    format!("subject weights are only supported with pearson, not {}", self.test),
                ));
            }
            if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
                return Err(PermvoxError::invalid(
                    "weights",
                    "subject weights must be finite and non-negative",
                ));
            }
        }
        Ok(())
    }
}
