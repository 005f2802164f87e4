//! Error types for the permutation inference engine.
//!
//! Failures split into two families: input-validation errors, raised before
//! any permutation work starts, and data-loading errors from resolving and
//! reading per-subject maps. Degenerate statistics (zero-variance elements)
//! are not errors and are handled by policy inside the statistic engine.

use std::path::PathBuf;

use thiserror::Error;

/// All errors surfaced by this crate.
#[derive(Debug, Error)]
pub enum PermvoxError {
    /// A caller-supplied parameter failed validation.
    ///
    /// Raised before any permutation or statistic work begins; `param` names
    /// the offending argument.
    #[error("invalid value for `{param}`: {message}")]
    InvalidArgument {
        /// Name of the parameter that failed validation.
        param: &'static str,
        /// Human-readable description of the failure.
        message: String,
    },

    /// Loading the group dataset failed beyond recovery.
    ///
    /// Individual missing subject files are skipped with a warning; this
    /// error fires when a group ends up too small to test, or when a loaded
    /// map cannot be reconciled with the reference geometry.
    #[error("data loading failed: {message}")]
    DataLoad {
        /// Description of what made the dataset unusable.
        message: String,
    },

    /// A loaded map's spatial shape disagrees with the reference geometry.
    #[error(
        "shape mismatch in {}: expected {expected:?}, found {found:?}", path.display()
    )]
    ShapeMismatch {
        /// File whose shape disagreed.
        path: PathBuf,
        /// Spatial shape of the reference subject map.
        expected: (usize, usize, usize),
        /// Shape actually found (after squeezing singleton axes).
        found: Vec<usize>,
    },

    /// Reading or writing a NIfTI volume failed.
    #[error("NIfTI error for {}: {source}", path.display())]
    Nifti {
        /// File being read or written.
        path: PathBuf,
        /// Underlying error from the `nifti` crate.
        #[source]
        source: nifti::error::NiftiError,
    },

    /// The subject table could not be parsed.
    #[error("subject table error: {source}")]
    Table {
        /// Underlying CSV error.
        #[from]
        source: csv::Error,
    },

    /// Filesystem I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Serializing a report summary failed.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl PermvoxError {
    /// Shorthand for an [`PermvoxError::InvalidArgument`].
    pub(crate) fn invalid(param: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            param,
            message: message.into(),
        }
    }

    /// Shorthand for a [`PermvoxError::DataLoad`].
    pub(crate) fn data_load(message: impl Into<String>) -> Self {
        Self::DataLoad {
            message: message.into(),
        }
    }
}
