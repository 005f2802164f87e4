//! In-memory group dataset handed to the permutation engine.

use ndarray::{concatenate, Array2, Array4, Axis};

use crate::error::PermvoxError;
use crate::types::VolumeGeometry;

/// Subject maps stacked along the last axis, with group bookkeeping.
///
/// The loader owns construction; the permutation engine only ever takes
/// read-only views. Invariants enforced at construction: every map shares
/// one spatial shape, subject IDs align index-for-index with the subject
/// axis, and each group keeps at least two members (two-group form) or at
/// least three subjects total (continuous-effect form).
#[derive(Debug, Clone)]
pub struct GroupDataset {
    data: Array4<f64>,
    n_group_a: usize,
    subject_ids: Vec<String>,
    effect: Option<Vec<f64>>,
    geometry: VolumeGeometry,
}

impl GroupDataset {
    /// Build a two-group dataset, group A (responders) stacked first.
    ///
    /// # Errors
    ///
    /// [`PermvoxError::DataLoad`] when the spatial shapes disagree or a group
    /// has fewer than two members; [`PermvoxError::InvalidArgument`] when the
    /// ID lists do not match the stacks.
    pub fn from_groups(
        group_a: Array4<f64>,
        group_b: Array4<f64>,
        ids_a: Vec<String>,
        ids_b: Vec<String>,
        geometry: VolumeGeometry,
    ) -> Result<Self, PermvoxError> {
        let (ax, ay, az, na) = group_a.dim();
        let (bx, by, bz, nb) = group_b.dim();
        if (ax, ay, az) != (bx, by, bz) || (ax, ay, az) != geometry.shape() {
            return Err(PermvoxError::data_load(format!(
                "group stacks disagree on spatial shape: {:?} vs {:?} (reference {:?})",
                (ax, ay, az),
                (bx, by, bz),
                geometry.shape()
            )));
        }
        if na < 2 || nb < 2 {
            return Err(PermvoxError::data_load(format!(
                "each group needs at least 2 subjects, got {na} responders and {nb} non-responders"
            )));
        }
        if ids_a.len() != na || ids_b.len() != nb {
            return Err(PermvoxError::invalid(
                "subject_ids",
                format!(
                    "ID lists ({}, {}) do not match stack sizes ({na}, {nb})",
                    ids_a.len(),
                    ids_b.len()
                ),
            ));
        }

        let data = concatenate(Axis(3), &[group_a.view(), group_b.view()])
            .expect("shapes validated equal on spatial axes");
        let mut subject_ids = ids_a;
        subject_ids.extend(ids_b);

        Ok(Self {
            data,
            n_group_a: na,
            subject_ids,
            effect: None,
            geometry,
        })
    }

    /// Build a continuous-effect dataset for correlation tests.
    ///
    /// # Errors
    ///
    /// [`PermvoxError::DataLoad`] on a shape mismatch or fewer than three
    /// subjects; [`PermvoxError::InvalidArgument`] on misaligned IDs or
    /// effect vector.
    pub fn from_effect(
        data: Array4<f64>,
        effect: Vec<f64>,
        ids: Vec<String>,
        geometry: VolumeGeometry,
    ) -> Result<Self, PermvoxError> {
        let (x, y, z, n) = data.dim();
        if (x, y, z) != geometry.shape() {
            return Err(PermvoxError::data_load(format!(
                "stack spatial shape {:?} disagrees with reference {:?}",
                (x, y, z),
                geometry.shape()
            )));
        }
        if n < 3 {
            return Err(PermvoxError::data_load(format!(
                "correlation designs need at least 3 subjects, got {n}"
            )));
        }
        if effect.len() != n {
            return Err(PermvoxError::invalid(
                "effect",
                format!("effect vector length {} does not match subject count {n}", effect.len()),
            ));
        }
        if ids.len() != n {
            return Err(PermvoxError::invalid(
                "subject_ids",
                format!("ID list length {} does not match subject count {n}", ids.len()),
            ));
        }

        Ok(Self {
            data,
            n_group_a: n,
            subject_ids: ids,
            effect: Some(effect),
            geometry,
        })
    }

    /// Full stack (x, y, z, subjects).
    pub fn data(&self) -> &Array4<f64> {
        &self.data
    }

    /// Number of subjects in group A (responders).
    ///
    /// Equal to the total subject count for continuous-effect datasets.
    pub fn n_group_a(&self) -> usize {
        self.n_group_a
    }

    /// Number of subjects in group B (non-responders).
    pub fn n_group_b(&self) -> usize {
        self.n_subjects() - self.n_group_a
    }

    /// Total subject count.
    pub fn n_subjects(&self) -> usize {
        self.data.dim().3
    }

    /// Subject identifiers, aligned with the subject axis.
    pub fn subject_ids(&self) -> &[String] {
        &self.subject_ids
    }

    /// Continuous effect vector, present for correlation designs.
    pub fn effect(&self) -> Option<&[f64]> {
        self.effect.as_deref()
    }

    /// Shared geometry of the stacked maps.
    pub fn geometry(&self) -> &VolumeGeometry {
        &self.geometry
    }

    /// Flatten the stack to an (elements x subjects) matrix.
    ///
    /// The subject axis is last and the stack is in standard layout, so the
    /// reshape is a straight reinterpretation of the voxel axes.
    pub fn element_matrix(&self) -> Array2<f64> {
        let n_vox = self.geometry.n_voxels();
        let n_subj = self.n_subjects();
        self.data
            .to_owned()
            .into_shape((n_vox, n_subj))
            .expect("stack is contiguous in standard layout")
    }
}
