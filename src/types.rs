//! Type aliases and shared geometry types.

use nalgebra::Matrix4;
use nifti::NiftiHeader;

/// 4x4 voxel-to-world affine transform.
pub type Affine4 = Matrix4<f64>;

/// Spatial shape of a volumetric map: (nx, ny, nz).
pub type SpatialShape = (usize, usize, usize);

/// Group membership of a subject in a two-group design.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Group {
    /// Responder group (response = 1 in the subject table).
    Responder,
    /// Non-responder group (response = 0).
    NonResponder,
}

/// Spatial geometry shared by every map in a dataset.
///
/// Carries the shape and the reference NIfTI header so output volumes are
/// written with the affine of the reference subject map, never recomputed.
#[derive(Debug, Clone)]
pub struct VolumeGeometry {
    shape: SpatialShape,
    header: NiftiHeader,
}

impl VolumeGeometry {
    /// Build a geometry from a shape and an explicit affine.
    ///
    /// Used for synthetic datasets; file-backed datasets should go through
    /// [`VolumeGeometry::from_header`] so the full reference header survives.
    pub fn new(shape: SpatialShape, affine: Affine4) -> Self {
        let mut header = NiftiHeader::default();
        header.dim = [3, shape.0 as u16, shape.1 as u16, shape.2 as u16, 1, 1, 1, 1];
        header.set_affine(&affine);
        Self { shape, header }
    }

    /// Build a geometry carrying the reference header of a loaded map.
    pub fn from_header(header: &NiftiHeader, shape: SpatialShape) -> Self {
        Self {
            shape,
            header: header.clone(),
        }
    }

    /// Spatial shape (nx, ny, nz).
    pub fn shape(&self) -> SpatialShape {
        self.shape
    }

    /// Total voxel count.
    pub fn n_voxels(&self) -> usize {
        self.shape.0 * self.shape.1 * self.shape.2
    }

    /// Voxel-to-world affine of the reference map.
    pub fn affine(&self) -> Affine4 {
        self.header.affine::<f64>()
    }

    /// Reference header, used verbatim when writing output volumes.
    pub fn header(&self) -> &NiftiHeader {
        &self.header
    }
}
