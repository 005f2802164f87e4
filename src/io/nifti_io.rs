//! NIfTI volume reading and writing.
//!
//! The volumetric format is treated as opaque payload: maps are read as f64
//! arrays, shape-validated by the caller, and written back with the affine
//! of a reference header rather than a recomputed one. Gzipped volumes
//! (`.nii.gz`) are handled transparently by the `nifti` crate.

use std::path::Path;

use ndarray::{Array3, ArrayD, Axis, Ix3};
use nifti::writer::WriterOptions;
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};

use crate::error::PermvoxError;
use crate::types::VolumeGeometry;

fn nifti_err(path: &Path, source: nifti::error::NiftiError) -> PermvoxError {
    PermvoxError::Nifti {
        path: path.to_path_buf(),
        source,
    }
}

/// Squeeze trailing singleton axes until the array is 3-D.
///
/// Tolerates inputs declared higher-rank than the expected spatial rank
/// (e.g. a 4-D file with one volume). A trailing axis of extent > 1 cannot
/// be squeezed and is reported as a data-loading error.
fn squeeze_to_3d(path: &Path, mut array: ArrayD<f64>) -> Result<Array3<f64>, PermvoxError> {
    while array.ndim() > 3 {
        let last = array.ndim() - 1;
        if array.shape()[last] != 1 {
            return Err(PermvoxError::data_load(format!(
                "{} has non-squeezable shape {:?}, expected a 3-D volume",
                path.display(),
                array.shape()
            )));
        }
        array = array.index_axis_move(Axis(last), 0);
    }
    array
        .into_dimensionality::<Ix3>()
        .map_err(|_| PermvoxError::data_load(format!("{} is not a 3-D volume", path.display())))
}

/// Read a volumetric map as f64 together with its header.
///
/// # Errors
///
/// [`PermvoxError::Nifti`] on read/convert failures,
/// [`PermvoxError::DataLoad`] when a higher-rank input cannot be squeezed
/// to 3-D.
pub fn read_volume(path: &Path) -> Result<(Array3<f64>, NiftiHeader), PermvoxError> {
    let obj = ReaderOptions::new()
        .read_file(path)
        .map_err(|e| nifti_err(path, e))?;
    let header = obj.header().clone();
    let array = obj
        .into_volume()
        .into_ndarray::<f64>()
        .map_err(|e| nifti_err(path, e))?;
    let volume = squeeze_to_3d(path, array)?;
    Ok((volume, header))
}

/// Write a volume in the geometry of the reference subject map.
///
/// The reference header travels verbatim; a `.nii.gz` path produces a
/// gzip-compressed file.
///
/// # Errors
///
/// [`PermvoxError::Nifti`] when the writer fails.
pub fn write_volume(
    path: &Path,
    volume: &Array3<f64>,
    geometry: &VolumeGeometry,
) -> Result<(), PermvoxError> {
    WriterOptions::new(path)
        .reference_header(geometry.header())
        .write_nifti(volume)
        .map_err(|e| nifti_err(path, e))
}
