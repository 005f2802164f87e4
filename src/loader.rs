//! Group data loading: subject table to aligned in-memory stacks.
//!
//! The subject table names each subject, its response (binary group label or
//! continuous effect value), and the simulation whose map it contributed.
//! Map files follow the fixed naming convention
//! `{subject_id}_grey_{simulation_name}_TI_MNI_MNI_TI_max.nii.gz` (with a
//! plain `.nii` fallback). Missing files are skipped with a warning; a group
//! that ends up too small to test escalates to a fatal error.

use std::io::Read;
use std::path::{Path, PathBuf};

use log::{info, warn};
use ndarray::{stack, Array3, Array4, Axis};
use serde::Deserialize;

use crate::dataset::GroupDataset;
use crate::error::PermvoxError;
use crate::io::read_volume;
use crate::types::{Group, VolumeGeometry};

/// One row of the subject table.
#[derive(Debug, Clone, Deserialize)]
pub struct SubjectRow {
    /// Subject identifier used to resolve the map file.
    pub subject_id: String,
    /// Binary response (0/1) or continuous effect value.
    pub response: f64,
    /// Simulation name used to resolve the map file.
    pub simulation_name: String,
}

impl SubjectRow {
    /// Group membership under the binary reading of `response`.
    pub fn group(&self) -> Group {
        if self.response != 0.0 {
            Group::Responder
        } else {
            Group::NonResponder
        }
    }
}

/// Parsed subject table.
#[derive(Debug, Clone)]
pub struct SubjectTable {
    rows: Vec<SubjectRow>,
}

impl SubjectTable {
    /// Parse from a CSV file with `subject_id`, `response`, and
    /// `simulation_name` columns.
    ///
    /// # Errors
    ///
    /// [`PermvoxError::Table`] on malformed CSV or missing columns.
    pub fn from_csv_path(path: &Path) -> Result<Self, PermvoxError> {
        let mut reader = csv::Reader::from_path(path)?;
        Self::collect_rows(&mut reader)
    }

    /// Parse from any CSV reader (used by tests and embedding callers).
    ///
    /// # Errors
    ///
    /// [`PermvoxError::Table`] on malformed CSV or missing columns.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, PermvoxError> {
        let mut reader = csv::Reader::from_reader(reader);
        Self::collect_rows(&mut reader)
    }

    fn collect_rows<R: Read>(reader: &mut csv::Reader<R>) -> Result<Self, PermvoxError> {
        let rows = reader
            .deserialize()
            .collect::<Result<Vec<SubjectRow>, csv::Error>>()?;
        Ok(Self { rows })
    }

    /// All rows in table order.
    pub fn rows(&self) -> &[SubjectRow] {
        &self.rows
    }
}

/// Resolves and loads per-subject maps from a data directory.
#[derive(Debug, Clone)]
pub struct MapLoader {
    data_dir: PathBuf,
}

/// Accumulated result of loading one table row.
struct LoadedMap {
    volume: Array3<f64>,
    row: SubjectRow,
}

impl MapLoader {
    /// Loader rooted at the directory holding the per-subject map files.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Resolve a row to its map file under the naming convention.
    ///
    /// Tries the gzipped extension first, then plain `.nii`. Returns `None`
    /// when neither exists.
    pub fn resolve_map_path(&self, row: &SubjectRow) -> Option<PathBuf> {
        let base = format!(
            "{}_grey_{}_TI_MNI_MNI_TI_max",
            row.subject_id, row.simulation_name
        );
        for ext in [".nii.gz", ".nii"] {
            let candidate = self.data_dir.join(format!("{base}{ext}"));
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        None
    }

    /// Load every resolvable map, skipping missing files with a warning and
    /// validating each against the reference geometry (the first map loaded).
    fn load_maps(
        &self,
        table: &SubjectTable,
    ) -> Result<(Vec<LoadedMap>, Option<VolumeGeometry>), PermvoxError> {
        let mut maps = Vec::new();
        let mut geometry: Option<VolumeGeometry> = None;

        for row in table.rows() {
            let Some(path) = self.resolve_map_path(row) else {
                warn!(
                    "no map file for subject {} (simulation {}), skipping",
                    row.subject_id, row.simulation_name
                );
                continue;
            };

            let (volume, header) = read_volume(&path)?;
            match &geometry {
                None => {
                    geometry = Some(VolumeGeometry::from_header(&header, volume.dim()));
                }
                Some(reference) => {
                    if volume.dim() != reference.shape() {
                        return Err(PermvoxError::ShapeMismatch {
                            path,
                            expected: reference.shape(),
                            found: vec![volume.dim().0, volume.dim().1, volume.dim().2],
                        });
                    }
                }
            }
            maps.push(LoadedMap {
                volume,
                row: row.clone(),
            });
        }
        Ok((maps, geometry))
    }

    /// Load a two-group dataset (responders vs non-responders).
    ///
    /// # Errors
    ///
    /// [`PermvoxError::DataLoad`] when a group retains fewer than two members
    /// after skipping missing files; [`PermvoxError::ShapeMismatch`] when a
    /// map disagrees with the reference geometry.
    pub fn load_groups(&self, table: &SubjectTable) -> Result<GroupDataset, PermvoxError> {
        let (maps, geometry) = self.load_maps(table)?;
        let geometry = geometry
            .ok_or_else(|| PermvoxError::data_load("no subject maps could be loaded"))?;

        let mut responders = Vec::new();
        let mut responder_ids = Vec::new();
        let mut non_responders = Vec::new();
        let mut non_responder_ids = Vec::new();
        for loaded in maps {
            match loaded.row.group() {
                Group::Responder => {
                    responders.push(loaded.volume);
                    responder_ids.push(loaded.row.subject_id);
                }
                Group::NonResponder => {
                    non_responders.push(loaded.volume);
                    non_responder_ids.push(loaded.row.subject_id);
                }
            }
        }

        if responders.len() < 2 || non_responders.len() < 2 {
            return Err(PermvoxError::data_load(format!(
                "too few subjects after loading: {} responders, {} non-responders (need 2 each)",
                responders.len(),
                non_responders.len()
            )));
        }

        info!(
            "loaded {} responders and {} non-responders, shape {:?}",
            responders.len(),
            non_responders.len(),
            geometry.shape()
        );

        GroupDataset::from_groups(
            stack_volumes(&responders),
            stack_volumes(&non_responders),
            responder_ids,
            non_responder_ids,
            geometry,
        )
    }

    /// Load a continuous-effect dataset: one stack plus the effect vector
    /// taken from the `response` column.
    ///
    /// # Errors
    ///
    /// [`PermvoxError::DataLoad`] when fewer than three subjects remain after
    /// skipping missing files.
    pub fn load_with_effect(&self, table: &SubjectTable) -> Result<GroupDataset, PermvoxError> {
        let (maps, geometry) = self.load_maps(table)?;
        let geometry = geometry
            .ok_or_else(|| PermvoxError::data_load("no subject maps could be loaded"))?;

        if maps.len() < 3 {
            return Err(PermvoxError::data_load(format!(
                "too few subjects after loading: {} (correlation needs at least 3)",
                maps.len()
            )));
        }

        let volumes: Vec<Array3<f64>> = maps.iter().map(|m| m.volume.clone()).collect();
        let effect: Vec<f64> = maps.iter().map(|m| m.row.response).collect();
        let ids: Vec<String> = maps.into_iter().map(|m| m.row.subject_id).collect();

        info!(
            "loaded {} subjects with continuous effect, shape {:?}",
            ids.len(),
            geometry.shape()
        );

        GroupDataset::from_effect(stack_volumes(&volumes), effect, ids, geometry)
    }
}

/// Stack 3-D volumes along a new trailing subject axis.
fn stack_volumes(volumes: &[Array3<f64>]) -> Array4<f64> {
    let views: Vec<_> = volumes.iter().map(|v| v.view()).collect();
    stack(Axis(3), &views).expect("volumes validated to share one shape")
}
