//! Thresholding and 6-connectivity component labeling.

use ndarray::{Array3, ArrayView3};

use crate::config::Alternative;

/// Binary exceedance mask for the tail(s) selected by `alternative`.
///
/// `greater` keeps stat > threshold, `less` keeps stat < -threshold,
/// `two-sided` keeps |stat| > threshold. The threshold is supplied as a
/// positive magnitude in all three cases.
pub fn threshold_mask(
    stat: ArrayView3<'_, f64>,
    threshold: f64,
    alternative: Alternative,
) -> Array3<bool> {
    match alternative {
        Alternative::Greater => stat.mapv(|v| v > threshold),
        Alternative::Less => stat.mapv(|v| v < -threshold),
        Alternative::TwoSided => stat.mapv(|v| v.abs() > threshold),
    }
}

/// Label connected components of `mask` under 6-connectivity.
///
/// Returns a label volume (0 = background, clusters numbered from 1) and the
/// number of components found. Components are discovered by an iterative
/// flood fill; labels are assigned in raster-scan order of each component's
/// first voxel, which makes labeling deterministic.
pub fn label_components(mask: ArrayView3<'_, bool>) -> (Array3<u32>, u32) {
    let (nx, ny, nz) = mask.dim();
    let mut labels = Array3::<u32>::zeros((nx, ny, nz));
    let mut next_label = 0u32;
    let mut frontier: Vec<(usize, usize, usize)> = Vec::new();

    for x in 0..nx {
        for y in 0..ny {
            for z in 0..nz {
                if !mask[[x, y, z]] || labels[[x, y, z]] != 0 {
                    continue;
                }
                next_label += 1;
                labels[[x, y, z]] = next_label;
                frontier.push((x, y, z));

                while let Some((cx, cy, cz)) = frontier.pop() {
                    // Face neighbors only: the six +/-1 steps along each axis.
                    let mut visit = |nx_: usize, ny_: usize, nz_: usize| {
                        if mask[[nx_, ny_, nz_]] && labels[[nx_, ny_, nz_]] == 0 {
                            labels[[nx_, ny_, nz_]] = next_label;
                            frontier.push((nx_, ny_, nz_));
                        }
                    };
                    if cx > 0 {
                        visit(cx - 1, cy, cz);
                    }
                    if cx + 1 < nx {
                        visit(cx + 1, cy, cz);
                    }
                    if cy > 0 {
                        visit(cx, cy - 1, cz);
                    }
                    if cy + 1 < ny {
                        visit(cx, cy + 1, cz);
                    }
                    if cz > 0 {
                        visit(cx, cy, cz - 1);
                    }
                    if cz + 1 < nz {
                        visit(cx, cy, cz + 1);
                    }
                }
            }
        }
    }

    (labels, next_label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn mask_from_coords(shape: (usize, usize, usize), on: &[(usize, usize, usize)]) -> Array3<bool> {
        let mut mask = Array3::from_elem(shape, false);
        for &c in on {
            mask[[c.0, c.1, c.2]] = true;
        }
        mask
    }

    #[test]
    fn threshold_respects_tails() {
        let mut stat = Array3::<f64>::zeros((1, 1, 3));
        stat[[0, 0, 0]] = 3.0;
        stat[[0, 0, 1]] = -3.0;
        stat[[0, 0, 2]] = 1.0;

        let upper = threshold_mask(stat.view(), 2.0, Alternative::Greater);
        assert!(upper[[0, 0, 0]]);
        assert!(!upper[[0, 0, 1]]);

        let lower = threshold_mask(stat.view(), 2.0, Alternative::Less);
        assert!(!lower[[0, 0, 0]]);
        assert!(lower[[0, 0, 1]]);

        let two = threshold_mask(stat.view(), 2.0, Alternative::TwoSided);
        assert!(two[[0, 0, 0]]);
        assert!(two[[0, 0, 1]]);
        assert!(!two[[0, 0, 2]]);
    }

    #[test]
    fn face_adjacent_voxels_join() {
        let mask = mask_from_coords((3, 3, 3), &[(0, 0, 0), (1, 0, 0), (1, 1, 0)]);
        let (labels, n) = label_components(mask.view());
        assert_eq!(n, 1);
        assert_eq!(labels[[0, 0, 0]], labels[[1, 1, 0]]);
    }

    #[test]
    fn diagonal_voxels_do_not_join() {
        // Edge- and corner-diagonal neighbors are separate under 6-connectivity.
        let mask = mask_from_coords((3, 3, 3), &[(0, 0, 0), (1, 1, 0), (2, 2, 2)]);
        let (_, n) = label_components(mask.view());
        assert_eq!(n, 3);
    }

    #[test]
    fn empty_mask_yields_no_components() {
        let mask = Array3::from_elem((4, 4, 4), false);
        let (labels, n) = label_components(mask.view());
        assert_eq!(n, 0);
        assert!(labels.iter().all(|&l| l == 0));
    }

    #[test]
    fn full_mask_is_one_component() {
        let mask = Array3::from_elem((3, 4, 5), true);
        let (labels, n) = label_components(mask.view());
        assert_eq!(n, 1);
        assert!(labels.iter().all(|&l| l == 1));
    }

    #[test]
    fn labeling_is_deterministic() {
        let mask = mask_from_coords((4, 4, 1), &[(0, 0, 0), (3, 3, 0), (3, 2, 0)]);
        let (labels_a, _) = label_components(mask.view());
        let (labels_b, _) = label_components(mask.view());
        assert_eq!(labels_a, labels_b);
        // Raster order: the (0,0,0) singleton is discovered first.
        assert_eq!(labels_a[[0, 0, 0]], 1);
        assert_eq!(labels_a[[3, 2, 0]], 2);
    }
}
