use tracing::{debug, warn};

use crate::error::{MeshError, ResolutionError, Result, Warning};
use crate::grid::{Grid, GridFrame};
use crate::math::{Aabb, Vector3, TOLERANCE};
use crate::mesh::Mesh;

/// Parameters controlling grid resolution.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResolutionParams {
    /// Voxels along the bounding-box diagonal divided by √3 for a mesh of
    /// average complexity. For a cube this is the voxel count per side.
    pub base_resolution: usize,
    /// Lower clamp of the complexity factor.
    pub min_complexity: f64,
    /// Upper clamp of the complexity factor.
    pub max_complexity: f64,
    /// Explicit voxel size. Skips the estimate but still honours `max_voxels`.
    pub voxel_size: Option<f64>,
    /// Ceiling on the total voxel count, padding included.
    pub max_voxels: usize,
    /// Coarsest resolution allowed along the longest axis when auto-lowering.
    pub min_resolution: usize,
    /// Empty voxels added on every side of the mesh bounds.
    pub padding: usize,
}

impl Default for ResolutionParams {
    fn default() -> Self {
        Self {
            base_resolution: 40,
            min_complexity: 0.8,
            max_complexity: 1.2,
            voxel_size: None,
            max_voxels: 256 * 256 * 256,
            min_resolution: 4,
            padding: 2,
        }
    }
}

impl ResolutionParams {
    /// Params with a fixed voxel size and default ceiling.
    #[must_use]
    pub fn with_voxel_size(voxel_size: f64) -> Self {
        Self {
            voxel_size: Some(voxel_size),
            ..Self::default()
        }
    }

    fn validate(&self) -> std::result::Result<(), ResolutionError> {
        if self.padding == 0 {
            return Err(ResolutionError::InvalidParameters(
                "padding must be at least one voxel".into(),
            ));
        }
        if self.base_resolution == 0 || self.min_resolution == 0 || self.max_voxels == 0 {
            return Err(ResolutionError::InvalidParameters(
                "resolutions and voxel ceiling must be positive".into(),
            ));
        }
        if !(self.min_complexity > 0.0 && self.min_complexity <= self.max_complexity) {
            return Err(ResolutionError::InvalidParameters(format!(
                "complexity range [{}, {}] is empty",
                self.min_complexity, self.max_complexity
            )));
        }
        if let Some(size) = self.voxel_size {
            if !(size.is_finite() && size > 0.0) {
                return Err(ResolutionError::InvalidParameters(format!(
                    "voxel size must be positive, got {size}"
                )));
            }
        }
        Ok(())
    }
}

/// Resolved grid placement for one conversion job.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GridSpec {
    /// Origin, voxel size and dimensions of the grid.
    pub frame: GridFrame,
    /// Bounding box of the mesh, before padding.
    pub bounds: Aabb,
    /// Padding applied on every side, in voxels.
    pub padding: usize,
    /// Voxel size before any auto-lowering.
    pub requested_voxel_size: f64,
}

impl GridSpec {
    /// Total voxel count of the grid.
    #[must_use]
    pub fn voxel_count(&self) -> usize {
        self.frame.len()
    }

    /// Returns `true` if the resolution was coarsened to fit the ceiling.
    #[must_use]
    pub fn was_lowered(&self) -> bool {
        self.frame.voxel_size > self.requested_voxel_size
    }

    /// The diagnostic to report when the resolution was coarsened.
    #[must_use]
    pub fn warning(&self) -> Option<Warning> {
        self.was_lowered().then_some(Warning::ResolutionLowered {
            requested: self.requested_voxel_size,
            actual: self.frame.voxel_size,
        })
    }

    /// Allocates the all-`Empty` grid.
    #[must_use]
    pub fn allocate(&self) -> Grid {
        Grid::from_frame(self.frame)
    }
}

/// Derives voxel size, dimensions and origin from a mesh.
pub struct EstimateResolution<'a> {
    mesh: &'a Mesh,
    params: ResolutionParams,
}

impl<'a> EstimateResolution<'a> {
    /// Creates a new `EstimateResolution` operation.
    #[must_use]
    pub fn new(mesh: &'a Mesh, params: ResolutionParams) -> Self {
        Self { mesh, params }
    }

    /// Executes the estimate.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::Degenerate`] for an empty mesh or a bounding box
    /// with no volume, [`ResolutionError::InvalidParameters`] for unusable
    /// params, and [`ResolutionError::Overflow`] if even the coarsest allowed
    /// resolution exceeds `max_voxels`.
    pub fn execute(&self) -> Result<GridSpec> {
        self.params.validate()?;

        let bounds = self
            .mesh
            .bounds()
            .ok_or_else(|| MeshError::Degenerate("mesh has no triangles".into()))?;
        let extent = bounds.extent();
        if extent.iter().any(|&e| e <= TOLERANCE) {
            return Err(MeshError::Degenerate(format!(
                "bounding box has zero volume (extent {} x {} x {})",
                extent.x, extent.y, extent.z
            ))
            .into());
        }

        let requested = self
            .params
            .voxel_size
            .unwrap_or_else(|| estimate_voxel_size(&bounds, self.mesh.vertex_count(), &self.params));

        let voxel_size = self.fit_to_ceiling(&extent, requested)?;
        if voxel_size > requested {
            warn!(
                requested,
                actual = voxel_size,
                max_voxels = self.params.max_voxels,
                "Resolution lowered to fit voxel ceiling"
            );
        }

        let padding = self.params.padding;
        let dims = padded_dims(&extent, voxel_size, padding);
        #[allow(clippy::cast_precision_loss)]
        let origin = bounds.min - Vector3::repeat(padding as f64 * voxel_size);
        let frame = GridFrame::new(origin, voxel_size, dims)?;

        debug!(
            voxel_size,
            dims = ?dims,
            triangles = self.mesh.len(),
            "Resolution estimated"
        );

        Ok(GridSpec {
            frame,
            bounds,
            padding,
            requested_voxel_size: requested,
        })
    }

    /// Coarsens `voxel_size` until the padded grid fits under the ceiling.
    fn fit_to_ceiling(&self, extent: &Vector3, voxel_size: f64) -> Result<f64> {
        let max_voxels = self.params.max_voxels;
        let padding = self.params.padding;
        let count = |size: f64| voxel_count(&padded_dims(extent, size, padding));

        if count(voxel_size) <= max_voxels as u128 {
            return Ok(voxel_size);
        }

        #[allow(clippy::cast_precision_loss)]
        let coarsest = extent.max() / self.params.min_resolution as f64;
        let mut size = voxel_size;
        for _ in 0..64 {
            if size >= coarsest {
                break;
            }
            #[allow(clippy::cast_precision_loss)]
            let ratio = count(size) as f64 / max_voxels as f64;
            if ratio <= 1.0 {
                return Ok(size);
            }
            size = (size * ratio.cbrt() * 1.001).min(coarsest);
        }

        let voxels = count(size);
        if voxels <= max_voxels as u128 {
            Ok(size)
        } else {
            Err(ResolutionError::Overflow { voxels, max_voxels }.into())
        }
    }
}

/// Voxel size from mesh size and triangle-corner count.
///
/// Complexity factor `log10(vertices) / 5` is clamped to the configured
/// range and the resulting resolution is rounded down to an even number.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn estimate_voxel_size(bounds: &Aabb, vertex_count: usize, params: &ResolutionParams) -> f64 {
    let factor = ((vertex_count.max(1) as f64).log10() / 5.0)
        .clamp(params.min_complexity, params.max_complexity);
    let target = (params.base_resolution as f64 * factor).floor() as usize;
    let target = ((target / 2) * 2).max(2);
    bounds.diagonal() / (3.0_f64.sqrt() * target as f64)
}

/// Per-axis cell counts including padding on both sides.
fn padded_dims(extent: &Vector3, voxel_size: f64, padding: usize) -> [usize; 3] {
    std::array::from_fn(|i| {
        // Absorb the rounding of exact multiples such as 1.0 / 0.1.
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let cells = (extent[i] / voxel_size - 1e-9).ceil().max(1.0) as usize;
        cells.saturating_add(2 * padding)
    })
}

fn voxel_count(dims: &[usize; 3]) -> u128 {
    dims.iter().map(|&d| d as u128).product()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::VoxelisError;
    use crate::math::Point3;
    use crate::mesh::Triangle;
    use approx::assert_relative_eq;

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    /// Two triangles spanning the box `[0, sx] x [0, sy] x [0, sz]`.
    fn box_corners(sx: f64, sy: f64, sz: f64) -> Mesh {
        Mesh::new(vec![
            Triangle::new(p(0.0, 0.0, 0.0), p(sx, 0.0, 0.0), p(sx, sy, sz)),
            Triangle::new(p(0.0, 0.0, 0.0), p(0.0, sy, 0.0), p(sx, sy, sz)),
        ])
    }

    #[test]
    fn explicit_voxel_size_sets_dims_and_origin() {
        let mesh = box_corners(1.0, 1.0, 1.0);
        let params = ResolutionParams {
            padding: 1,
            ..ResolutionParams::with_voxel_size(0.1)
        };
        let spec = EstimateResolution::new(&mesh, params).execute().unwrap();
        assert_eq!(spec.frame.dims, [12, 12, 12]);
        assert_relative_eq!(spec.frame.origin, p(-0.1, -0.1, -0.1), epsilon = 1e-12);
        assert!(!spec.was_lowered());
        assert!(spec.warning().is_none());
    }

    #[test]
    fn estimate_uses_even_resolution_in_range() {
        let mesh = box_corners(2.0, 2.0, 2.0);
        let spec = EstimateResolution::new(&mesh, ResolutionParams::default())
            .execute()
            .unwrap();
        // 6 corners -> log10(6)/5 clamps to 0.8 -> 32 voxels per side.
        assert_relative_eq!(spec.frame.voxel_size, 2.0 / 32.0, epsilon = 1e-12);
        assert_eq!(spec.frame.dims, [36, 36, 36]);
    }

    #[test]
    fn empty_mesh_is_degenerate() {
        let err = EstimateResolution::new(&Mesh::default(), ResolutionParams::default())
            .execute()
            .unwrap_err();
        assert!(matches!(err, VoxelisError::Mesh(MeshError::Degenerate(_))));
    }

    #[test]
    fn flat_mesh_is_degenerate() {
        let mesh = Mesh::new(vec![Triangle::new(
            p(0.0, 0.0, 0.0),
            p(1.0, 0.0, 0.0),
            p(0.0, 1.0, 0.0),
        )]);
        let err = EstimateResolution::new(&mesh, ResolutionParams::default())
            .execute()
            .unwrap_err();
        assert!(matches!(err, VoxelisError::Mesh(MeshError::Degenerate(_))));
    }

    #[test]
    fn overflow_is_auto_lowered() {
        let mesh = box_corners(1.0, 1.0, 1.0);
        let params = ResolutionParams {
            max_voxels: 20 * 20 * 20,
            ..ResolutionParams::with_voxel_size(0.01)
        };
        let spec = EstimateResolution::new(&mesh, params).execute().unwrap();
        assert!(spec.voxel_count() <= 20 * 20 * 20);
        assert!(spec.was_lowered());
        assert!(matches!(
            spec.warning(),
            Some(Warning::ResolutionLowered { .. })
        ));
    }

    #[test]
    fn overflow_at_coarsest_resolution_is_fatal() {
        let mesh = box_corners(1.0, 1.0, 1.0);
        let params = ResolutionParams {
            max_voxels: 10,
            min_resolution: 4,
            ..ResolutionParams::default()
        };
        let err = EstimateResolution::new(&mesh, params).execute().unwrap_err();
        assert!(matches!(
            err,
            VoxelisError::Resolution(ResolutionError::Overflow { max_voxels: 10, .. })
        ));
    }

    #[test]
    fn zero_padding_is_rejected() {
        let mesh = box_corners(1.0, 1.0, 1.0);
        let params = ResolutionParams {
            padding: 0,
            ..ResolutionParams::default()
        };
        let err = EstimateResolution::new(&mesh, params).execute().unwrap_err();
        assert!(matches!(
            err,
            VoxelisError::Resolution(ResolutionError::InvalidParameters(_))
        ));
    }
}
