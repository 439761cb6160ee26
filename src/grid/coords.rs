//! Grid index ↔ world coordinate conversions.
//!
//! All index/world arithmetic in the crate goes through [`CoordinateMapper`];
//! the center → origin rule lives only in [`derive_origin`].

use nalgebra as na;

/// How a file-supplied grid center relates to index `(0, 0, 0)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OriginConvention {
    /// `origin = center - n * spacing / 2`: each point sits at the low corner
    /// of its cell and the box spans `n * spacing`.
    HalfOpen,
    /// `origin = center - (n - 1) * spacing / 2`: the center falls exactly
    /// between the first and last grid points.
    Centered,
}

/// Convention used when loading native maps that only declare `CENTER`.
pub const ORIGIN_CONVENTION: OriginConvention = OriginConvention::HalfOpen;

/// Derive the origin of a grid from its center.
pub fn derive_origin(
    center: na::Point3<f64>,
    dimensions: [usize; 3],
    spacing: na::Vector3<f64>,
    convention: OriginConvention,
) -> na::Point3<f64> {
    let half_extent = na::Vector3::from_fn(|axis, _| {
        let n = dimensions[axis] as f64;
        let cells = match convention {
            OriginConvention::HalfOpen => n,
            OriginConvention::Centered => n - 1.0,
        };
        cells * spacing[axis] / 2.0
    });
    center - half_extent
}

/// Index/world conversion for a regular, axis-aligned grid.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CoordinateMapper {
    dimensions: [usize; 3],
    origin: na::Point3<f64>,
    spacing: na::Vector3<f64>,
}

impl CoordinateMapper {
    /// Mapper for a grid of `dimensions` points starting at `origin`.
    pub fn new(dimensions: [usize; 3], origin: na::Point3<f64>, spacing: na::Vector3<f64>) -> Self {
        Self {
            dimensions,
            origin,
            spacing,
        }
    }

    /// `world = origin + index * spacing`, per axis.
    pub fn to_world(&self, i: usize, j: usize, k: usize) -> na::Point3<f64> {
        na::Point3::new(
            self.origin.x + i as f64 * self.spacing.x,
            self.origin.y + j as f64 * self.spacing.y,
            self.origin.z + k as f64 * self.spacing.z,
        )
    }

    /// Continuous index coordinates `(world - origin) / spacing`.
    pub fn to_fractional_index(&self, point: &na::Point3<f64>) -> na::Vector3<f64> {
        (point - self.origin).component_div(&self.spacing)
    }

    /// Nearest in-bounds grid index for a world point, if any.
    pub fn to_index(&self, point: &na::Point3<f64>) -> Option<[usize; 3]> {
        let frac = self.to_fractional_index(point);
        let mut index = [0usize; 3];
        for axis in 0..3 {
            let rounded = frac[axis].round();
            if !rounded.is_finite() || rounded < 0.0 || rounded >= self.dimensions[axis] as f64 {
                return None;
            }
            index[axis] = rounded as usize;
        }
        Some(index)
    }

    /// Flat offset of `(i, j, k)`: x fastest, z slowest.
    pub fn offset(&self, i: usize, j: usize, k: usize) -> usize {
        let [nx, ny, _] = self.dimensions;
        i + j * nx + k * nx * ny
    }

    /// Inverse of [`CoordinateMapper::offset`].
    pub fn index_of(&self, offset: usize) -> [usize; 3] {
        let [nx, ny, _] = self.dimensions;
        [offset % nx, (offset / nx) % ny, offset / (nx * ny)]
    }

    /// Number of points along x, y, z.
    pub fn dimensions(&self) -> [usize; 3] {
        self.dimensions
    }
}
