//! Threshold sampling of a [`ScalarGrid`] into a point set.

use std::cmp::Ordering;
use std::fmt;

use nalgebra as na;
use rayon::prelude::*;
use tracing::debug;

use crate::error::SamplingError;
use crate::grid::coords::CoordinateMapper;
use crate::grid::ScalarGrid;

/// Which side of the threshold counts as a hit.
#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Keep `value <= threshold` (GFE maps: more negative is better)
    Favorable,
    /// Keep `value >= threshold` (exclusion maps)
    Exclusion,
}

impl Direction {
    /// Inclusion test for a single value.
    pub fn includes(self, value: f32, threshold: f32) -> bool {
        match self {
            Direction::Favorable => value <= threshold,
            Direction::Exclusion => value >= threshold,
        }
    }

    /// Ordering that puts the strongest hits first.
    pub fn rank(self, a: f32, b: f32) -> Ordering {
        match self {
            Direction::Favorable => a.total_cmp(&b),
            Direction::Exclusion => b.total_cmp(&a),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Direction::Favorable => write!(f, "favorable"),
            Direction::Exclusion => write!(f, "exclusion"),
        }
    }
}

/// A cutoff together with the side that is kept.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Threshold {
    /// Cutoff value
    pub value: f32,
    /// Which side of the cutoff is kept
    pub direction: Direction,
}

impl Threshold {
    /// Keep `value <= cutoff`.
    pub fn favorable(value: f32) -> Self {
        Self {
            value,
            direction: Direction::Favorable,
        }
    }

    /// Keep `value >= cutoff`.
    pub fn exclusion(value: f32) -> Self {
        Self {
            value,
            direction: Direction::Exclusion,
        }
    }

    /// Whether `value` passes.
    pub fn includes(&self, value: f32) -> bool {
        self.direction.includes(value, self.value)
    }
}

/// Knobs for [`ThresholdSampler::sample`].
#[derive(Clone, Debug, PartialEq)]
pub struct SamplingParams {
    /// Visit every `stride`-th index along each axis
    pub stride: usize,
    /// Keep at most this many of the strongest hits
    pub max_points: Option<usize>,
    /// Scan z-slabs on the rayon pool
    pub parallel: bool,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            stride: 1,
            max_points: None,
            parallel: true,
        }
    }
}

/// A world-space point carrying the grid value it was sampled from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SamplePoint {
    /// World x in Å
    pub x: f64,
    /// World y in Å
    pub y: f64,
    /// World z in Å
    pub z: f64,
    /// Scalar value at the grid point
    pub value: f32,
}

impl SamplePoint {
    /// Point at `position` carrying `value`.
    pub fn new(position: na::Point3<f64>, value: f32) -> Self {
        Self {
            x: position.x,
            y: position.y,
            z: position.z,
            value,
        }
    }

    /// World position as a point.
    pub fn position(&self) -> na::Point3<f64> {
        na::Point3::new(self.x, self.y, self.z)
    }
}

/// Ordered sequence of sample points.
pub type PointSet = Vec<SamplePoint>;

/// Walks a grid and emits the points passing a [`Threshold`].
pub struct ThresholdSampler<'a> {
    grid: &'a ScalarGrid,
    mapper: CoordinateMapper,
}

impl<'a> ThresholdSampler<'a> {
    /// Sampler over a validated grid.
    pub fn new(grid: &'a ScalarGrid) -> Self {
        Self {
            grid,
            mapper: grid.mapper(),
        }
    }

    /// Sample the grid.
    ///
    /// Indices are visited with a uniform stride on every axis. When
    /// `max_points` is exceeded, hits are sorted strongest-first (ascending for
    /// favourable maps, descending for exclusion maps; ties keep scan order)
    /// and truncated, so identical inputs always give identical output.
    pub fn sample(
        &self,
        threshold: Threshold,
        params: &SamplingParams,
    ) -> Result<PointSet, SamplingError> {
        if params.stride == 0 {
            return Err(SamplingError::ZeroStride);
        }
        if !threshold.value.is_finite() {
            return Err(SamplingError::NonFiniteThreshold(threshold.value));
        }

        let [_, _, nz] = self.grid.dimensions();
        let slabs: Vec<usize> = (0..nz).step_by(params.stride).collect();

        // Slabs are merged in index order before any ranking
        let mut points: PointSet = if params.parallel {
            slabs
                .par_iter()
                .flat_map_iter(|&k| self.slab(k, threshold, params.stride))
                .collect()
        } else {
            slabs
                .iter()
                .flat_map(|&k| self.slab(k, threshold, params.stride))
                .collect()
        };
        debug!(
            "{} grid points pass {} threshold {:.3} (stride {})",
            points.len(),
            threshold.direction,
            threshold.value,
            params.stride
        );

        if let Some(max_points) = params.max_points {
            if points.len() > max_points {
                points.sort_by(|a, b| threshold.direction.rank(a.value, b.value));
                points.truncate(max_points);
                debug!("Kept the {max_points} strongest points");
            }
        }

        Ok(points)
    }

    fn slab(&self, k: usize, threshold: Threshold, stride: usize) -> Vec<SamplePoint> {
        let [nx, ny, _] = self.grid.dimensions();
        let values = self.grid.values();
        let mut hits = Vec::new();
        for j in (0..ny).step_by(stride) {
            for i in (0..nx).step_by(stride) {
                let value = values[self.mapper.offset(i, j, k)];
                if threshold.includes(value) {
                    hits.push(SamplePoint::new(self.mapper.to_world(i, j, k), value));
                }
            }
        }
        hits
    }
}

/// Convenience wrapper around [`ThresholdSampler::sample`].
pub fn sample(
    grid: &ScalarGrid,
    threshold: Threshold,
    params: &SamplingParams,
) -> Result<PointSet, SamplingError> {
    ThresholdSampler::new(grid).sample(threshold, params)
}
