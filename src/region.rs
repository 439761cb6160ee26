//! Proximity/value ranking of sample points around reference anchors.
//!
//! The default [`RegionMode::Ranked`] scores every point within the search
//! radius of its nearest anchor and keeps the top `max_points` by composite
//! score. [`RegionMode::BoundingBox`] is the older box test kept for callers
//! that want unranked output.

use nalgebra as na;
use rayon::prelude::*;
use rstar::primitives::GeomWithData;
use rstar::{PointDistance, RTree};
use tracing::debug;

use crate::error::RegionError;
use crate::sampling::{Direction, PointSet, SamplePoint};

/// Anchor extent (Å) at which the adaptive radius starts to grow.
pub const ADAPTIVE_REFERENCE_EXTENT: f64 = 10.0;

/// A reference point, such as a residue centroid, used for distance scoring.
#[derive(Clone, Debug, PartialEq)]
pub struct ReferenceAnchor {
    /// World coordinates in Å
    pub coordinates: na::Point3<f64>,
    /// Optional human-readable origin, e.g. `"A:45 LEU"`
    pub label: Option<String>,
}

impl ReferenceAnchor {
    /// Unlabelled anchor.
    pub fn new(coordinates: na::Point3<f64>) -> Self {
        Self {
            coordinates,
            label: None,
        }
    }

    /// Anchor with a label, used in the `nearest_anchor` output column.
    pub fn with_label(coordinates: na::Point3<f64>, label: impl Into<String>) -> Self {
        Self {
            coordinates,
            label: Some(label.into()),
        }
    }
}

/// Weights of the two components of the composite score.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RegionWeights {
    /// Weight on closeness to the nearest anchor
    pub proximity: f64,
    /// Weight on how favourable the value is
    pub value: f64,
}

impl Default for RegionWeights {
    fn default() -> Self {
        Self {
            proximity: 0.6,
            value: 0.4,
        }
    }
}

/// Linear map of a scalar onto `[0, 1]`, clamped at both ends.
///
/// `saturated` maps to 1.0 and `neutral` to 0.0. With the default
/// `{-2.0, 0.0}` more negative free energies score higher.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ValueScale {
    /// Value at and beyond which the score is 1.0
    pub saturated: f32,
    /// Value at and beyond which the score is 0.0
    pub neutral: f32,
}

impl Default for ValueScale {
    fn default() -> Self {
        Self {
            saturated: -2.0,
            neutral: 0.0,
        }
    }
}

impl ValueScale {
    /// Scale matching a threshold direction: free energies score higher the
    /// more negative they are, exclusion values the closer they are to 1.
    pub fn for_direction(direction: Direction) -> Self {
        match direction {
            Direction::Favorable => Self::default(),
            Direction::Exclusion => Self {
                saturated: 1.0,
                neutral: 0.0,
            },
        }
    }

    /// Score of `value` in `[0, 1]`.
    pub fn score(&self, value: f32) -> f64 {
        let span = (self.neutral - self.saturated) as f64;
        ((self.neutral - value) as f64 / span).clamp(0.0, 1.0)
    }
}

/// Which filtering strategy to use.
#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RegionMode {
    /// Distance cutoff plus composite-score ranking
    #[default]
    Ranked,
    /// Legacy: anchors' bounding box padded by the search radius, input order kept
    BoundingBox,
}

/// Parameters of the [`SpatialRegionFilter`].
#[derive(Clone, Debug, PartialEq)]
pub struct RegionParams {
    /// Search radius in Å (before adaptive scaling)
    pub max_distance: f64,
    /// Maximum number of points returned
    pub max_points: usize,
    /// Composite score weights
    pub weights: RegionWeights,
    /// Value → score mapping
    pub value_scale: ValueScale,
    /// Grow the radius with the spatial extent of the anchors
    pub adaptive: bool,
    /// Filtering strategy
    pub mode: RegionMode,
}

impl Default for RegionParams {
    fn default() -> Self {
        Self {
            max_distance: 8.0,
            max_points: 1000,
            weights: RegionWeights::default(),
            value_scale: ValueScale::default(),
            adaptive: false,
            mode: RegionMode::Ranked,
        }
    }
}

/// A point that survived the distance cutoff, with its scores.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScoredPoint {
    /// The original sample point
    pub point: SamplePoint,
    /// Index of the nearest anchor in the slice passed to [`SpatialRegionFilter::rank`]
    pub nearest_anchor: usize,
    /// Distance to the nearest anchor in Å
    pub min_distance: f64,
    /// `1 - min_distance / max_distance`
    pub proximity_score: f64,
    /// [`ValueScale::score`] of the point value
    pub value_score: f64,
    /// Weighted sum of the two scores
    pub composite_score: f64,
}

/// Bounding-box diagonal of the anchor coordinates; 0 for fewer than two anchors.
pub fn region_extent(anchors: &[ReferenceAnchor]) -> f64 {
    match bounding_box(anchors) {
        Some((lo, hi)) => (hi - lo).norm(),
        None => 0.0,
    }
}

/// Search radius scaled by anchor extent: `base * max(1, extent / ADAPTIVE_REFERENCE_EXTENT)`.
///
/// The scale factor is not capped.
pub fn adaptive_distance(base_distance: f64, region_extent: f64) -> f64 {
    base_distance * (region_extent / ADAPTIVE_REFERENCE_EXTENT).max(1.0)
}

fn bounding_box(anchors: &[ReferenceAnchor]) -> Option<(na::Point3<f64>, na::Point3<f64>)> {
    let first = anchors.first()?.coordinates;
    Some(anchors.iter().fold((first, first), |(lo, hi), a| {
        (lo.inf(&a.coordinates), hi.sup(&a.coordinates))
    }))
}

/// Ranks and truncates point sets by proximity to anchors.
#[derive(Clone, Debug)]
pub struct SpatialRegionFilter {
    params: RegionParams,
}

impl SpatialRegionFilter {
    /// Check `params` and build the filter.
    ///
    /// Rejects a non-positive or non-finite radius, negative or non-finite
    /// weights, and a value scale whose two ends coincide.
    pub fn new(params: RegionParams) -> Result<Self, RegionError> {
        if !(params.max_distance.is_finite() && params.max_distance > 0.0) {
            return Err(RegionError::InvalidMaxDistance(params.max_distance));
        }
        let RegionWeights { proximity, value } = params.weights;
        if [proximity, value].iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(RegionError::InvalidWeights { proximity, value });
        }
        if params.value_scale.saturated == params.value_scale.neutral {
            return Err(RegionError::DegenerateValueScale(params.value_scale.neutral));
        }
        Ok(Self { params })
    }

    /// Radius actually used for these anchors.
    pub fn effective_max_distance(&self, anchors: &[ReferenceAnchor]) -> f64 {
        if self.params.adaptive {
            adaptive_distance(self.params.max_distance, region_extent(anchors))
        } else {
            self.params.max_distance
        }
    }

    /// Filter according to the configured [`RegionMode`].
    pub fn filter(&self, points: &[SamplePoint], anchors: &[ReferenceAnchor]) -> PointSet {
        match self.params.mode {
            RegionMode::Ranked => self
                .rank(points, anchors)
                .into_iter()
                .map(|s| s.point)
                .collect(),
            RegionMode::BoundingBox => self.bounding_box(points, anchors),
        }
    }

    /// Score points within the search radius of any anchor, sort by
    /// descending composite score (stable) and keep the top `max_points`.
    pub fn rank(&self, points: &[SamplePoint], anchors: &[ReferenceAnchor]) -> Vec<ScoredPoint> {
        if points.is_empty() || anchors.is_empty() {
            return Vec::new();
        }

        let max_distance = self.effective_max_distance(anchors);
        let tree = RTree::bulk_load(
            anchors
                .iter()
                .enumerate()
                .map(|(n, a)| {
                    GeomWithData::new([a.coordinates.x, a.coordinates.y, a.coordinates.z], n)
                })
                .collect::<Vec<_>>(),
        );
        let RegionWeights {
            proximity: w_proximity,
            value: w_value,
        } = self.params.weights;

        let mut scored: Vec<ScoredPoint> = points
            .par_iter()
            .filter_map(|p| {
                let query = [p.x, p.y, p.z];
                let nearest = tree.nearest_neighbor(&query)?;
                let min_distance = nearest.distance_2(&query).sqrt();
                if min_distance > max_distance {
                    return None;
                }
                let proximity_score = 1.0 - min_distance / max_distance;
                let value_score = self.params.value_scale.score(p.value);
                Some(ScoredPoint {
                    point: *p,
                    nearest_anchor: nearest.data,
                    min_distance,
                    proximity_score,
                    value_score,
                    composite_score: proximity_score * w_proximity + value_score * w_value,
                })
            })
            .collect();
        let candidates = scored.len();

        scored.sort_by(|a, b| b.composite_score.total_cmp(&a.composite_score));
        scored.truncate(self.params.max_points);
        debug!(
            "{candidates} of {} points within {max_distance:.2} Å of {} anchor(s); kept {}",
            points.len(),
            anchors.len(),
            scored.len()
        );
        scored
    }

    fn bounding_box(&self, points: &[SamplePoint], anchors: &[ReferenceAnchor]) -> PointSet {
        let Some((lo, hi)) = bounding_box(anchors) else {
            return Vec::new();
        };
        let pad = na::Vector3::repeat(self.effective_max_distance(anchors));
        let (lo, hi) = (lo - pad, hi + pad);

        points
            .iter()
            .filter(|p| {
                let pos = p.position();
                (0..3).all(|axis| pos[axis] >= lo[axis] && pos[axis] <= hi[axis])
            })
            .take(self.params.max_points)
            .copied()
            .collect()
    }
}
