//! Grid validation: the only way to build a [`ScalarGrid`].

use std::fmt;

use nalgebra as na;
use tracing::{debug, trace};

use super::coords::{derive_origin, ORIGIN_CONVENTION};
use super::stats::GridStatistics;
use super::{DataLayout, Placement, RawGrid, ScalarGrid};
use crate::error::FatalGridError;

/// Values beyond ±5 kcal/mol are implausible for a GFE map.
pub const UNUSUAL_VALUE_LIMIT: f32 = 5.0;

/// Default cap on `nx*ny*nz` (4 GiB of `f32`). SILCS maps are around 10^6 points.
pub const MAX_GRID_POINTS: usize = 1 << 30;

/// Non-fatal findings from parsing or validation. Lossy fix-ups are always reported.
#[derive(Clone, Debug, PartialEq)]
pub enum Warning {
    /// More values than `nx*ny*nz`; the tail was discarded
    TruncatedExcessData {
        /// Number of values dropped
        dropped: usize,
    },
    /// Fewer values than `nx*ny*nz`; zeros were appended
    PaddedMissingData {
        /// Number of zeros appended
        added: usize,
    },
    /// Values outside `±UNUSUAL_VALUE_LIMIT`
    UnusualValueRange {
        /// Smallest value
        min: f32,
        /// Largest value
        max: f32,
    },
    /// Data-section tokens that were not numbers
    DroppedTokens {
        /// How many tokens were skipped
        count: usize,
        /// Line of the first skipped token (1-based)
        first_line: usize,
    },
    /// OpenDX `items` disagrees with the `counts` product
    ItemCountMismatch {
        /// Count from the `items` field
        declared: usize,
        /// `nx*ny*nz`
        expected: usize,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::TruncatedExcessData { dropped } => {
                write!(f, "Truncated {dropped} excess value(s) beyond the grid size")
            }
            Warning::PaddedMissingData { added } => {
                write!(f, "Padded {added} missing value(s) with 0.0")
            }
            Warning::UnusualValueRange { min, max } => write!(
                f,
                "Unusual value range [{min:.3}, {max:.3}] (expected within ±{UNUSUAL_VALUE_LIMIT})"
            ),
            Warning::DroppedTokens { count, first_line } => write!(
                f,
                "Dropped {count} non-numeric token(s) in data section (first on line {first_line})"
            ),
            Warning::ItemCountMismatch { declared, expected } => write!(
                f,
                "Data declares {declared} items but grid counts imply {expected}"
            ),
        }
    }
}

/// Checks and normalises a [`RawGrid`].
#[derive(Clone, Debug)]
pub struct GridValidator {
    /// Values with magnitude above this raise [`Warning::UnusualValueRange`]
    pub unusual_value_limit: f32,
    /// Grids with more points than this are rejected before any padding
    pub max_points: usize,
}

impl Default for GridValidator {
    fn default() -> Self {
        Self {
            unusual_value_limit: UNUSUAL_VALUE_LIMIT,
            max_points: MAX_GRID_POINTS,
        }
    }
}

impl GridValidator {
    /// Validate a parsed grid.
    ///
    /// Fails on non-positive dimensions or spacing, a non-finite placement, a
    /// point count above `max_points`, or any NaN/infinite value. Otherwise pads or truncates the data to `nx*ny*nz`,
    /// converts OpenDX ordering to x-fastest, and resolves a center to an origin.
    pub fn validate(&self, raw: RawGrid) -> Result<(ScalarGrid, Vec<Warning>), FatalGridError> {
        let RawGrid {
            dimensions,
            spacing,
            placement,
            layout,
            mut values,
            metadata,
            format,
        } = raw;
        let mut warnings = Vec::new();

        if dimensions.iter().any(|&n| n <= 0) {
            return Err(FatalGridError::InvalidDimensions(dimensions));
        }
        if spacing.iter().any(|&s| !(s.is_finite() && s > 0.0)) {
            return Err(FatalGridError::InvalidSpacing(spacing));
        }
        let anchor = placement.coordinates();
        if anchor.iter().any(|c| !c.is_finite()) {
            return Err(FatalGridError::InvalidPlacement(anchor));
        }

        let dims = dimensions.map(|n| n as usize);
        let expected = dims
            .iter()
            .try_fold(1usize, |acc, &n| acc.checked_mul(n))
            .ok_or(FatalGridError::InvalidDimensions(dimensions))?;
        let too_large = FatalGridError::GridTooLarge {
            expected,
            limit: self.max_points,
        };
        if expected > self.max_points {
            return Err(too_large);
        }

        if values.len() > expected {
            let dropped = values.len() - expected;
            values.truncate(expected);
            warnings.push(Warning::TruncatedExcessData { dropped });
        } else if values.len() < expected {
            let added = expected - values.len();
            values.try_reserve_exact(added).map_err(|_| too_large)?;
            values.resize(expected, 0.0);
            warnings.push(Warning::PaddedMissingData { added });
        }

        if let Some((index, &value)) = values.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(FatalGridError::NonFiniteValue { index, value });
        }

        if layout == DataLayout::ZFastest {
            values = z_fastest_to_x_fastest(&values, dims);
        }

        let spacing = na::Vector3::from(spacing);
        let origin = match placement {
            Placement::Origin(o) => na::Point3::from(o),
            Placement::Center(c) => {
                derive_origin(na::Point3::from(c), dims, spacing, ORIGIN_CONVENTION)
            }
        };
        trace!("Grid {dims:?} spacing {spacing:?} origin {origin:?}");

        let stats = GridStatistics::compute(&values);
        debug!(
            "Validated {} values: min={:.3} max={:.3} mean={:.3} sd={:.3}",
            stats.count, stats.min, stats.max, stats.mean, stats.std_dev
        );
        if stats.min < -self.unusual_value_limit || stats.max > self.unusual_value_limit {
            warnings.push(Warning::UnusualValueRange {
                min: stats.min,
                max: stats.max,
            });
        }

        Ok((
            ScalarGrid::from_parts(dims, spacing, origin, values, metadata, format),
            warnings,
        ))
    }
}

/// Reorder `k + j*nz + i*ny*nz` data into `i + j*nx + k*nx*ny`.
fn z_fastest_to_x_fastest(values: &[f32], [nx, ny, nz]: [usize; 3]) -> Vec<f32> {
    let mut out = vec![0.0f32; values.len()];
    for i in 0..nx {
        for j in 0..ny {
            let row = (i * ny + j) * nz;
            for k in 0..nz {
                out[i + j * nx + k * nx * ny] = values[row + k];
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridFormat;
    use std::collections::BTreeMap;

    fn raw(dimensions: [i64; 3], values: Vec<f32>) -> RawGrid {
        RawGrid {
            dimensions,
            spacing: [1.0; 3],
            placement: Placement::Origin([0.0; 3]),
            layout: DataLayout::XFastest,
            values,
            metadata: BTreeMap::new(),
            format: GridFormat::Native,
        }
    }

    #[test]
    fn pads_short_data() {
        let (grid, warnings) = GridValidator::default()
            .validate(raw([2, 2, 2], vec![-1.0; 5]))
            .unwrap();
        assert_eq!(grid.len(), 8);
        assert_eq!(&grid.values()[5..], &[0.0, 0.0, 0.0]);
        assert_eq!(warnings, vec![Warning::PaddedMissingData { added: 3 }]);
    }

    #[test]
    fn truncates_long_data() {
        let (grid, warnings) = GridValidator::default()
            .validate(raw([2, 1, 1], vec![0.5, 0.25, 9.0, 9.0]))
            .unwrap();
        assert_eq!(grid.values(), &[0.5, 0.25]);
        assert_eq!(warnings, vec![Warning::TruncatedExcessData { dropped: 2 }]);
    }

    #[test]
    fn length_invariant_holds_for_any_input_size() {
        for n in 0..30 {
            let (grid, _) = GridValidator::default()
                .validate(raw([3, 2, 2], vec![0.1; n]))
                .unwrap();
            let [nx, ny, nz] = grid.dimensions();
            assert_eq!(grid.values().len(), nx * ny * nz);
        }
    }

    #[test]
    fn oversized_grid_is_rejected_before_padding() {
        let err = GridValidator::default()
            .validate(raw([1_000_000, 1_000_000, 1_000_000], vec![1.0]))
            .unwrap_err();
        assert!(matches!(
            err,
            FatalGridError::GridTooLarge {
                expected: 1_000_000_000_000_000_000,
                limit: MAX_GRID_POINTS
            }
        ));

        let small_limit = GridValidator {
            max_points: 7,
            ..Default::default()
        };
        assert!(matches!(
            small_limit.validate(raw([2, 2, 2], vec![0.0; 8])),
            Err(FatalGridError::GridTooLarge { expected: 8, limit: 7 })
        ));
        assert!(small_limit.validate(raw([7, 1, 1], vec![])).is_ok());
    }

    #[test]
    fn unusual_range_is_informational() {
        let (grid, warnings) = GridValidator::default()
            .validate(raw([2, 1, 1], vec![-7.5, 0.0]))
            .unwrap();
        assert_eq!(grid.len(), 2);
        assert_eq!(
            warnings,
            vec![Warning::UnusualValueRange {
                min: -7.5,
                max: 0.0
            }]
        );
    }

    #[test]
    fn rejects_zero_and_negative_dimensions() {
        for dims in [[0, 2, 2], [2, -1, 2]] {
            let err = GridValidator::default()
                .validate(raw(dims, vec![]))
                .unwrap_err();
            assert!(matches!(err, FatalGridError::InvalidDimensions(d) if d == dims));
        }
    }

    #[test]
    fn rejects_bad_spacing() {
        let mut grid = raw([1, 1, 1], vec![0.0]);
        grid.spacing = [1.0, 0.0, 1.0];
        assert!(matches!(
            GridValidator::default().validate(grid),
            Err(FatalGridError::InvalidSpacing(_))
        ));

        let mut grid = raw([1, 1, 1], vec![0.0]);
        grid.spacing = [1.0, 1.0, -0.5];
        assert!(matches!(
            GridValidator::default().validate(grid),
            Err(FatalGridError::InvalidSpacing(_))
        ));
    }

    #[test]
    fn rejects_non_finite_values() {
        let err = GridValidator::default()
            .validate(raw([2, 2, 1], vec![0.0, -1.0, f32::NAN, 1.0]))
            .unwrap_err();
        assert!(matches!(err, FatalGridError::NonFiniteValue { index: 2, .. }));

        let err = GridValidator::default()
            .validate(raw([2, 1, 1], vec![f32::INFINITY, 0.0]))
            .unwrap_err();
        assert!(matches!(err, FatalGridError::NonFiniteValue { index: 0, .. }));
    }

    #[test]
    fn ignores_non_finite_values_beyond_grid() {
        let (_, warnings) = GridValidator::default()
            .validate(raw([1, 1, 1], vec![0.0, f32::NAN]))
            .unwrap();
        assert_eq!(warnings, vec![Warning::TruncatedExcessData { dropped: 1 }]);
    }

    #[test]
    fn center_placement_becomes_origin() {
        let mut grid = raw([2, 2, 1], vec![0.0; 4]);
        grid.placement = Placement::Center([0.0; 3]);
        let (grid, _) = GridValidator::default().validate(grid).unwrap();
        assert_eq!(grid.origin(), na::Point3::new(-1.0, -1.0, -0.5));
    }

    #[test]
    fn reorders_z_fastest() {
        // 2x1x3 grid; file order is k fastest
        let mut grid = raw([2, 1, 3], vec![0.0, 1.0, 2.0, 10.0, 11.0, 12.0]);
        grid.layout = DataLayout::ZFastest;
        let (grid, _) = GridValidator::default().validate(grid).unwrap();
        assert_eq!(grid.value_at(0, 0, 2), Some(2.0));
        assert_eq!(grid.value_at(1, 0, 0), Some(10.0));
        assert_eq!(grid.value_at(1, 0, 1), Some(11.0));
        assert_eq!(grid.values(), &[0.0, 10.0, 1.0, 11.0, 2.0, 12.0]);
    }
}
