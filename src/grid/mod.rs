//! Scalar grids: raw parse output, the validated field, and format dispatch.
//!
//! Text is turned into a [`RawGrid`] by one of the format parsers, and a
//! [`RawGrid`] becomes a [`ScalarGrid`] only by passing through
//! [`GridValidator::validate`]. Every [`ScalarGrid`] therefore satisfies
//! `values.len() == nx * ny * nz`, holds only finite values, and stores them
//! x-fastest: `offset(i, j, k) = i + j * nx + k * nx * ny`.

pub mod coords;
pub mod native;
pub mod opendx;
pub mod stats;
pub mod validation;

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use nalgebra as na;

use crate::error::{GridError, ParseError};
use coords::CoordinateMapper;
use stats::GridStatistics;
use validation::{GridValidator, Warning};

/// Supported grid file formats.
#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum GridFormat {
    /// SILCS `.map` text: `SPACING`/`NELEMENTS`/`CENTER` header, x-fastest data
    Native,
    /// OpenDX `.dx` text: `counts`/`origin`/`delta` header, z-fastest data
    OpenDx,
}

impl GridFormat {
    /// Guess the format from the file extension, falling back to the contents.
    pub fn detect(path: &Path, text: &str) -> Result<Self, ParseError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("map") => return Ok(GridFormat::Native),
            Some("dx") => return Ok(GridFormat::OpenDx),
            _ => {}
        }

        let header: Vec<&str> = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .take(8)
            .collect();
        if header
            .iter()
            .any(|l| l.starts_with("object") && l.contains("gridpositions"))
        {
            Ok(GridFormat::OpenDx)
        } else if header.iter().any(|l| l.starts_with("NELEMENTS")) {
            Ok(GridFormat::Native)
        } else {
            Err(ParseError::UnknownFormat)
        }
    }
}

impl fmt::Display for GridFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            GridFormat::Native => write!(f, "native"),
            GridFormat::OpenDx => write!(f, "opendx"),
        }
    }
}

/// How the file places the grid in space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Placement {
    /// World coordinate of index `(0, 0, 0)`
    Origin([f64; 3]),
    /// Geometric center of the box; converted with [`coords::ORIGIN_CONVENTION`]
    Center([f64; 3]),
}

impl Placement {
    pub(crate) fn coordinates(&self) -> [f64; 3] {
        match self {
            Placement::Origin(c) | Placement::Center(c) => *c,
        }
    }
}

/// Order in which the data section lists values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataLayout {
    /// `i + j*nx + k*nx*ny` (native maps)
    XFastest,
    /// `k + j*nz + i*ny*nz` (OpenDX)
    ZFastest,
}

/// Unvalidated parser output. Dimensions may be non-positive and the value
/// count may disagree with them; [`GridValidator`] settles both.
#[derive(Clone, Debug)]
pub struct RawGrid {
    /// Declared number of points along x, y, z
    pub dimensions: [i64; 3],
    /// Grid spacing along x, y, z in Å
    pub spacing: [f64; 3],
    /// Origin or center as given by the file
    pub placement: Placement,
    /// Order of `values`
    pub layout: DataLayout,
    /// Data tokens in file order
    pub values: Vec<f32>,
    /// Header entries the parser did not interpret
    pub metadata: BTreeMap<String, String>,
    /// Format the grid was read from
    pub format: GridFormat,
}

/// A validated, read-only 3D scalar field.
#[derive(Clone, Debug)]
pub struct ScalarGrid {
    dimensions: [usize; 3],
    spacing: na::Vector3<f64>,
    origin: na::Point3<f64>,
    values: Vec<f32>,
    metadata: BTreeMap<String, String>,
    format: GridFormat,
}

impl ScalarGrid {
    pub(crate) fn from_parts(
        dimensions: [usize; 3],
        spacing: na::Vector3<f64>,
        origin: na::Point3<f64>,
        values: Vec<f32>,
        metadata: BTreeMap<String, String>,
        format: GridFormat,
    ) -> Self {
        debug_assert_eq!(values.len(), dimensions.iter().product::<usize>());
        Self {
            dimensions,
            spacing,
            origin,
            values,
            metadata,
            format,
        }
    }

    /// Number of points along x, y, z.
    pub fn dimensions(&self) -> [usize; 3] {
        self.dimensions
    }

    /// Spacing along x, y, z in Å.
    pub fn spacing(&self) -> na::Vector3<f64> {
        self.spacing
    }

    /// World coordinate of index `(0, 0, 0)`.
    pub fn origin(&self) -> na::Point3<f64> {
        self.origin
    }

    /// Values in x-fastest order.
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Unrecognised header entries carried over from the file.
    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    /// Format the grid was read from.
    pub fn format(&self) -> GridFormat {
        self.format
    }

    /// Total number of grid points.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Always false for a validated grid; provided for API completeness.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Index/world conversions for this grid.
    pub fn mapper(&self) -> CoordinateMapper {
        CoordinateMapper::new(self.dimensions, self.origin, self.spacing)
    }

    /// World coordinates of grid index `(i, j, k)`.
    pub fn to_world(&self, i: usize, j: usize, k: usize) -> na::Point3<f64> {
        self.mapper().to_world(i, j, k)
    }

    /// Scalar at `(i, j, k)`, or `None` when out of bounds.
    pub fn value_at(&self, i: usize, j: usize, k: usize) -> Option<f32> {
        let [nx, ny, nz] = self.dimensions;
        if i >= nx || j >= ny || k >= nz {
            return None;
        }
        self.values.get(self.mapper().offset(i, j, k)).copied()
    }

    /// Full two-pass statistics over every value.
    pub fn statistics(&self) -> GridStatistics {
        GridStatistics::compute(&self.values)
    }
}

/// Parse grid text in the given format. Does not validate.
pub fn parse(text: &str, format: GridFormat) -> Result<(RawGrid, Vec<Warning>), ParseError> {
    match format {
        GridFormat::Native => native::parse(text),
        GridFormat::OpenDx => opendx::parse(text),
    }
}

/// Parse and validate grid text with the default validator. Parse-stage and
/// validation warnings are returned together, in that order.
pub fn load(text: &str, format: GridFormat) -> Result<(ScalarGrid, Vec<Warning>), GridError> {
    let (raw, mut warnings) = parse(text, format)?;
    let (grid, validation_warnings) = GridValidator::default().validate(raw)?;
    warnings.extend(validation_warnings);
    Ok((grid, warnings))
}
