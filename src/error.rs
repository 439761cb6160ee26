//! Error types for grid loading, validation, sampling and region filtering.

use std::path::PathBuf;

/// Fatal errors raised while reading the header or data section of a grid file.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// The input contained no non-blank lines.
    #[error("grid file is empty")]
    Empty,

    /// A required header field was never seen.
    #[error("missing required header field `{0}`")]
    MissingField(&'static str),

    /// A recognised header key carried values that could not be parsed.
    #[error("invalid `{key}` header on line {line}: {text:?}")]
    InvalidHeader {
        /// 1-based line number
        line: usize,
        /// Header keyword
        key: &'static str,
        /// The offending line
        text: String,
    },

    /// An OpenDX `delta` row had a non-zero off-diagonal component.
    #[error("non axis-aligned delta on row {row}: {delta:?}")]
    OffDiagonalDelta {
        /// Axis index (0 = x) of the delta row
        row: usize,
        /// The full delta vector
        delta: [f64; 3],
    },

    /// The product of the declared grid counts does not fit in memory addressing.
    #[error("grid counts {0:?} overflow the addressable size")]
    CountOverflow([i64; 3]),

    /// The file format could not be determined from the path or contents.
    #[error("unable to determine grid format")]
    UnknownFormat,
}

/// Fatal post-parse errors. A grid failing any of these never reaches sampling.
#[derive(Debug, thiserror::Error)]
pub enum FatalGridError {
    /// At least one axis has a non-positive number of points.
    #[error("invalid grid dimensions {0:?}")]
    InvalidDimensions([i64; 3]),

    /// At least one axis has a non-positive or non-finite spacing.
    #[error("invalid grid spacing {0:?}")]
    InvalidSpacing([f64; 3]),

    /// Origin or center coordinates are not finite.
    #[error("non-finite grid placement {0:?}")]
    InvalidPlacement([f64; 3]),

    /// The declared grid exceeds the validator's point limit or cannot be allocated.
    #[error("grid of {expected} points is larger than the limit of {limit}")]
    GridTooLarge {
        /// `nx*ny*nz`
        expected: usize,
        /// Largest accepted point count
        limit: usize,
    },

    /// A NaN or infinite value was found in the data section.
    #[error("non-finite value {value} at index {index}")]
    NonFiniteValue {
        /// Flat index into the values in file order
        index: usize,
        /// The offending value
        value: f32,
    },
}

/// Any fatal error produced while turning raw text into a [`crate::ScalarGrid`].
#[derive(Debug, thiserror::Error)]
pub enum GridError {
    /// Header or data section could not be read
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Grid parsed but violates an invariant
    #[error(transparent)]
    Invalid(#[from] FatalGridError),

    /// Reading the file failed
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A [`GridError`] tagged with the file it came from.
#[derive(Debug, thiserror::Error)]
#[error("failed to load {}: {source}", .path.display())]
pub struct GridLoadError {
    /// Path of the grid file that failed
    pub path: PathBuf,
    /// What went wrong
    #[source]
    pub source: GridError,
}

/// Invalid sampling parameters.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SamplingError {
    /// A stride of zero would never advance.
    #[error("sampling stride must be at least 1")]
    ZeroStride,

    /// The threshold is NaN or infinite.
    #[error("threshold must be finite, got {0}")]
    NonFiniteThreshold(f32),
}

/// Invalid region filter parameters.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum RegionError {
    /// The search radius must be a positive, finite distance.
    #[error("max distance must be positive and finite, got {0}")]
    InvalidMaxDistance(f64),

    /// Weights must be finite and non-negative.
    #[error("invalid region weights: proximity={proximity}, value={value}")]
    InvalidWeights {
        /// Weight on the proximity score
        proximity: f64,
        /// Weight on the value score
        value: f64,
    },

    /// The value scale collapses to a single point.
    #[error("value scale saturation and neutral points must differ (both {0})")]
    DegenerateValueScale(f32),
}

/// Errors from the end-to-end pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Grid could not be loaded
    #[error(transparent)]
    Load(#[from] GridLoadError),

    /// Sampling parameters were rejected
    #[error(transparent)]
    Sampling(#[from] SamplingError),

    /// Region filter parameters were rejected
    #[error(transparent)]
    Region(#[from] RegionError),
}
