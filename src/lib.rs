#![warn(missing_docs)]
#![doc = include_str!("../README.md")]

//! # FragMap Library
//!
//! This library reads SILCS FragMap grids (native `.map` and OpenDX `.dx`),
//! validates them into a [`ScalarGrid`], and turns them into point sets for
//! rendering: every grid point passing an isovalue [`Threshold`], optionally
//! ranked by proximity to [`ReferenceAnchor`]s taken from a protein structure.
//!
//! Point sets convert to Polars DataFrames with [`points_to_df`] and
//! [`scored_points_to_df`] for writing to CSV, Parquet or JSON.

pub mod anchors;
pub mod config;
pub mod error;
pub mod grid;
pub mod pipeline;
pub mod region;
pub mod sampling;
mod utils;

// Re-export key public types
pub use anchors::{
    ligand_anchors, load_structure, parse_residue_selection, residue_anchors, ResidueSelector,
};
pub use config::{FragMapKind, PipelineConfig};
pub use error::{
    FatalGridError, GridError, GridLoadError, ParseError, PipelineError, RegionError,
    SamplingError,
};
pub use grid::coords::{derive_origin, CoordinateMapper, OriginConvention, ORIGIN_CONVENTION};
pub use grid::stats::GridStatistics;
pub use grid::validation::{GridValidator, Warning};
pub use grid::{load, parse, DataLayout, GridFormat, Placement, RawGrid, ScalarGrid};
pub use pipeline::{load_grid_file, process_file, run_pipeline, LoadedGrid, PipelineOutput};
pub use region::{
    ReferenceAnchor, RegionMode, RegionParams, RegionWeights, ScoredPoint, SpatialRegionFilter,
    ValueScale,
};
pub use sampling::{
    sample, Direction, PointSet, SamplePoint, SamplingParams, Threshold, ThresholdSampler,
};
pub use utils::{
    point_file_path, points_to_df, run_with_threads, scored_points_to_df, write_df_to_file,
    PointFileFormat,
};
