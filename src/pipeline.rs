//! End-to-end processing: file → validated grid → point set → region ranking.

use std::path::{Path, PathBuf};

use tracing::{debug, info, trace};

use crate::config::{FragMapKind, PipelineConfig};
use crate::error::{GridError, GridLoadError, PipelineError};
use crate::grid::stats::GridStatistics;
use crate::grid::validation::Warning;
use crate::grid::{self, GridFormat, ScalarGrid};
use crate::region::{ReferenceAnchor, RegionMode, ScoredPoint, SpatialRegionFilter};
use crate::sampling::{PointSet, ThresholdSampler};

/// A validated grid together with where it came from and what was fixed up.
#[derive(Clone, Debug)]
pub struct LoadedGrid {
    /// Source file
    pub path: PathBuf,
    /// The validated field
    pub grid: ScalarGrid,
    /// Parse and validation warnings, in that order
    pub warnings: Vec<Warning>,
    /// Map type inferred from the file name, if recognisable
    pub kind: Option<FragMapKind>,
}

/// Read, parse and validate one grid file.
///
/// With `format = None` the format is detected from the extension or contents.
/// Errors carry the path so callers loading several maps can report which one failed.
pub fn load_grid_file(path: &Path, format: Option<GridFormat>) -> Result<LoadedGrid, GridLoadError> {
    let tag = |source: GridError| GridLoadError {
        path: path.to_path_buf(),
        source,
    };

    let text = std::fs::read_to_string(path).map_err(|e| tag(e.into()))?;
    let format = match format {
        Some(f) => f,
        None => GridFormat::detect(path, &text).map_err(|e| tag(e.into()))?,
    };
    trace!("Reading {} as {format}", path.display());

    let (grid, warnings) = grid::load(&text, format).map_err(tag)?;
    debug!(
        "Loaded {}: {:?} points, fast stats {:?}",
        path.display(),
        grid.dimensions(),
        GridStatistics::fast_estimate(grid.values())
    );

    Ok(LoadedGrid {
        path: path.to_path_buf(),
        grid,
        warnings,
        kind: FragMapKind::from_path(path),
    })
}

/// Result of [`run_pipeline`].
#[derive(Clone, Debug)]
pub struct PipelineOutput {
    /// Final points for rendering
    pub points: PointSet,
    /// Per-point scores when ranked region filtering ran
    pub scored: Option<Vec<ScoredPoint>>,
    /// Full statistics of the grid
    pub statistics: GridStatistics,
    /// Number of points passing the threshold before region filtering
    pub sampled: usize,
}

/// Sample `grid` and, if configured, filter around `anchors`.
///
/// An empty anchor set with region filtering enabled yields an empty point set.
pub fn run_pipeline(
    grid: &ScalarGrid,
    anchors: &[ReferenceAnchor],
    config: &PipelineConfig,
) -> Result<PipelineOutput, PipelineError> {
    let statistics = grid.statistics();
    let sampled_points = ThresholdSampler::new(grid).sample(config.threshold, &config.sampling)?;
    let sampled = sampled_points.len();

    let (points, scored) = match &config.region {
        None => (sampled_points, None),
        Some(params) => {
            let filter = SpatialRegionFilter::new(params.clone())?;
            match params.mode {
                RegionMode::Ranked => {
                    let scored = filter.rank(&sampled_points, anchors);
                    (scored.iter().map(|s| s.point).collect(), Some(scored))
                }
                RegionMode::BoundingBox => (filter.filter(&sampled_points, anchors), None),
            }
        }
    };
    info!(
        "{} of {} grid points selected ({} passed the threshold)",
        points.len(),
        grid.len(),
        sampled
    );

    Ok(PipelineOutput {
        points,
        scored,
        statistics,
        sampled,
    })
}

/// [`load_grid_file`] followed by [`run_pipeline`].
pub fn process_file(
    path: &Path,
    format: Option<GridFormat>,
    anchors: &[ReferenceAnchor],
    config: &PipelineConfig,
) -> Result<(LoadedGrid, PipelineOutput), PipelineError> {
    let loaded = load_grid_file(path, format)?;
    let output = run_pipeline(&loaded.grid, anchors, config)?;
    Ok((loaded, output))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FatalGridError, ParseError};
    use crate::region::RegionParams;
    use crate::sampling::{SamplingParams, Threshold};
    use nalgebra as na;

    fn fixture(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("test-data").join(name)
    }

    #[test]
    fn loads_native_fixture() {
        let loaded = load_grid_file(&fixture("3x3x3.apolar.gfe.map"), None).unwrap();
        assert_eq!(loaded.kind, Some(FragMapKind::Apolar));
        assert!(loaded.warnings.is_empty());
        assert_eq!(loaded.grid.format(), GridFormat::Native);
        assert_eq!(loaded.grid.origin(), na::Point3::new(9.25, 9.25, 9.25));
        assert_eq!(
            loaded.grid.metadata().get("MACROMOLECULE").map(String::as_str),
            Some("pocket.pdbqt")
        );
    }

    #[test]
    fn loads_opendx_fixture() {
        let loaded = load_grid_file(&fixture("3x3x3.excl.dx"), None).unwrap();
        assert_eq!(loaded.kind, Some(FragMapKind::Exclusion));
        assert_eq!(loaded.grid.format(), GridFormat::OpenDx);
        // The file marks every i == 2 point as excluded
        assert_eq!(loaded.grid.value_at(2, 0, 1), Some(1.0));
        assert_eq!(loaded.grid.value_at(1, 2, 2), Some(0.0));
    }

    #[test]
    fn exclusion_map_end_to_end() {
        let loaded = load_grid_file(&fixture("3x3x3.excl.dx"), None).unwrap();
        let config = PipelineConfig::for_kind(FragMapKind::Exclusion);
        let output = run_pipeline(&loaded.grid, &[], &config).unwrap();
        assert_eq!(output.points.len(), 9);
        assert!(output
            .points
            .iter()
            .all(|p| (p.x - 9.75).abs() < 1e-9 && p.value == 1.0));
    }

    #[test]
    fn region_ranking_end_to_end() {
        let loaded = load_grid_file(&fixture("3x3x3.apolar.gfe.map"), None).unwrap();
        let config = PipelineConfig {
            threshold: Threshold::favorable(-0.5),
            sampling: SamplingParams::default(),
            region: Some(RegionParams {
                max_distance: 0.6,
                max_points: 3,
                ..Default::default()
            }),
        };
        // (2, 2, 2) itself is +0.5 and fails the threshold; its three lower
        // neighbours sit 0.5 Å away at -1.25
        assert_eq!(loaded.grid.value_at(2, 2, 2), Some(0.5));
        let anchors = vec![ReferenceAnchor::new(loaded.grid.to_world(2, 2, 2))];
        let output = run_pipeline(&loaded.grid, &anchors, &config).unwrap();

        let scored = output.scored.unwrap();
        assert_eq!(scored.len(), 3);
        assert_eq!(output.points.len(), 3);
        assert!(scored
            .iter()
            .all(|s| (s.min_distance - 0.5).abs() < 1e-9 && s.point.value == -1.25));
        assert!(output.sampled > scored.len());
    }

    #[test]
    fn region_filter_without_anchors_is_empty() {
        let loaded = load_grid_file(&fixture("3x3x3.apolar.gfe.map"), None).unwrap();
        let config = PipelineConfig {
            region: Some(RegionParams::default()),
            ..Default::default()
        };
        let output = run_pipeline(&loaded.grid, &[], &config).unwrap();
        assert!(output.points.is_empty());
        assert!(output.sampled > 0);
    }

    #[test]
    fn failures_name_the_file() {
        let dir = std::env::temp_dir().join("fragmap-pipeline-test");
        std::fs::create_dir_all(&dir).unwrap();

        let nan = dir.join("broken.hbdon.gfe.map");
        std::fs::write(&nan, "SPACING 1\nNELEMENTS 2 1 1\nCENTER 0 0 0\n0.1\nnan\n").unwrap();
        let err = load_grid_file(&nan, None).unwrap_err();
        assert_eq!(err.path, nan);
        assert!(matches!(
            err.source,
            GridError::Invalid(FatalGridError::NonFiniteValue { index: 1, .. })
        ));
        assert!(err.to_string().contains("broken.hbdon.gfe.map"));

        let headless = dir.join("headless.map");
        std::fs::write(&headless, "SPACING 1\nCENTER 0 0 0\n0.1\n").unwrap();
        let err = load_grid_file(&headless, None).unwrap_err();
        assert!(matches!(
            err.source,
            GridError::Parse(ParseError::MissingField("NELEMENTS"))
        ));

        let missing = dir.join("does-not-exist.map");
        let err = load_grid_file(&missing, None).unwrap_err();
        assert!(matches!(err.source, GridError::Io(_)));
    }
}
