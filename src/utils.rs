use crate::region::{ReferenceAnchor, ScoredPoint};
use crate::sampling::SamplePoint;
use polars::prelude::*;
use std::path::{Path, PathBuf};

/// Run `f` on a dedicated rayon pool with `num_threads` workers (0 for all cores).
pub fn run_with_threads<F, R>(num_threads: usize, f: F) -> R
where
    F: FnOnce() -> R + Send,
    R: Send,
{
    match rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build()
    {
        Ok(pool) => pool.install(f),
        Err(e) => {
            tracing::warn!("Falling back to the global thread pool: {e}");
            f()
        }
    }
}

/// Convert sample points into a DataFrame with columns `x, y, z, value`.
pub fn points_to_df(points: &[SamplePoint]) -> PolarsResult<DataFrame> {
    df!(
        "x" => points.iter().map(|p| p.x).collect::<Vec<f64>>(),
        "y" => points.iter().map(|p| p.y).collect::<Vec<f64>>(),
        "z" => points.iter().map(|p| p.z).collect::<Vec<f64>>(),
        "value" => points.iter().map(|p| p.value).collect::<Vec<f32>>(),
    )
}

/// Convert ranked points into a DataFrame, keeping the ranking order and
/// adding `rank, nearest_anchor, min_distance, proximity_score, value_score, composite_score`.
///
/// `anchors` must be the slice the points were ranked against. `nearest_anchor`
/// holds the anchor label, or `#<index>` for unlabelled anchors.
pub fn scored_points_to_df(
    points: &[ScoredPoint],
    anchors: &[ReferenceAnchor],
) -> PolarsResult<DataFrame> {
    let anchor_name = |n: usize| match anchors.get(n).and_then(|a| a.label.as_deref()) {
        Some(label) => label.to_string(),
        None => format!("#{n}"),
    };
    df!(
        "rank" => (1..=points.len() as u32).collect::<Vec<u32>>(),
        "nearest_anchor" => points.iter().map(|s| anchor_name(s.nearest_anchor)).collect::<Vec<String>>(),
        "x" => points.iter().map(|s| s.point.x).collect::<Vec<f64>>(),
        "y" => points.iter().map(|s| s.point.y).collect::<Vec<f64>>(),
        "z" => points.iter().map(|s| s.point.z).collect::<Vec<f64>>(),
        "value" => points.iter().map(|s| s.point.value).collect::<Vec<f32>>(),
        "min_distance" => points.iter().map(|s| s.min_distance).collect::<Vec<f64>>(),
        "proximity_score" => points.iter().map(|s| s.proximity_score).collect::<Vec<f64>>(),
        "value_score" => points.iter().map(|s| s.value_score).collect::<Vec<f64>>(),
        "composite_score" => points.iter().map(|s| s.composite_score).collect::<Vec<f64>>(),
    )
}

/// Output path for the points of `input` inside `output_dir`.
///
/// The whole input file name is kept, so `3fly.apolar.map` and `3fly.apolar.dx`
/// become `3fly.apolar.map.csv` and `3fly.apolar.dx.csv`.
pub fn point_file_path(input: &Path, output_dir: &Path, format: PointFileFormat) -> PathBuf {
    let name = input.file_name().unwrap_or("points".as_ref()).to_string_lossy();
    output_dir.join(format!("{name}.{}", format.extension()))
}

/// Write a point DataFrame to exactly `file_path`.
pub fn write_df_to_file(
    df: &mut DataFrame,
    file_path: &Path,
    format: PointFileFormat,
) -> PolarsResult<()> {
    let mut file = std::fs::File::create(file_path)?;
    match format {
        PointFileFormat::Csv => CsvWriter::new(&mut file).finish(df),
        PointFileFormat::Parquet => ParquetWriter::new(&mut file).finish(df).map(|_| ()),
        PointFileFormat::Json | PointFileFormat::NdJson => JsonWriter::new(&mut file)
            .with_json_format(format.json_format())
            .finish(df),
    }
}

/// On-disk format for point sets.
#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PointFileFormat {
    /// Comma-separated values
    #[default]
    Csv,
    /// Parquet columnar storage
    Parquet,
    /// A single JSON document
    Json,
    /// One JSON object per point
    #[value(name = "ndjson")]
    NdJson,
}

impl PointFileFormat {
    /// File extension, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            PointFileFormat::Csv => "csv",
            PointFileFormat::Parquet => "parquet",
            PointFileFormat::Json => "json",
            PointFileFormat::NdJson => "ndjson",
        }
    }

    fn json_format(self) -> JsonFormat {
        match self {
            PointFileFormat::NdJson => JsonFormat::JsonLines,
            _ => JsonFormat::Json,
        }
    }
}

impl std::fmt::Display for PointFileFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::{RegionParams, ReferenceAnchor, SpatialRegionFilter};
    use nalgebra as na;

    fn points() -> Vec<SamplePoint> {
        vec![
            SamplePoint {
                x: 0.0,
                y: 1.0,
                z: 2.0,
                value: -1.5,
            },
            SamplePoint {
                x: 3.0,
                y: 4.0,
                z: 5.0,
                value: -0.5,
            },
        ]
    }

    #[test]
    fn point_columns() {
        let df = points_to_df(&points()).unwrap();
        assert_eq!(df.height(), 2);
        let names: Vec<&str> = df.get_column_names().iter().map(|s| s.as_str()).collect();
        assert_eq!(names, ["x", "y", "z", "value"]);
        let values = df.column("value").unwrap().f32().unwrap();
        assert_eq!(values.get(0), Some(-1.5));
    }

    #[test]
    fn scored_columns_keep_rank_order() {
        let filter = SpatialRegionFilter::new(RegionParams::default()).unwrap();
        let anchors = vec![ReferenceAnchor::new(na::Point3::new(3.0, 4.0, 5.0))];
        let scored = filter.rank(&points(), &anchors);
        let df = scored_points_to_df(&scored, &anchors).unwrap();
        assert_eq!(df.height(), 2);
        let x = df.column("x").unwrap().f64().unwrap();
        // The point sitting on the anchor ranks first
        assert_eq!(x.get(0), Some(3.0));
        let rank = df.column("rank").unwrap().u32().unwrap();
        assert_eq!(rank.get(1), Some(2));
    }

    #[test]
    fn nearest_anchor_column_uses_labels() {
        let filter = SpatialRegionFilter::new(RegionParams::default()).unwrap();
        let anchors = vec![
            ReferenceAnchor::with_label(na::Point3::new(0.0, 1.0, 2.0), "A:45 LEU"),
            ReferenceAnchor::new(na::Point3::new(3.0, 4.0, 5.0)),
        ];
        let scored = filter.rank(&points(), &anchors);
        let df = scored_points_to_df(&scored, &anchors).unwrap();
        let mut nearest: Vec<String> = df
            .column("nearest_anchor")
            .unwrap()
            .str()
            .unwrap()
            .into_no_null_iter()
            .map(str::to_string)
            .collect();
        nearest.sort();
        assert_eq!(nearest, ["#1", "A:45 LEU"]);
    }

    #[test]
    fn point_files_keep_the_source_extension() {
        let out = Path::new("/tmp/out");
        let map = point_file_path(Path::new("maps/3fly.apolar.map"), out, PointFileFormat::Csv);
        let dx = point_file_path(Path::new("maps/3fly.apolar.dx"), out, PointFileFormat::Csv);
        assert_eq!(map, out.join("3fly.apolar.map.csv"));
        assert_eq!(dx, out.join("3fly.apolar.dx.csv"));
        assert_ne!(map, dx);
        assert_eq!(
            point_file_path(Path::new("grid"), out, PointFileFormat::NdJson),
            out.join("grid.ndjson")
        );
    }

    #[test]
    fn writes_csv_to_the_exact_path() {
        let dir = std::env::temp_dir().join("fragmap-utils-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = point_file_path(Path::new("pocket.excl.dx"), &dir, PointFileFormat::Csv);
        let mut df = points_to_df(&points()).unwrap();
        write_df_to_file(&mut df, &path, PointFileFormat::Csv).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("x,y,z,value"));
        assert_eq!(text.lines().count(), 3);
    }

    #[test]
    fn empty_point_set() {
        let df = points_to_df(&[]).unwrap();
        assert_eq!(df.height(), 0);
        assert_eq!(df.width(), 4);
    }

    #[test]
    fn thread_pool_runs_closure() {
        let n = run_with_threads(2, rayon::current_num_threads);
        assert_eq!(n, 2);
    }
}
