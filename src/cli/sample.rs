use clap::Parser;
use fragmap::{
    ligand_anchors, load_grid_file, load_structure, parse_residue_selection, point_file_path,
    points_to_df, residue_anchors, run_pipeline, run_with_threads, scored_points_to_df,
    write_df_to_file, Direction, FragMapKind, GridFormat, PipelineConfig, PointFileFormat,
    ReferenceAnchor, RegionMode, RegionParams, SamplingParams, Threshold, ValueScale,
};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, trace, warn};

#[derive(Parser, Debug, Clone)]
#[command(version, about)]
pub(crate) struct Args {
    /// Grid files (.map or .dx) to sample
    #[arg(short, long = "input", required = true, num_args = 1..)]
    inputs: Vec<PathBuf>,

    /// Output directory; one file per input grid
    #[arg(short, long)]
    output: PathBuf,

    /// Output file type
    #[arg(short = 't', long, value_enum, default_value_t = PointFileFormat::Csv)]
    output_format: PointFileFormat,

    /// Grid format; detected from the extension or contents when omitted
    #[arg(long = "grid-format")]
    grid_format: Option<GridFormat>,

    /// FragMap type; inferred from the file name when omitted, apolar otherwise
    #[arg(short, long)]
    kind: Option<FragMapKind>,

    /// Isovalue cutoff (default: -1.0 for GFE maps, 0.5 for exclusion maps)
    #[arg(long, allow_hyphen_values = true)]
    threshold: Option<f32>,

    /// Which side of the cutoff to keep (default: from the map type)
    #[arg(long)]
    direction: Option<Direction>,

    /// Visit every Nth grid point along each axis
    #[arg(long, default_value_t = 1)]
    stride: usize,

    /// Keep at most this many threshold hits, strongest first
    #[arg(long = "max-points")]
    max_points: Option<usize>,

    /// PDB or mmCIF structure providing reference anchors for region filtering
    #[arg(short, long)]
    structure: Option<PathBuf>,

    /// Residues to anchor on, e.g. A:45,A:46,B:100A
    #[arg(short, long, requires = "structure", conflicts_with = "ligand")]
    residues: Option<String>,

    /// Anchor on every atom of residues with this name, e.g. a docked ligand
    #[arg(short, long, requires = "structure")]
    ligand: Option<String>,

    /// Search radius around the anchors in Å
    #[arg(short = 'd', long = "max-distance", default_value_t = 8.0)]
    max_distance: f64,

    /// Grow the search radius with the spatial extent of the anchors
    #[arg(long, default_value_t = false)]
    adaptive: bool,

    /// Region filtering strategy
    #[arg(long, value_enum, default_value_t = RegionMode::Ranked)]
    mode: RegionMode,

    /// Keep at most this many points after region filtering
    #[arg(long = "region-max-points", default_value_t = 1000)]
    region_max_points: usize,

    /// Number of threads to use for parallel processing (0 for all cores)
    #[arg(short = 'j', long = "num-threads", default_value_t = 0)]
    num_threads: usize,
}

pub(crate) fn run(args: &Args) {
    trace!("{args:?}");

    let output_path = match std::path::absolute(&args.output) {
        Ok(path) => path,
        Err(e) => {
            error!("Failed to resolve the output directory: {}", e);
            return;
        }
    };
    if let Err(e) = std::fs::create_dir_all(&output_path) {
        error!("Failed to create {}: {e}", output_path.display());
        return;
    }

    let anchors = match &args.structure {
        Some(structure) => match build_anchors(structure, args) {
            Some(anchors) => Some(anchors),
            None => return,
        },
        None => None,
    };
    if anchors.as_ref().is_some_and(|a| a.is_empty()) {
        warn!("No reference anchors found; region filtering will keep no points");
    }

    let (written, failed) = run_with_threads(args.num_threads, || {
        debug!("Using {} thread(s)", rayon::current_num_threads());
        let mut written = 0;
        let mut failed = 0;
        for input in &args.inputs {
            match process(input, &output_path, anchors.as_deref(), args) {
                Some(()) => written += 1,
                None => failed += 1,
            }
        }
        (written, failed)
    });

    info!("Wrote {written} point file(s) to {}", output_path.display());
    if failed > 0 {
        error!("{failed} of {} file(s) failed", args.inputs.len());
    }
}

fn build_anchors(structure: &Path, args: &Args) -> Option<Vec<ReferenceAnchor>> {
    let Some(structure_file) = structure.to_str() else {
        error!("Structure path {} is not valid UTF-8", structure.display());
        return None;
    };
    let pdb = match load_structure(structure_file) {
        Ok((pdb, pdb_warnings)) => {
            for e in &pdb_warnings {
                match e.level() {
                    pdbtbx::ErrorLevel::BreakingError => error!("{e}"),
                    pdbtbx::ErrorLevel::InvalidatingError => error!("{e}"),
                    _ => warn!("{e}"),
                }
            }
            pdb
        }
        Err(errors) => {
            for e in &errors {
                error!("{e}");
            }
            error!("Failed to read structure {}", structure.display());
            return None;
        }
    };

    if let Some(selection) = &args.residues {
        match parse_residue_selection(selection) {
            Ok(selectors) => Some(residue_anchors(&pdb, &selectors)),
            Err(e) => {
                error!("{e}");
                None
            }
        }
    } else if let Some(resn) = &args.ligand {
        Some(ligand_anchors(&pdb, resn))
    } else {
        error!("--structure needs either --residues or --ligand to choose anchors");
        None
    }
}

fn process(
    input: &Path,
    output_dir: &Path,
    anchors: Option<&[ReferenceAnchor]>,
    args: &Args,
) -> Option<()> {
    let loaded = match load_grid_file(input, args.grid_format) {
        Ok(loaded) => loaded,
        Err(e) => {
            error!("{e}");
            return None;
        }
    };
    for w in &loaded.warnings {
        warn!("{}: {w}", input.display());
    }

    let kind = args.kind.or(loaded.kind).unwrap_or(FragMapKind::Apolar);
    let direction = args.direction.unwrap_or(kind.direction());
    let config = PipelineConfig {
        threshold: Threshold {
            value: args.threshold.unwrap_or(kind.default_isovalue()),
            direction,
        },
        sampling: SamplingParams {
            stride: args.stride,
            max_points: args.max_points,
            parallel: true,
        },
        region: anchors.map(|_| RegionParams {
            max_distance: args.max_distance,
            max_points: args.region_max_points,
            value_scale: ValueScale::for_direction(direction),
            adaptive: args.adaptive,
            mode: args.mode,
            ..Default::default()
        }),
    };
    debug!("{}: {kind} map, {:?}", input.display(), config.threshold);

    let output = match run_pipeline(&loaded.grid, anchors.unwrap_or_default(), &config) {
        Ok(output) => output,
        Err(e) => {
            error!("{}: {e}", input.display());
            return None;
        }
    };
    if output.points.is_empty() {
        warn!(
            "{}: no points pass {} {} (values span {:.3} to {:.3})",
            input.display(),
            direction,
            config.threshold.value,
            output.statistics.min,
            output.statistics.max
        );
    }

    let df = match &output.scored {
        Some(scored) => scored_points_to_df(scored, anchors.unwrap_or_default()),
        None => points_to_df(&output.points),
    };
    let output_file = point_file_path(input, output_dir, args.output_format);
    let result = df.and_then(|mut df| write_df_to_file(&mut df, &output_file, args.output_format));
    if let Err(e) = result {
        error!("{}: failed to write points: {e}", input.display());
        return None;
    }

    info!(
        "{}: {} point(s) saved to {}",
        input.display(),
        output.points.len(),
        output_file.display()
    );
    Some(())
}
