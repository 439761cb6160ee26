use clap::Parser;
use fragmap::{load_grid_file, FragMapKind, GridFormat, LoadedGrid};
use std::path::PathBuf;
use tracing::{error, trace, warn};

#[derive(Parser, Debug, Clone)]
#[command(version, about)]
pub(crate) struct Args {
    /// Grid files (.map or .dx) to summarise
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Grid format; detected from the extension or contents when omitted
    #[arg(short, long)]
    format: Option<GridFormat>,
}

pub(crate) fn run(args: &Args) {
    trace!("{args:?}");

    let mut failed = 0;
    for input in &args.inputs {
        match load_grid_file(input, args.format) {
            Ok(loaded) => report(&loaded),
            Err(e) => {
                error!("{e}");
                failed += 1;
            }
        }
    }

    if failed > 0 {
        error!("{failed} of {} file(s) could not be read", args.inputs.len());
    }
}

fn report(loaded: &LoadedGrid) {
    for w in &loaded.warnings {
        warn!("{}: {w}", loaded.path.display());
    }

    let grid = &loaded.grid;
    let stats = grid.statistics();
    let [nx, ny, nz] = grid.dimensions();
    let spacing = grid.spacing();
    let origin = grid.origin();
    let kind = loaded.kind;
    let direction = kind.unwrap_or(FragMapKind::Apolar).direction();

    println!("{}", loaded.path.display());
    println!("  format      {}", grid.format());
    println!(
        "  kind        {}",
        kind.map_or_else(|| "unknown".to_string(), |k| k.to_string())
    );
    println!("  dimensions  {nx} x {ny} x {nz} ({} points)", grid.len());
    println!(
        "  spacing     {:.3} {:.3} {:.3}",
        spacing.x, spacing.y, spacing.z
    );
    println!(
        "  origin      {:.3} {:.3} {:.3}",
        origin.x, origin.y, origin.z
    );
    println!("  min / max   {:.4} / {:.4}", stats.min, stats.max);
    println!("  mean ± sd   {:.4} ± {:.4}", stats.mean, stats.std_dev);
    println!(
        "  suggested   {:.3} ({direction})",
        stats.suggest_threshold(direction)
    );
}
