mod cli {
    pub(crate) mod sample;
    pub(crate) mod stats;
}

use clap::{Parser, Subcommand};
use tracing::Level;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity of the program:
    /// -v for info, -vv for debug, and -vvv for trace
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print statistics and validation warnings for grid files
    Stats(cli::stats::Args),

    /// Extract threshold (and optionally region) filtered points from grid files
    Sample(cli::sample::Args),
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    match &cli.command {
        Commands::Stats(args) => cli::stats::run(args),
        Commands::Sample(args) => cli::sample::run(args),
    }
}
