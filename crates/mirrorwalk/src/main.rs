//! Mirrorwalk - depth-bounded object graph inspection.
//!
//! This is the main entry point for the mirrorwalk CLI.

mod diff;
mod inspect;
mod selector;

use clap::{Parser, Subcommand};
use mirrorwalk_util::log::{LogConfig, LogLevel};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mirrorwalk")]
#[command(author, version, about = "Depth-bounded object graph inspection", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Subcommand
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Walk a JSON document and write a transcript, heartbeat log and snapshot
    Inspect {
        /// Input JSON document
        graph: PathBuf,

        /// Root selector, e.g. `servers[2].config` (1-based indexing)
        #[arg(short, long)]
        root: Option<String>,

        /// Maximum recursion depth
        #[arg(short, long)]
        depth: Option<usize>,

        /// Output directory (defaults to the input file's directory)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Base name for output files (defaults to the input file stem)
        #[arg(short, long)]
        name: Option<String>,

        /// Pretty-print the snapshot
        #[arg(long)]
        pretty: bool,

        /// Walk options file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Compare two snapshots and write the difference tree
    Diff {
        /// First snapshot
        a: PathBuf,

        /// Second snapshot
        b: PathBuf,

        /// Output directory (defaults to the first snapshot's directory)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Base name for output files
        #[arg(short, long)]
        name: Option<String>,

        /// Pretty-print the diff snapshot
        #[arg(long)]
        pretty: bool,
    },
    /// Print version information
    Version,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };
    mirrorwalk_util::log::init(LogConfig {
        print: cli.verbose,
        level,
        include_location: false,
    });

    match cli.command {
        Commands::Inspect {
            graph,
            root,
            depth,
            out,
            name,
            pretty,
            config,
        } => inspect::run(inspect::InspectArgs {
            graph,
            root,
            depth,
            out,
            name,
            pretty,
            config,
        }),
        Commands::Diff {
            a,
            b,
            out,
            name,
            pretty,
        } => diff::run(diff::DiffArgs {
            a,
            b,
            out,
            name,
            pretty,
        }),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

fn print_version() {
    println!("mirrorwalk {}", env!("CARGO_PKG_VERSION"));
}
