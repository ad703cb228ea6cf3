//! The `inspect` subcommand: load a JSON document, walk it, and persist
//! the transcript, heartbeat log and snapshot.

use crate::selector;
use anyhow::{Context, Result};
use mirrorwalk_core::MemoryGraph;
use mirrorwalk_snapshot::write_snapshot;
use mirrorwalk_util::path::unique_path;
use mirrorwalk_util::TimingGuard;
use mirrorwalk_walker::{GraphWalker, HeartbeatLog, HeartbeatThresholds, WalkOptions};
use std::fs::File;
use std::io::{LineWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

pub struct InspectArgs {
    pub graph: PathBuf,
    pub root: Option<String>,
    pub depth: Option<usize>,
    pub out: Option<PathBuf>,
    pub name: Option<String>,
    pub pretty: bool,
    pub config: Option<PathBuf>,
}

pub fn run(args: InspectArgs) -> Result<()> {
    let mut options = load_options(args.config.as_deref())?;
    if let Some(depth) = args.depth {
        options.max_depth = depth;
    }

    let text = std::fs::read_to_string(&args.graph)
        .with_context(|| format!("reading {}", args.graph.display()))?;
    let document: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("parsing {}", args.graph.display()))?;
    let (graph, document_root) = MemoryGraph::from_json(&document);

    // Selector failures are fatal before any sink is opened.
    let root = match &args.root {
        Some(expr) => selector::select(&graph, document_root, expr)
            .with_context(|| format!("evaluating root selector '{expr}'"))?,
        None => document_root,
    };

    let out_dir = output_dir(args.out.as_deref(), &args.graph);
    let base = match &args.name {
        Some(name) => name.clone(),
        None => file_base(&args.graph),
    };

    let transcript_path = unique_path(&out_dir, &base, "txt");
    let heartbeat_path = unique_path(&out_dir, &base, "log");
    let transcript = LineWriter::new(
        File::create(&transcript_path)
            .with_context(|| format!("creating {}", transcript_path.display()))?,
    );
    let heartbeat = HeartbeatLog::create(&heartbeat_path, HeartbeatThresholds::default())
        .with_context(|| format!("creating {}", heartbeat_path.display()))?;

    info!(
        graph = %args.graph.display(),
        transcript = %transcript_path.display(),
        heartbeat = %heartbeat_path.display(),
        "starting walk"
    );
    let mirror = {
        let _timing = TimingGuard::walk(args.graph.display().to_string());
        let mut walker = GraphWalker::new(&graph, transcript, options).with_heartbeat(heartbeat);
        let mirror = walker.walk(root)?;
        let (mut transcript, _) = walker.into_parts();
        transcript.flush()?;
        mirror
    };

    let snapshot_path = {
        let _timing = TimingGuard::encode(base.clone());
        write_snapshot(&out_dir, &base, &mirror, args.pretty)?
    };

    println!("transcript: {}", transcript_path.display());
    println!("heartbeat:  {}", heartbeat_path.display());
    println!("snapshot:   {}", snapshot_path.display());
    Ok(())
}

fn load_options(config: Option<&Path>) -> Result<WalkOptions> {
    let Some(path) = config else {
        return Ok(WalkOptions::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

/// Output directory: `--out` if given, else next to the input document.
pub fn output_dir(out: Option<&Path>, input: &Path) -> PathBuf {
    match out {
        Some(dir) => dir.to_path_buf(),
        None => input
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
    }
}

/// Base name for output files: the input file name with all extensions
/// stripped (`graph.json` and `a.snap.json` both reduce to their stem).
pub fn file_base(input: &Path) -> String {
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "walk".to_string());
    match name.split_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => name,
    }
}
