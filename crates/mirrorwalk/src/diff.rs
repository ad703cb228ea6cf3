//! The `diff` subcommand: compare two snapshots and persist the result.

use crate::inspect::{file_base, output_dir};
use anyhow::{Context, Result};
use mirrorwalk_core::MemoryGraph;
use mirrorwalk_snapshot::{read_snapshot, write_snapshot};
use mirrorwalk_util::path::unique_path;
use mirrorwalk_util::TimingGuard;
use mirrorwalk_walker::{GraphWalker, WalkOptions};
use std::fs::File;
use std::io::{LineWriter, Write};
use std::path::PathBuf;
use tracing::info;

pub struct DiffArgs {
    pub a: PathBuf,
    pub b: PathBuf,
    pub out: Option<PathBuf>,
    pub name: Option<String>,
    pub pretty: bool,
}

pub fn run(args: DiffArgs) -> Result<()> {
    let left = read_snapshot(&args.a).with_context(|| format!("reading {}", args.a.display()))?;
    let right = read_snapshot(&args.b).with_context(|| format!("reading {}", args.b.display()))?;

    let outcome = {
        let _timing = TimingGuard::diff(format!(
            "{} vs {}",
            args.a.display(),
            args.b.display()
        ));
        mirrorwalk_diff::compare(Some(&left), Some(&right))
    };
    let Some(diff) = outcome else {
        println!("no differences");
        return Ok(());
    };

    let out_dir = output_dir(args.out.as_deref(), &args.a);
    let base = match &args.name {
        Some(name) => name.clone(),
        None => format!("{}-diff", file_base(&args.a)),
    };

    // The diff tree is itself a mirror tree; lifting it back into a graph
    // lets the walker render the same transcript format for it. Diff trees
    // are sparse, so the walk is not depth-bounded.
    let transcript_path = unique_path(&out_dir, &base, "txt");
    let transcript = LineWriter::new(
        File::create(&transcript_path)
            .with_context(|| format!("creating {}", transcript_path.display()))?,
    );
    let (graph, root) = MemoryGraph::from_mirror(&diff);
    let options = WalkOptions {
        max_depth: usize::MAX,
        ..Default::default()
    };
    let mut walker = GraphWalker::new(&graph, transcript, options);
    walker.walk(root)?;
    let (mut transcript, _) = walker.into_parts();
    transcript.flush()?;

    let snapshot_path = write_snapshot(&out_dir, &base, &diff, args.pretty)?;

    info!(
        transcript = %transcript_path.display(),
        snapshot = %snapshot_path.display(),
        "diff written"
    );
    println!("transcript: {}", transcript_path.display());
    println!("snapshot:   {}", snapshot_path.display());
    Ok(())
}
