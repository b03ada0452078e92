//! mtcopy - mirror a directory tree
//!
//! Entry point for the mtcopy CLI tool. Links are re-created at the
//! destination, never followed into.

use anyhow::{bail, Context, Result};
use clap::Parser;
use mtwalk::config::{self, CommonArgs, WalkOptions};
use mtwalk::fs::CopyOptions;
use mtwalk::progress::{print_header, print_summary, ProgressReporter};
use mtwalk::walker::{CopyCollector, Traversal, WalkStats};
use mtwalk::NativeFileSystem;
use std::process::ExitCode;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "mtcopy",
    version,
    about = "Copy a directory tree with many worker threads"
)]
struct Cli {
    /// Source directory
    #[arg(value_name = "SOURCE")]
    source: String,

    /// Destination directory (created if missing)
    #[arg(value_name = "DEST")]
    destination: String,

    /// Fail on existing destination files instead of replacing them
    #[arg(long)]
    no_overwrite: bool,

    /// Do not carry source modification times onto copies
    #[arg(long)]
    no_preserve_times: bool,

    #[command(flatten)]
    common: CommonArgs,
}

fn main() -> ExitCode {
    match run() {
        Ok(0) => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<usize> {
    let cli = Cli::parse();
    config::setup_logging(cli.common.verbose);

    let mut options = WalkOptions::from_args(&cli.common).context("Invalid configuration")?;
    // Copying follows the tree as it is: links are copied as links
    if options.follow_links {
        warn!("--follow-links is ignored: links are re-created, never followed");
    }
    options.follow_links = false;

    let source = config::resolve_path(&cli.source).context("Invalid source path")?;
    let destination = config::resolve_path(&cli.destination).context("Invalid destination path")?;
    if destination.relative_to(&source).is_some() {
        bail!(
            "destination '{}' is inside the source tree '{}'",
            destination,
            source
        );
    }

    if options.show_progress {
        print_header(
            "mtcopy",
            &source.full_name(),
            Some(&destination.full_name()),
            options.worker_count,
        );
    }

    let fs = NativeFileSystem::new(options.worker_count, options.buffer_capacity);
    let stats = Arc::new(WalkStats::default());
    let reporter = if options.show_progress {
        ProgressReporter::new(Arc::clone(&stats), options.verbose)
    } else {
        ProgressReporter::hidden(Arc::clone(&stats), options.verbose)
    };

    let copy_options = CopyOptions {
        overwrite: !cli.no_overwrite,
        preserve_timestamps: !cli.no_preserve_times,
    };
    let collector = CopyCollector::new(
        &fs,
        source.clone(),
        destination,
        copy_options,
        Arc::clone(&stats),
    );
    let traversal = Traversal::new(&fs, &collector, &reporter, options.clone(), Arc::clone(&stats));

    let cancel = traversal.cancel_flag();
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupt received, finishing up...");
        cancel.store(true, Ordering::SeqCst);
    })
    .context("Failed to set signal handler")?;

    let (_, summary) = traversal.run(&source)?;
    reporter.finish_and_clear();

    print_summary(&summary);
    if !summary.errors.is_empty() {
        info!(errors = summary.errors.len(), "Copy completed with errors");
    }
    Ok(summary.errors.len())
}
