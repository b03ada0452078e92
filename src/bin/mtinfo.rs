//! mtinfo - summarize a directory tree
//!
//! Entry point for the mtinfo CLI tool.

use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use mtwalk::config::{self, CommonArgs, WalkOptions};
use mtwalk::progress::{format_number, print_header, print_summary, ProgressReporter};
use mtwalk::walker::{SummaryCollector, Traversal, WalkStats};
use mtwalk::NativeFileSystem;
use std::process::ExitCode;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(
    name = "mtinfo",
    version,
    about = "Summarize a directory tree: entry counts, sizes and errors"
)]
struct Cli {
    /// Directory to summarize
    #[arg(value_name = "DIR")]
    path: String,

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

    let options = WalkOptions::from_args(&cli.common).context("Invalid configuration")?;
    let root = config::resolve_path(&cli.path).context("Invalid path")?;

    if options.show_progress {
        print_header("mtinfo", &root.full_name(), None, options.worker_count);
    }

    let fs = NativeFileSystem::new(options.worker_count, options.buffer_capacity);
    let stats = Arc::new(WalkStats::default());
    let reporter = if options.show_progress {
        ProgressReporter::new(Arc::clone(&stats), options.verbose)
    } else {
        ProgressReporter::hidden(Arc::clone(&stats), options.verbose)
    };

    let collector = SummaryCollector;
    let traversal = Traversal::new(&fs, &collector, &reporter, options.clone(), Arc::clone(&stats));

    let cancel = traversal.cancel_flag();
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupt received, finishing up...");
        cancel.store(true, Ordering::SeqCst);
    })
    .context("Failed to set signal handler")?;

    let (tree, summary) = traversal.run(&root)?;
    reporter.finish_and_clear();

    print_summary(&summary);
    if options.show_progress {
        println!(
            "  {} {}",
            style("Tree entries:").bold(),
            format_number(tree.directories + tree.files + tree.symlinks)
        );
        println!();
    }

    if !summary.errors.is_empty() {
        info!(errors = summary.errors.len(), "Walk completed with errors");
    }
    Ok(summary.errors.len())
}
