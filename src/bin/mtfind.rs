//! mtfind - find entries by name across a directory tree
//!
//! Entry point for the mtfind CLI tool.

use anyhow::{Context, Result};
use clap::Parser;
use mtwalk::config::{self, CommonArgs, WalkOptions};
use mtwalk::progress::{format_number, print_header, ProgressReporter};
use mtwalk::walker::{MatchCollector, Traversal, WalkStats};
use mtwalk::NativeFileSystem;
use std::process::ExitCode;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(
    name = "mtfind",
    version,
    about = "Find entries whose name matches a wildcard pattern"
)]
struct Cli {
    /// Name pattern with * and ? wildcards (case-insensitive)
    #[arg(value_name = "PATTERN")]
    pattern: String,

    /// Directory to search
    #[arg(value_name = "DIR", default_value = ".")]
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
    config::validate_pattern(&cli.pattern).context("Invalid pattern")?;
    let root = config::resolve_path(&cli.path).context("Invalid path")?;

    if options.show_progress {
        print_header("mtfind", &root.full_name(), None, options.worker_count);
    }

    let fs = NativeFileSystem::new(options.worker_count, options.buffer_capacity);
    let stats = Arc::new(WalkStats::default());
    let reporter = if options.show_progress {
        ProgressReporter::new(Arc::clone(&stats), options.verbose)
    } else {
        ProgressReporter::hidden(Arc::clone(&stats), options.verbose)
    };

    let collector = MatchCollector::new(&cli.pattern);
    let traversal = Traversal::new(&fs, &collector, &reporter, options.clone(), Arc::clone(&stats));

    let cancel = traversal.cancel_flag();
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupt received, finishing up...");
        cancel.store(true, Ordering::SeqCst);
    })
    .context("Failed to set signal handler")?;

    let (_, summary) = traversal.run(&root)?;
    reporter.finish_and_clear();

    let mut matches = collector.take_matches();
    matches.sort_by(|a, b| a.path.cmp(&b.path));
    for hit in &matches {
        println!("{}", hit.path);
    }
    if options.show_progress {
        eprintln!(
            "\n{} matches in {} directories ({:.1}s)",
            format_number(matches.len() as u64),
            format_number(summary.directories),
            summary.elapsed.as_secs_f64()
        );
    }

    if !summary.errors.is_empty() {
        info!(errors = summary.errors.len(), "Walk completed with errors");
        for err in &summary.errors {
            eprintln!("mtfind: {}", err);
        }
    }
    Ok(summary.errors.len())
}
