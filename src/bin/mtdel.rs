//! mtdel - delete a directory tree
//!
//! Entry point for the mtdel CLI tool. Entries are deleted as the walk
//! discovers them; a directory is removed once its subtree is gone, and
//! the root itself is removed last.

use anyhow::{Context, Result};
use clap::Parser;
use mtwalk::config::{self, CommonArgs, WalkOptions};
use mtwalk::progress::{print_header, print_summary, ProgressReporter};
use mtwalk::walker::{DeleteCollector, Traversal, WalkStats};
use mtwalk::NativeFileSystem;
use std::io::Write;
use std::process::ExitCode;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "mtdel",
    version,
    about = "Delete a directory tree with many worker threads"
)]
struct Cli {
    /// Directory to delete
    #[arg(value_name = "DIR")]
    path: String,

    /// Skip the confirmation prompt
    #[arg(short = 'f', long)]
    force: bool,

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
    // Never delete through a link into another tree
    if options.follow_links {
        warn!("--follow-links is ignored: deletion never crosses links");
    }
    options.follow_links = false;

    let root = config::resolve_path(&cli.path).context("Invalid path")?;

    if !cli.force && !confirm(&root.full_name())? {
        println!("Aborted.");
        return Ok(0);
    }

    if options.show_progress {
        print_header("mtdel", &root.full_name(), None, options.worker_count);
    }

    let fs = NativeFileSystem::new(options.worker_count, options.buffer_capacity);
    let stats = Arc::new(WalkStats::default());
    let reporter = if options.show_progress {
        ProgressReporter::new(Arc::clone(&stats), options.verbose)
    } else {
        ProgressReporter::hidden(Arc::clone(&stats), options.verbose)
    };

    let collector = DeleteCollector::new(&fs, Arc::clone(&stats));
    let traversal = Traversal::new(&fs, &collector, &reporter, options.clone(), Arc::clone(&stats));

    let cancel = traversal.cancel_flag();
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupt received, finishing up...");
        cancel.store(true, Ordering::SeqCst);
    })
    .context("Failed to set signal handler")?;

    let (root_entry, summary) = traversal.run(&root)?;
    reporter.finish_and_clear();

    // Subtree is gone; remove the root unless parts of it survived
    let mut errors = summary.errors.len();
    if errors == 0 {
        if let Err(e) = fs.delete(&root_entry) {
            error!(path = %root_entry.path, error = %e, "failed to delete root directory");
            errors += 1;
        }
    } else {
        warn!(
            errors,
            "subtree not fully deleted, leaving the root directory in place"
        );
    }

    print_summary(&summary);
    if errors > 0 {
        info!(errors, "Delete completed with errors");
    }
    Ok(errors)
}

fn confirm(path: &str) -> Result<bool> {
    eprint!("Delete '{}' and all of its contents? [y/N] ", path);
    std::io::stderr().flush().ok();
    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .context("Failed to read confirmation")?;
    Ok(line.trim().eq_ignore_ascii_case("y"))
}
