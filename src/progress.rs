//! Progress reporting for the mtwalk tools
//!
//! Provides real-time progress display using indicatif progress bars.
//! The reporter consumes worker pulses through the [`WalkMonitor`] seam:
//! a pulse is a cheap atomic bump on the worker side, and the reporter
//! rate-limits the actual terminal updates itself.

use crate::error::WalkError;
use crate::walker::{WalkMonitor, WalkStats, WalkSummary};
use console::style;
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

/// Minimum interval between terminal updates
const UPDATE_INTERVAL_MS: u64 = 100;

/// Progress reporter that displays walk status
pub struct ProgressReporter {
    bar: ProgressBar,

    /// Live counters shared with the walk
    stats: Arc<WalkStats>,

    started: Instant,

    /// Milliseconds since `started` of the last terminal update
    last_update: AtomicU64,

    /// Log individual errors as they arrive
    verbose: bool,
}

impl ProgressReporter {
    pub fn new(stats: Arc<WalkStats>, verbose: bool) -> Self {
        let bar = ProgressBar::new_spinner();

        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .expect("Invalid progress template")
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );

        bar.enable_steady_tick(Duration::from_millis(100));

        Self {
            bar,
            stats,
            started: Instant::now(),
            last_update: AtomicU64::new(0),
            verbose,
        }
    }

    /// A reporter that swallows all output (quiet mode) but still logs
    /// errors in verbose runs.
    pub fn hidden(stats: Arc<WalkStats>, verbose: bool) -> Self {
        let reporter = Self::new(stats, verbose);
        reporter.bar.finish_and_clear();
        reporter
    }

    fn refresh(&self) {
        let dirs = self.stats.directories.load(Ordering::Relaxed);
        let files = self.stats.files.load(Ordering::Relaxed);
        let bytes = self.stats.bytes.load(Ordering::Relaxed);
        let errors = self.stats.error_count();

        let elapsed = self.started.elapsed().as_secs_f64();
        let rate = if elapsed > 0.0 { dirs as f64 / elapsed } else { 0.0 };

        let mut msg = format!(
            "Dirs: {} | Files: {} | Size: {} | Rate: {:.0} dirs/s",
            format_number(dirs),
            format_number(files),
            format_size(bytes, BINARY),
            rate,
        );
        if errors > 0 {
            msg.push_str(&format!(" | Errors: {}", errors));
        }
        self.bar.set_message(msg);
    }

    /// Finish and clear the progress display
    pub fn finish_and_clear(&self) {
        self.bar.finish_and_clear();
    }
}

impl WalkMonitor for ProgressReporter {
    fn on_pulse(&self) {
        let now = self.started.elapsed().as_millis() as u64;
        let last = self.last_update.load(Ordering::Relaxed);
        if now.saturating_sub(last) < UPDATE_INTERVAL_MS {
            return;
        }
        // One worker wins the update; the rest return to work
        if self
            .last_update
            .compare_exchange(last, now, Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
        {
            self.refresh();
        }
    }

    fn on_error(&self, error: &WalkError) {
        if self.verbose {
            warn!(path = %error.path, error = %error.error, "walk error");
        }
    }
}

/// Format a number with thousands separators
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let bytes: Vec<_> = s.bytes().rev().collect();

    let chunks: Vec<String> = bytes
        .chunks(3)
        .map(|chunk| chunk.iter().rev().map(|&b| b as char).collect::<String>())
        .collect();

    chunks.into_iter().rev().collect::<Vec<_>>().join(",")
}

/// Print a header at the start of a walk
pub fn print_header(tool: &str, source: &str, destination: Option<&str>, workers: usize) {
    println!();
    println!("{} {}", style(tool).cyan().bold(), env!("CARGO_PKG_VERSION"));
    println!("{}", style("─".repeat(50)).dim());
    println!("  {} {}", style("Source:").bold(), source);
    if let Some(destination) = destination {
        println!("  {} {}", style("Destination:").bold(), destination);
    }
    println!("  {} {}", style("Workers:").bold(), workers);
    println!();
}

/// Print a summary of the walk results
pub fn print_summary(summary: &WalkSummary) {
    let duration_secs = summary.elapsed.as_secs_f64();

    println!();
    println!("{}", style("Walk Complete").green().bold());
    println!("{}", style("─".repeat(50)).dim());
    println!(
        "  {} {}",
        style("Directories:").bold(),
        format_number(summary.directories)
    );
    println!(
        "  {} {}",
        style("Files:").bold(),
        format_number(summary.files)
    );
    if summary.symlinks > 0 {
        println!(
            "  {} {}",
            style("Links:").bold(),
            format_number(summary.symlinks)
        );
    }
    println!(
        "  {} {}",
        style("Total Size:").bold(),
        format_size(summary.bytes, BINARY)
    );
    if summary.copied_files > 0 {
        println!(
            "  {} {} ({})",
            style("Copied:").bold(),
            format_number(summary.copied_files),
            format_size(summary.copied_bytes, BINARY)
        );
    }
    if summary.deleted_entries > 0 {
        println!(
            "  {} {}",
            style("Deleted:").bold(),
            format_number(summary.deleted_entries)
        );
    }
    println!(
        "  {} {:.1}s ({:.0} dirs/sec)",
        style("Duration:").bold(),
        duration_secs,
        summary.dirs_per_second()
    );
    if !summary.errors.is_empty() {
        println!(
            "  {} {}",
            style("Errors:").yellow().bold(),
            format_number(summary.errors.len() as u64)
        );
        for error in summary.errors.iter().take(10) {
            println!("    {}", style(error.to_string()).yellow());
        }
        if summary.errors.len() > 10 {
            println!(
                "    {} more (run with -v for all)",
                summary.errors.len() - 10
            );
        }
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234567), "1,234,567");
        assert_eq!(format_number(1234567890), "1,234,567,890");
    }
}
