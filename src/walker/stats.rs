//! Traversal statistics
//!
//! One `WalkStats` is shared by every worker for the duration of a walk:
//! plain relaxed atomics for the counters, a mutex only for the error list.
//! `snapshot` folds the counters into the final [`WalkSummary`].

use crate::error::{FsError, WalkError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Statistics collected during a walk
#[derive(Debug, Default)]
pub struct WalkStats {
    /// Directories traversed
    pub directories: AtomicU64,

    /// Plain files seen
    pub files: AtomicU64,

    /// Symlinks and junctions seen
    pub symlinks: AtomicU64,

    /// Sum of file sizes seen
    pub bytes: AtomicU64,

    /// Files copied (mtcopy)
    pub copied_files: AtomicU64,

    /// Bytes copied (mtcopy)
    pub copied_bytes: AtomicU64,

    /// Entries deleted (mtdel)
    pub deleted_entries: AtomicU64,

    /// Directories skipped (access denied, cycles, etc.)
    pub skipped: AtomicU64,

    /// Progress pulse counter, bumped once per unit of work
    pub pulses: AtomicU64,

    /// Errors recorded against the paths that produced them
    errors: Mutex<Vec<WalkError>>,
}

impl WalkStats {
    pub fn record_directory(&self) {
        self.directories.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_file(&self, bytes: u64) {
        self.files.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_symlink(&self) {
        self.symlinks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_copied(&self, bytes: u64) {
        self.copied_files.fetch_add(1, Ordering::Relaxed);
        self.copied_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_deleted(&self) {
        self.deleted_entries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skip(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_pulse(&self) {
        self.pulses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self, path: String, error: FsError) {
        self.errors.lock().push(WalkError { path, error });
    }

    pub fn error_count(&self) -> usize {
        self.errors.lock().len()
    }

    /// Fold the live counters into an owned summary.
    pub fn snapshot(&self, elapsed: Duration) -> WalkSummary {
        WalkSummary {
            directories: self.directories.load(Ordering::Relaxed),
            files: self.files.load(Ordering::Relaxed),
            symlinks: self.symlinks.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
            copied_files: self.copied_files.load(Ordering::Relaxed),
            copied_bytes: self.copied_bytes.load(Ordering::Relaxed),
            deleted_entries: self.deleted_entries.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            errors: self.errors.lock().clone(),
            elapsed,
        }
    }
}

/// Final result of a walk
#[derive(Debug, Clone)]
pub struct WalkSummary {
    pub directories: u64,
    pub files: u64,
    pub symlinks: u64,
    pub bytes: u64,
    pub copied_files: u64,
    pub copied_bytes: u64,
    pub deleted_entries: u64,
    pub skipped: u64,
    pub errors: Vec<WalkError>,
    pub elapsed: Duration,
}

impl WalkSummary {
    /// Directories traversed per second
    pub fn dirs_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.directories as f64 / secs
        } else {
            0.0
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_recording() {
        let stats = WalkStats::default();

        stats.record_directory();
        stats.record_file(1024);
        stats.record_file(76);
        stats.record_symlink();
        stats.record_copied(512);
        stats.record_deleted();
        stats.record_error(
            "/test".into(),
            FsError::AccessDenied {
                path: "/test".into(),
            },
        );

        let summary = stats.snapshot(Duration::from_secs(2));
        assert_eq!(summary.directories, 1);
        assert_eq!(summary.files, 2);
        assert_eq!(summary.bytes, 1100);
        assert_eq!(summary.symlinks, 1);
        assert_eq!(summary.copied_files, 1);
        assert_eq!(summary.copied_bytes, 512);
        assert_eq!(summary.deleted_entries, 1);
        assert_eq!(summary.errors.len(), 1);
        assert!(summary.has_errors());
    }

    #[test]
    fn test_dirs_per_second() {
        let stats = WalkStats::default();
        for _ in 0..100 {
            stats.record_directory();
        }
        let summary = stats.snapshot(Duration::from_secs(2));
        assert!((summary.dirs_per_second() - 50.0).abs() < f64::EPSILON);
    }
}
