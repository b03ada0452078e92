//! Collector and monitor seams of the traversal scheduler
//!
//! A [`Collector`] gives each tool its per-directory behavior: it builds a
//! context when a directory is discovered, consumes the directory's entry
//! batch, and merges a finished child context into its parent. The
//! scheduler guarantees a context is mutated by one thread at a time, so
//! collector contexts need no locking of their own.
//!
//! A [`WalkMonitor`] is the outward-facing observer (progress, error
//! reporting). Every method has a no-op default and must stay non-blocking:
//! workers call them from the hot path.

use crate::error::WalkError;
use crate::fs::FileSystemEntry;
use crate::path::PathValue;

/// Per-tool traversal behavior.
pub trait Collector: Send + Sync {
    /// Per-directory state, owned by whichever worker is processing the
    /// directory.
    type Context: Send;

    /// A directory was discovered and will be traversed.
    fn on_directory_discovered(&self, dir: &FileSystemEntry) -> Self::Context;

    /// The full entry batch of `dir` is available. Entries follow native
    /// enumeration order.
    fn on_entries_enumerated(
        &self,
        ctx: &mut Self::Context,
        dir: &FileSystemEntry,
        entries: &[FileSystemEntry],
    );

    /// A child directory finished (its own children included); fold its
    /// context into the parent's.
    fn on_child_traversed(&self, parent: &mut Self::Context, child: Self::Context);
}

/// Outward-facing traversal observer. All methods default to no-ops.
pub trait WalkMonitor: Send + Sync {
    /// One unit of work finished; rate-limit any real output on the
    /// consumer side.
    fn on_pulse(&self) {}

    fn on_directory_traversing(&self, _dir: &PathValue) {}

    /// Fires only after all of the directory's children have finished.
    fn on_directory_traversed(&self, _dir: &PathValue) {}

    fn on_entries_discovered(&self, _dir: &PathValue, _count: usize) {}

    fn on_error(&self, _error: &WalkError) {}
}

/// Monitor that ignores everything.
pub struct NullMonitor;

impl WalkMonitor for NullMonitor {}
