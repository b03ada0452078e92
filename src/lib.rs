//! mtwalk - multi-threaded directory tree toolkit
//!
//! The library behind the `mtcopy`, `mtdel`, `mtfind` and `mtinfo` tools:
//! a parallel directory-tree traversal scheduler over a native,
//! pooled-buffer filesystem provider.
//!
//! # Architecture
//!
//! ```text
//! mtcopy/mtdel/mtfind/mtinfo (bins)
//!     |
//!     v
//! Traversal (walker::scheduler) --- Collector / WalkMonitor seams
//!     |
//!     v
//! NativeFileSystem (fs::native) -- DirCursor (fs::enumerate)
//!     |                            reparse codec (fs::reparse)
//!     v
//! PooledBuffer / Pool (buffer)
//! ```
//!
//! Directories are visited exactly once by a fixed worker pool; a parent
//! completes only after all of its children, so per-subtree aggregates
//! merge bottom-up. Failures on individual directories are recorded and
//! reported without aborting the walk.

pub mod buffer;
pub mod config;
pub mod error;
pub mod fs;
pub mod path;
pub mod progress;
pub mod walker;

pub use error::{FsError, Result, WalkerError};
pub use fs::native::NativeFileSystem;
pub use path::PathValue;
pub use walker::{Traversal, WalkStats, WalkSummary};
