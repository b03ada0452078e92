//! Parallel directory tree traversal
//!
//! The scheduler walks a tree with a fixed worker pool, visiting every
//! directory exactly once and completing parents only after their children.
//! Tools plug in through the [`Collector`] trait; observers through
//! [`WalkMonitor`].

pub mod collector;
pub mod collectors;
pub mod queue;
pub mod scheduler;
pub mod stats;

pub use collector::{Collector, NullMonitor, WalkMonitor};
pub use collectors::{
    CopyCollector, DeleteCollector, DirectorySummary, MatchCollector, SummaryCollector,
};
pub use scheduler::Traversal;
pub use stats::{WalkStats, WalkSummary};
