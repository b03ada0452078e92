//! Configuration types for the mtwalk tools
//!
//! This module defines:
//! - The CLI arguments shared by all four tools (clap derive)
//! - The validated runtime options handed to the traversal scheduler

use crate::error::ConfigError;
use crate::fs::native::DEFAULT_DIR_BUFFER;
use crate::path::PathValue;
use clap::Args;
use tracing_subscriber::EnvFilter;

/// Maximum reasonable worker count
pub const MAX_WORKERS: usize = 512;

/// Minimum queue size
pub const MIN_QUEUE_SIZE: usize = 16;

/// Minimum initial directory buffer capacity
pub const MIN_BUFFER_SIZE: usize = 64;

/// Arguments shared by all four tools
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// Number of worker threads
    #[arg(
        short = 'w',
        long,
        default_value_t = default_workers(),
        value_name = "NUM"
    )]
    pub workers: usize,

    /// Work queue capacity (controls memory usage)
    #[arg(long, default_value = "4096", value_name = "NUM")]
    pub queue_size: usize,

    /// Follow symbolic links and junctions into their targets
    #[arg(long)]
    pub follow_links: bool,

    /// Initial directory buffer capacity in bytes
    #[arg(long, default_value_t = DEFAULT_DIR_BUFFER, value_name = "BYTES")]
    pub buffer_size: usize,

    /// Quiet mode - suppress progress output
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Verbose output (show errors and warnings)
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

fn default_workers() -> usize {
    num_cpus::get()
}

/// Validated runtime options
#[derive(Debug, Clone)]
pub struct WalkOptions {
    /// Number of worker threads
    pub worker_count: usize,

    /// Work queue capacity
    pub queue_capacity: usize,

    /// Recurse into directory links (guarded against cycles)
    pub follow_links: bool,

    /// Initial directory buffer capacity
    pub buffer_capacity: usize,

    /// Show progress indicator
    pub show_progress: bool,

    /// Verbose logging
    pub verbose: bool,
}

impl WalkOptions {
    /// Create and validate options from CLI arguments
    pub fn from_args(args: &CommonArgs) -> Result<Self, ConfigError> {
        if args.workers == 0 || args.workers > MAX_WORKERS {
            return Err(ConfigError::InvalidWorkerCount {
                count: args.workers,
                max: MAX_WORKERS,
            });
        }

        if args.queue_size < MIN_QUEUE_SIZE {
            return Err(ConfigError::InvalidQueueSize {
                size: args.queue_size,
                min: MIN_QUEUE_SIZE,
            });
        }

        // Pathologically small buffers still work through grow-and-retry,
        // but below this the first query cannot even start.
        let buffer_capacity = args.buffer_size.max(MIN_BUFFER_SIZE);

        Ok(Self {
            worker_count: args.workers,
            queue_capacity: args.queue_size,
            follow_links: args.follow_links,
            buffer_capacity,
            show_progress: !args.quiet,
            verbose: args.verbose,
        })
    }
}

/// Initialize tracing for a tool binary.
pub fn setup_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("mtwalk=debug,warn")
    } else {
        EnvFilter::new("mtwalk=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

/// Resolve a CLI path argument into an absolute [`PathValue`], resolving
/// relative arguments against the current directory.
pub fn resolve_path(arg: &str) -> Result<PathValue, ConfigError> {
    let absolute = if arg.starts_with('/') {
        arg.to_string()
    } else {
        let cwd = std::env::current_dir().map_err(|e| ConfigError::InvalidPath {
            path: arg.to_string(),
            reason: e.to_string(),
        })?;
        format!("{}/{}", cwd.display(), arg)
    };
    PathValue::parse(&absolute).map_err(|e| ConfigError::InvalidPath {
        path: arg.to_string(),
        reason: e.to_string(),
    })
}

/// Validate a search pattern for mtfind: `*`/`?` wildcards over a single
/// name, never a path.
pub fn validate_pattern(pattern: &str) -> Result<(), ConfigError> {
    if pattern.is_empty() {
        return Err(ConfigError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: "pattern must not be empty".into(),
        });
    }
    if pattern.contains('/') {
        return Err(ConfigError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: "pattern matches entry names, not paths".into(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> CommonArgs {
        CommonArgs {
            workers: 4,
            queue_size: 4096,
            follow_links: false,
            buffer_size: DEFAULT_DIR_BUFFER,
            quiet: false,
            verbose: false,
        }
    }

    #[test]
    fn test_valid_options() {
        let options = WalkOptions::from_args(&args()).unwrap();
        assert_eq!(options.worker_count, 4);
        assert_eq!(options.queue_capacity, 4096);
        assert!(options.show_progress);
    }

    #[test]
    fn test_invalid_worker_count() {
        let mut bad = args();
        bad.workers = 0;
        assert!(matches!(
            WalkOptions::from_args(&bad),
            Err(ConfigError::InvalidWorkerCount { .. })
        ));

        bad.workers = MAX_WORKERS + 1;
        assert!(WalkOptions::from_args(&bad).is_err());
    }

    #[test]
    fn test_invalid_queue_size() {
        let mut bad = args();
        bad.queue_size = 2;
        assert!(matches!(
            WalkOptions::from_args(&bad),
            Err(ConfigError::InvalidQueueSize { .. })
        ));
    }

    #[test]
    fn test_buffer_size_floor() {
        let mut small = args();
        small.buffer_size = 1;
        let options = WalkOptions::from_args(&small).unwrap();
        assert_eq!(options.buffer_capacity, MIN_BUFFER_SIZE);
    }

    #[test]
    fn test_resolve_path() {
        let absolute = resolve_path("/data/tree").unwrap();
        assert_eq!(absolute.full_name(), "/data/tree");

        let relative = resolve_path("sub/dir").unwrap();
        assert!(relative.full_name().ends_with("/sub/dir"));
        assert!(relative.full_name().starts_with('/'));
    }

    #[test]
    fn test_validate_pattern() {
        assert!(validate_pattern("*.txt").is_ok());
        assert!(validate_pattern("").is_err());
        assert!(validate_pattern("a/b").is_err());
    }
}
