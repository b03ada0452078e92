//! Error types for mtwalk
//!
//! This module defines the error hierarchy shared by the filesystem provider,
//! the traversal scheduler and the CLI tools:
//! - Filesystem errors carrying the native error code, the operation and the path
//! - Configuration and CLI validation errors
//! - Worker thread errors
//!
//! Design philosophy:
//! - Use thiserror for structured error types in library code
//! - A failure on one directory must not abort the walk: errors that can be
//!   skipped are marked recoverable and recorded rather than propagated
//! - Preserve the native error code for debugging

use crate::path::PathValue;
use thiserror::Error;

/// Top-level error type for the mtwalk tools
#[derive(Error, Debug)]
pub enum WalkerError {
    /// Filesystem errors
    #[error("Filesystem error: {0}")]
    Fs(#[from] FsError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Worker/concurrency errors
    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),
}

/// Filesystem provider errors
///
/// Every failing native operation surfaces one of these, carrying enough
/// context (operation name, path, native code) to be reported without the
/// call stack.
#[derive(Error, Debug, Clone)]
pub enum FsError {
    /// Path does not exist
    #[error("Path not found: \"{path}\"")]
    NotFound { path: String },

    /// Permission denied
    #[error("Access denied: \"{path}\"")]
    AccessDenied { path: String },

    /// Enumeration was asked for something that is not a directory.
    /// Derived by re-probing attributes after a generic invalid-argument
    /// status from the native query call.
    #[error("Not a directory: \"{path}\"")]
    NotADirectory { path: String },

    /// A reparse point payload carried a tag the codec does not understand
    #[error("Unsupported reparse point type 0x{tag:08X} at \"{path}\"")]
    UnsupportedReparseTag { tag: u32, path: String },

    /// Path string rejected before reaching the native layer
    #[error("Invalid path \"{path}\": {reason}")]
    InvalidPath { path: String, reason: String },

    /// Generic native failure with error code, operation name and path
    #[error("Error {code} during {operation} on \"{path}\"")]
    Native {
        code: i32,
        operation: &'static str,
        path: String,
    },
}

impl FsError {
    /// Check if this error is recoverable (the subtree can be skipped and
    /// the walk continues with siblings).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            FsError::NotFound { .. }
                | FsError::AccessDenied { .. }
                | FsError::NotADirectory { .. }
                | FsError::UnsupportedReparseTag { .. }
        )
    }

    /// Build an `FsError` from the current `errno`, classifying the
    /// well-known codes and falling back to `Native`.
    pub fn from_errno(operation: &'static str, path: &PathValue) -> FsError {
        let code = std::io::Error::last_os_error().raw_os_error().unwrap_or(0);
        FsError::from_code(code, operation, path)
    }

    /// Classify a raw native error code.
    pub fn from_code(code: i32, operation: &'static str, path: &PathValue) -> FsError {
        let path = path.full_name();
        match code {
            libc::ENOENT => FsError::NotFound { path },
            libc::EACCES | libc::EPERM => FsError::AccessDenied { path },
            libc::ENOTDIR => FsError::NotADirectory { path },
            _ => FsError::Native {
                code,
                operation,
                path,
            },
        }
    }
}

/// Configuration and CLI errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid worker count
    #[error("Invalid worker count {count}: must be between 1 and {max}")]
    InvalidWorkerCount { count: usize, max: usize },

    /// Invalid queue size
    #[error("Invalid queue size {size}: must be at least {min}")]
    InvalidQueueSize { size: usize, min: usize },

    /// Source path error
    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// Invalid search pattern
    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

/// Worker thread errors
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Work queue send failed
    #[error("Failed to send work item: queue closed")]
    QueueSendFailed,

    /// Worker initialization failed
    #[error("Failed to initialize worker {id}: {reason}")]
    InitFailed { id: usize, reason: String },
}

/// A traversal error recorded against the directory that produced it
#[derive(Debug, Clone)]
pub struct WalkError {
    /// Path of the entry or directory that failed
    pub path: String,

    /// The underlying filesystem error
    pub error: FsError,
}

impl std::fmt::Display for WalkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.error)
    }
}

/// Result type alias for WalkerError
pub type Result<T> = std::result::Result<T, WalkerError>;

/// Result type alias for FsError
pub type FsResult<T> = std::result::Result<T, FsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fs_error_recoverable() {
        let denied = FsError::AccessDenied {
            path: "/test".into(),
        };
        assert!(denied.is_recoverable());

        let native = FsError::Native {
            code: libc::EIO,
            operation: "enumerate",
            path: "/test".into(),
        };
        assert!(!native.is_recoverable());
    }

    #[test]
    fn test_fs_error_classification() {
        let path = PathValue::parse("/missing").unwrap();
        let err = FsError::from_code(libc::ENOENT, "stat", &path);
        assert!(matches!(err, FsError::NotFound { .. }));

        let err = FsError::from_code(libc::ENOTDIR, "enumerate", &path);
        assert!(matches!(err, FsError::NotADirectory { .. }));
    }

    #[test]
    fn test_error_conversion() {
        let fs_err = FsError::NotFound {
            path: "/missing".into(),
        };
        let walker_err: WalkerError = fs_err.into();
        assert!(matches!(walker_err, WalkerError::Fs(_)));
    }
}
