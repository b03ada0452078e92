//! Filesystem provider surface
//!
//! Owned, handle-free value types produced and consumed by the native
//! provider, plus the wildcard matcher used by directory enumeration.
//! Submodules:
//! - [`native`]: the syscall-level provider (`NativeFileSystem`)
//! - [`enumerate`]: the pooled-buffer directory cursor
//! - [`reparse`]: the reparse point wire codec

pub mod enumerate;
pub mod native;
pub mod reparse;

use crate::path::PathValue;
use bitflags::bitflags;

bitflags! {
    /// File attribute bits, modelled after the native attribute word.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FileAttributes: u32 {
        const READONLY      = 0x0001;
        const HIDDEN        = 0x0002;
        const SYSTEM        = 0x0004;
        const DIRECTORY     = 0x0010;
        /// Entry is a symlink or junction. A directory reparse point carries
        /// both `DIRECTORY` and `REPARSE_POINT`.
        const REPARSE_POINT = 0x0400;
    }
}

/// How an entry participates in traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    /// Reparse point whose target is a directory; reported, recursed into
    /// only when following links.
    DirectoryReparse,
    /// Reparse point whose target is a file (or dangling).
    FileReparse,
}

/// One enumerated directory entry: a plain value, no OS handle attached.
#[derive(Debug, Clone)]
pub struct DirectoryEntry {
    /// Entry name relative to the enumerated directory
    pub name: String,

    /// Size in bytes (0 for directories)
    pub size: u64,

    pub attributes: FileAttributes,

    /// Creation time, unix nanoseconds
    pub created: i64,

    /// Last access time, unix nanoseconds
    pub accessed: i64,

    /// Last modification time, unix nanoseconds
    pub modified: i64,

    /// Opaque per-volume file identifier (inode number on this provider)
    pub file_id: u64,
}

impl DirectoryEntry {
    pub fn is_directory(&self) -> bool {
        self.attributes.contains(FileAttributes::DIRECTORY)
    }

    pub fn is_reparse_point(&self) -> bool {
        self.attributes.contains(FileAttributes::REPARSE_POINT)
    }

    /// A plain file: not a directory, not a reparse point.
    pub fn is_file(&self) -> bool {
        !self.is_directory() && !self.is_reparse_point()
    }

    pub fn is_readonly(&self) -> bool {
        self.attributes.contains(FileAttributes::READONLY)
    }

    pub fn kind(&self) -> EntryKind {
        match (self.is_directory(), self.is_reparse_point()) {
            (true, true) => EntryKind::DirectoryReparse,
            (true, false) => EntryKind::Directory,
            (false, true) => EntryKind::FileReparse,
            (false, false) => EntryKind::File,
        }
    }
}

/// A directory entry qualified with its full path.
#[derive(Debug, Clone)]
pub struct FileSystemEntry {
    pub path: PathValue,
    pub entry: DirectoryEntry,
}

impl FileSystemEntry {
    pub fn new(parent: &PathValue, entry: DirectoryEntry) -> crate::error::FsResult<FileSystemEntry> {
        let path = parent.combine(&entry.name)?;
        Ok(FileSystemEntry { path, entry })
    }

    pub fn name(&self) -> &str {
        &self.entry.name
    }
}

/// The two reparse point flavors the codec understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReparseKind {
    /// Symbolic link: file or directory target, relative or absolute
    Symlink,
    /// Junction (mount point): absolute directory target only
    Junction,
}

/// Decoded reparse point data. Transient: produced on demand, not stored in
/// the tree model.
#[derive(Debug, Clone)]
pub struct ReparsePointInfo {
    pub kind: ReparseKind,

    /// Link target after NT-namespace prefix stripping
    pub target: String,

    /// True for symlinks whose target is relative to the link's directory
    pub target_is_relative: bool,

    pub created: i64,
    pub accessed: i64,
    pub modified: i64,
}

impl ReparsePointInfo {
    pub fn is_junction(&self) -> bool {
        self.kind == ReparseKind::Junction
    }
}

/// Options for `copy_file`.
#[derive(Debug, Clone, Copy)]
pub struct CopyOptions {
    /// Replace an existing destination (clearing its read-only bit first)
    pub overwrite: bool,

    /// Carry the source modification time onto the destination
    pub preserve_timestamps: bool,
}

impl Default for CopyOptions {
    fn default() -> CopyOptions {
        CopyOptions {
            overwrite: true,
            preserve_timestamps: true,
        }
    }
}

/// Case-insensitive `*`/`?` wildcard match over an entry name.
///
/// `*` matches any run of characters (including empty), `?` matches exactly
/// one. This is the enumeration filter, not a glob engine: no character
/// classes, no path separators.
pub fn wildcard_match(pattern: &str, name: &str) -> bool {
    fn matches(pattern: &[char], name: &[char]) -> bool {
        match pattern.split_first() {
            None => name.is_empty(),
            Some(('*', rest)) => {
                // Greedily try every suffix of name
                (0..=name.len()).any(|skip| matches(rest, &name[skip..]))
            }
            Some(('?', rest)) => match name.split_first() {
                Some((_, name_rest)) => matches(rest, name_rest),
                None => false,
            },
            Some((&c, rest)) => match name.split_first() {
                Some((&n, name_rest)) => {
                    c.to_ascii_lowercase() == n.to_ascii_lowercase() && matches(rest, name_rest)
                }
                None => false,
            },
        }
    }

    let pattern: Vec<char> = pattern.chars().collect();
    let name: Vec<char> = name.chars().collect();
    matches(&pattern, &name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_with(attributes: FileAttributes) -> DirectoryEntry {
        DirectoryEntry {
            name: "test".into(),
            size: 0,
            attributes,
            created: 0,
            accessed: 0,
            modified: 0,
            file_id: 1,
        }
    }

    #[test]
    fn test_entry_kind_classification() {
        assert_eq!(entry_with(FileAttributes::empty()).kind(), EntryKind::File);
        assert_eq!(
            entry_with(FileAttributes::DIRECTORY).kind(),
            EntryKind::Directory
        );
        assert_eq!(
            entry_with(FileAttributes::DIRECTORY | FileAttributes::REPARSE_POINT).kind(),
            EntryKind::DirectoryReparse
        );
        assert_eq!(
            entry_with(FileAttributes::REPARSE_POINT).kind(),
            EntryKind::FileReparse
        );
    }

    #[test]
    fn test_wildcard_literal() {
        assert!(wildcard_match("file.txt", "file.txt"));
        assert!(wildcard_match("FILE.TXT", "file.txt"));
        assert!(!wildcard_match("file.txt", "file.txt.bak"));
    }

    #[test]
    fn test_wildcard_star() {
        assert!(wildcard_match("*", "anything"));
        assert!(wildcard_match("*", ""));
        assert!(wildcard_match("*.txt", "notes.txt"));
        assert!(!wildcard_match("*.txt", "notes.txt.bak"));
        assert!(wildcard_match("a*b*c", "aXXbYYc"));
        assert!(wildcard_match("a*b*c", "abc"));
    }

    #[test]
    fn test_wildcard_question() {
        assert!(wildcard_match("file.???", "file.txt"));
        assert!(!wildcard_match("file.???", "file.js"));
        assert!(wildcard_match("?", "x"));
        assert!(!wildcard_match("?", ""));
    }
}
