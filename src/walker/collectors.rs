//! Built-in collectors for the four tools
//!
//! - [`SummaryCollector`]: per-directory aggregates merged bottom-up (mtinfo)
//! - [`MatchCollector`]: wildcard name matching (mtfind)
//! - [`CopyCollector`]: mirrors the tree at a destination root (mtcopy)
//! - [`DeleteCollector`]: deletes entries as they are traversed (mtdel)

use crate::error::{FsError, FsResult};
use crate::fs::native::NativeFileSystem;
use crate::fs::{wildcard_match, CopyOptions, EntryKind, FileSystemEntry};
use crate::path::PathValue;
use crate::walker::collector::Collector;
use crate::walker::stats::WalkStats;
use parking_lot::Mutex;
use std::sync::Arc;

/// Aggregate counts for one directory subtree.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DirectorySummary {
    pub directories: u64,
    pub files: u64,
    pub symlinks: u64,
    pub bytes: u64,
}

impl DirectorySummary {
    fn merge(&mut self, other: &DirectorySummary) {
        self.directories += other.directories;
        self.files += other.files;
        self.symlinks += other.symlinks;
        self.bytes += other.bytes;
    }
}

/// Collects per-subtree aggregates; the root context holds the whole tree.
pub struct SummaryCollector;

impl Collector for SummaryCollector {
    type Context = DirectorySummary;

    fn on_directory_discovered(&self, _dir: &FileSystemEntry) -> DirectorySummary {
        DirectorySummary::default()
    }

    fn on_entries_enumerated(
        &self,
        ctx: &mut DirectorySummary,
        _dir: &FileSystemEntry,
        entries: &[FileSystemEntry],
    ) {
        for entry in entries {
            match entry.entry.kind() {
                EntryKind::File => {
                    ctx.files += 1;
                    ctx.bytes += entry.entry.size;
                }
                EntryKind::Directory => ctx.directories += 1,
                EntryKind::DirectoryReparse | EntryKind::FileReparse => ctx.symlinks += 1,
            }
        }
    }

    fn on_child_traversed(&self, parent: &mut DirectorySummary, child: DirectorySummary) {
        parent.merge(&child);
    }
}

/// Accumulates entries whose name matches a `*`/`?` pattern.
pub struct MatchCollector {
    pattern: String,
    matched: Mutex<Vec<FileSystemEntry>>,
}

impl MatchCollector {
    pub fn new(pattern: &str) -> MatchCollector {
        MatchCollector {
            pattern: pattern.to_string(),
            matched: Mutex::new(Vec::new()),
        }
    }

    /// Drain the matches accumulated so far.
    pub fn take_matches(&self) -> Vec<FileSystemEntry> {
        std::mem::take(&mut *self.matched.lock())
    }
}

impl Collector for MatchCollector {
    type Context = ();

    fn on_directory_discovered(&self, _dir: &FileSystemEntry) {}

    fn on_entries_enumerated(
        &self,
        _ctx: &mut (),
        _dir: &FileSystemEntry,
        entries: &[FileSystemEntry],
    ) {
        let mut hits: Vec<FileSystemEntry> = entries
            .iter()
            .filter(|e| wildcard_match(&self.pattern, e.name()))
            .cloned()
            .collect();
        if !hits.is_empty() {
            self.matched.lock().append(&mut hits);
        }
    }

    fn on_child_traversed(&self, _parent: &mut (), _child: ()) {}
}

/// Mirrors the source tree at a destination root: directories created at
/// discovery, files and links copied from each entry batch.
pub struct CopyCollector<'a> {
    fs: &'a NativeFileSystem,
    source_root: PathValue,
    dest_root: PathValue,
    options: CopyOptions,
    stats: Arc<WalkStats>,
}

impl<'a> CopyCollector<'a> {
    pub fn new(
        fs: &'a NativeFileSystem,
        source_root: PathValue,
        dest_root: PathValue,
        options: CopyOptions,
        stats: Arc<WalkStats>,
    ) -> CopyCollector<'a> {
        CopyCollector {
            fs,
            source_root,
            dest_root,
            options,
            stats,
        }
    }

    fn dest_of(&self, path: &PathValue) -> FsResult<PathValue> {
        let segments = path
            .relative_to(&self.source_root)
            .ok_or_else(|| FsError::InvalidPath {
                path: path.full_name(),
                reason: "not under the source root".into(),
            })?;
        let mut dest = self.dest_root.clone();
        for segment in segments {
            dest = dest.combine(&segment)?;
        }
        Ok(dest)
    }
}

impl Collector for CopyCollector<'_> {
    type Context = ();

    fn on_directory_discovered(&self, dir: &FileSystemEntry) {
        let result = self
            .dest_of(&dir.path)
            .and_then(|dest| self.fs.create_directory(&dest));
        if let Err(error) = result {
            self.stats.record_error(dir.path.full_name(), error);
        }
    }

    fn on_entries_enumerated(
        &self,
        _ctx: &mut (),
        _dir: &FileSystemEntry,
        entries: &[FileSystemEntry],
    ) {
        for entry in entries {
            // Plain directories are created at their own discovery;
            // everything else (files and links) is copied here.
            if entry.entry.kind() == EntryKind::Directory {
                continue;
            }
            let result = self.dest_of(&entry.path).and_then(|dest| {
                self.fs
                    .copy_file(entry, &dest, &self.options, &mut |_, _| {})
            });
            match result {
                Ok(()) => self.stats.record_copied(entry.entry.size),
                Err(error) => self.stats.record_error(entry.path.full_name(), error),
            }
        }
    }

    fn on_child_traversed(&self, _parent: &mut (), _child: ()) {}
}

/// Deletes a tree bottom-up: files and links from each entry batch,
/// directories once their own subtree is gone. The root directory is left
/// for the caller (the returned root context names it).
pub struct DeleteCollector<'a> {
    fs: &'a NativeFileSystem,
    stats: Arc<WalkStats>,
}

impl<'a> DeleteCollector<'a> {
    pub fn new(fs: &'a NativeFileSystem, stats: Arc<WalkStats>) -> DeleteCollector<'a> {
        DeleteCollector { fs, stats }
    }
}

impl Collector for DeleteCollector<'_> {
    type Context = FileSystemEntry;

    fn on_directory_discovered(&self, dir: &FileSystemEntry) -> FileSystemEntry {
        dir.clone()
    }

    fn on_entries_enumerated(
        &self,
        _ctx: &mut FileSystemEntry,
        _dir: &FileSystemEntry,
        entries: &[FileSystemEntry],
    ) {
        for entry in entries {
            // Subdirectories are deleted when their traversal finishes
            if entry.entry.kind() == EntryKind::Directory {
                continue;
            }
            match self.fs.delete(entry) {
                Ok(()) => self.stats.record_deleted(),
                Err(error) => self.stats.record_error(entry.path.full_name(), error),
            }
        }
    }

    fn on_child_traversed(&self, _parent: &mut FileSystemEntry, child: FileSystemEntry) {
        // The child's subtree is empty now; remove the directory itself
        match self.fs.delete(&child) {
            Ok(()) => self.stats.record_deleted(),
            Err(error) => self.stats.record_error(child.path.full_name(), error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{DirectoryEntry, FileAttributes};

    fn entry(name: &str, size: u64, attributes: FileAttributes) -> FileSystemEntry {
        FileSystemEntry {
            path: PathValue::parse("/data").unwrap().combine(name).unwrap(),
            entry: DirectoryEntry {
                name: name.into(),
                size,
                attributes,
                created: 0,
                accessed: 0,
                modified: 0,
                file_id: 1,
            },
        }
    }

    fn dir_entry(name: &str) -> FileSystemEntry {
        entry(name, 0, FileAttributes::DIRECTORY)
    }

    #[test]
    fn test_summary_counts_batch() {
        let collector = SummaryCollector;
        let dir = dir_entry("root");
        let mut ctx = collector.on_directory_discovered(&dir);
        collector.on_entries_enumerated(
            &mut ctx,
            &dir,
            &[
                entry("a.txt", 10, FileAttributes::empty()),
                entry("b.txt", 20, FileAttributes::empty()),
                dir_entry("sub"),
                entry("link", 0, FileAttributes::REPARSE_POINT),
            ],
        );
        assert_eq!(
            ctx,
            DirectorySummary {
                directories: 1,
                files: 2,
                symlinks: 1,
                bytes: 30
            }
        );
    }

    #[test]
    fn test_summary_merges_children() {
        let collector = SummaryCollector;
        let mut parent = DirectorySummary {
            directories: 2,
            files: 1,
            symlinks: 0,
            bytes: 5,
        };
        collector.on_child_traversed(
            &mut parent,
            DirectorySummary {
                directories: 1,
                files: 3,
                symlinks: 1,
                bytes: 95,
            },
        );
        assert_eq!(
            parent,
            DirectorySummary {
                directories: 3,
                files: 4,
                symlinks: 1,
                bytes: 100
            }
        );
    }

    #[test]
    fn test_match_collector() {
        let collector = MatchCollector::new("*.txt");
        let dir = dir_entry("root");
        let mut ctx = ();
        collector.on_entries_enumerated(
            &mut ctx,
            &dir,
            &[
                entry("notes.txt", 1, FileAttributes::empty()),
                entry("image.png", 1, FileAttributes::empty()),
                entry("README.TXT", 1, FileAttributes::empty()),
            ],
        );
        let matches = collector.take_matches();
        let names: Vec<&str> = matches.iter().map(|m| m.name()).collect();
        assert_eq!(names, vec!["notes.txt", "README.TXT"]);
        // Drained
        assert!(collector.take_matches().is_empty());
    }
}
