//! Integration tests for the traversal scheduler and the built-in
//! collectors, run against real directory trees under a tempdir.

use mtwalk::config::WalkOptions;
use mtwalk::fs::CopyOptions;
use mtwalk::walker::{
    CopyCollector, DeleteCollector, DirectorySummary, MatchCollector, NullMonitor,
    SummaryCollector, Traversal, WalkStats,
};
use mtwalk::{NativeFileSystem, PathValue, WalkerError};
use std::fs;
use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tempfile::tempdir;

fn options(workers: usize) -> WalkOptions {
    WalkOptions {
        worker_count: workers,
        queue_capacity: 64,
        follow_links: false,
        buffer_capacity: 4096,
        show_progress: false,
        verbose: false,
    }
}

fn path_of(p: &Path) -> PathValue {
    PathValue::parse(p.to_str().unwrap()).unwrap()
}

/// Walk `root` with a summary collector and the given options.
fn summarize(root: &Path, options: WalkOptions) -> (DirectorySummary, mtwalk::WalkSummary) {
    let fs_provider = NativeFileSystem::new(options.worker_count, options.buffer_capacity);
    let stats = Arc::new(WalkStats::default());
    let collector = SummaryCollector;
    let traversal = Traversal::new(&fs_provider, &collector, &NullMonitor, options, stats);
    traversal.run(&path_of(root)).unwrap()
}

/// root/{a/{x.txt=10b}, b/{y.txt=20b, z/}}
fn build_fixed_tree(root: &Path) {
    fs::create_dir(root.join("a")).unwrap();
    fs::create_dir(root.join("b")).unwrap();
    fs::create_dir(root.join("b/z")).unwrap();
    fs::write(root.join("a/x.txt"), vec![b'x'; 10]).unwrap();
    fs::write(root.join("b/y.txt"), vec![b'y'; 20]).unwrap();
}

#[test]
fn test_summary_of_fixed_tree() {
    let dir = tempdir().unwrap();
    build_fixed_tree(dir.path());

    let (tree, summary) = summarize(dir.path(), options(4));

    assert_eq!(tree.directories, 3);
    assert_eq!(tree.files, 2);
    assert_eq!(tree.bytes, 30);
    assert_eq!(tree.symlinks, 0);
    assert!(summary.errors.is_empty());
    // Traversed directories include the root itself
    assert_eq!(summary.directories, 4);
    assert_eq!(summary.files, 2);
    assert_eq!(summary.bytes, 30);
}

#[test]
fn test_identical_aggregates_across_worker_counts() {
    let dir = tempdir().unwrap();
    for i in 0..4 {
        let level1 = dir.path().join(format!("d{}", i));
        fs::create_dir(&level1).unwrap();
        for j in 0..4 {
            let level2 = level1.join(format!("e{}", j));
            fs::create_dir(&level2).unwrap();
            for k in 0..5 {
                fs::write(level2.join(format!("f{}.dat", k)), vec![0u8; 100]).unwrap();
            }
        }
    }

    let baseline = summarize(dir.path(), options(1)).0;
    assert_eq!(baseline.files, 80);
    assert_eq!(baseline.directories, 20);
    assert_eq!(baseline.bytes, 8000);

    for workers in [4, 64] {
        let tree = summarize(dir.path(), options(workers)).0;
        assert_eq!(tree, baseline, "workers = {}", workers);
    }
}

#[test]
fn test_directory_link_reported_not_recursed() {
    let outside = tempdir().unwrap();
    fs::write(outside.path().join("hidden.txt"), b"secret").unwrap();

    let dir = tempdir().unwrap();
    fs::write(dir.path().join("visible.txt"), b"data").unwrap();
    std::os::unix::fs::symlink(outside.path(), dir.path().join("portal")).unwrap();

    let (tree, summary) = summarize(dir.path(), options(2));

    // The link is reported as a link; nothing behind it is visited
    assert_eq!(tree.symlinks, 1);
    assert_eq!(tree.files, 1);
    assert_eq!(tree.directories, 0);
    assert_eq!(summary.directories, 1);
}

#[test]
fn test_follow_links_guards_against_cycles() {
    let dir = tempdir().unwrap();
    fs::create_dir(dir.path().join("sub")).unwrap();
    fs::write(dir.path().join("sub/leaf.txt"), b"abc").unwrap();
    // Link back to the root: without the guard this never terminates
    std::os::unix::fs::symlink(dir.path(), dir.path().join("sub/cycle")).unwrap();

    let mut opts = options(4);
    opts.follow_links = true;
    let (tree, summary) = summarize(dir.path(), opts);

    assert_eq!(tree.files, 1);
    assert_eq!(tree.symlinks, 1);
    // root and sub, each exactly once
    assert_eq!(summary.directories, 2);
    assert!(summary.errors.is_empty());
}

#[test]
fn test_large_directory_with_tiny_initial_buffer() {
    let dir = tempdir().unwrap();
    for i in 0..1024 {
        fs::write(dir.path().join(format!("f{:04}", i)), b"").unwrap();
    }

    for capacity in [64usize, 64 << 10] {
        let mut opts = options(4);
        opts.buffer_capacity = capacity;
        let (tree, summary) = summarize(dir.path(), opts);
        assert_eq!(tree.files, 1024, "capacity {}", capacity);
        assert!(summary.errors.is_empty());
    }
}

#[test]
fn test_root_must_be_a_directory() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("plain.txt"), b"x").unwrap();

    let opts = options(2);
    let fs_provider = NativeFileSystem::new(opts.worker_count, opts.buffer_capacity);
    let stats = Arc::new(WalkStats::default());
    let collector = SummaryCollector;
    let traversal = Traversal::new(&fs_provider, &collector, &NullMonitor, opts, stats);

    let err = traversal
        .run(&path_of(&dir.path().join("plain.txt")))
        .unwrap_err();
    assert!(matches!(err, WalkerError::Fs(_)));
}

#[test]
fn test_cancelled_walk_drains_without_visiting() {
    let dir = tempdir().unwrap();
    build_fixed_tree(dir.path());

    let opts = options(2);
    let fs_provider = NativeFileSystem::new(opts.worker_count, opts.buffer_capacity);
    let stats = Arc::new(WalkStats::default());
    let collector = SummaryCollector;
    let traversal = Traversal::new(&fs_provider, &collector, &NullMonitor, opts, stats);

    traversal.cancel_flag().store(true, Ordering::SeqCst);
    let (tree, summary) = traversal.run(&path_of(dir.path())).unwrap();

    assert_eq!(tree, DirectorySummary::default());
    assert_eq!(summary.directories, 0);
}

#[test]
fn test_find_matches_across_tree() {
    let dir = tempdir().unwrap();
    fs::create_dir(dir.path().join("logs")).unwrap();
    fs::write(dir.path().join("app.log"), b"1").unwrap();
    fs::write(dir.path().join("logs/old.LOG"), b"2").unwrap();
    fs::write(dir.path().join("logs/notes.txt"), b"3").unwrap();

    let opts = options(4);
    let fs_provider = NativeFileSystem::new(opts.worker_count, opts.buffer_capacity);
    let stats = Arc::new(WalkStats::default());
    let collector = MatchCollector::new("*.log");
    let traversal = Traversal::new(&fs_provider, &collector, &NullMonitor, opts, stats);
    let (_, summary) = traversal.run(&path_of(dir.path())).unwrap();

    let mut names: Vec<String> = collector
        .take_matches()
        .iter()
        .map(|m| m.name().to_string())
        .collect();
    names.sort();
    assert_eq!(names, vec!["app.log", "old.LOG"]);
    assert!(summary.errors.is_empty());
}

#[test]
fn test_copy_mirrors_tree() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("src");
    let dest = dir.path().join("dst");
    fs::create_dir(&source).unwrap();
    build_fixed_tree(&source);
    std::os::unix::fs::symlink("a/x.txt", source.join("shortcut")).unwrap();

    let opts = options(4);
    let fs_provider = NativeFileSystem::new(opts.worker_count, opts.buffer_capacity);
    let stats = Arc::new(WalkStats::default());
    let collector = CopyCollector::new(
        &fs_provider,
        path_of(&source),
        path_of(&dest),
        CopyOptions::default(),
        Arc::clone(&stats),
    );
    let traversal = Traversal::new(&fs_provider, &collector, &NullMonitor, opts, stats);
    let (_, summary) = traversal.run(&path_of(&source)).unwrap();

    assert!(summary.errors.is_empty());
    assert_eq!(fs::read(dest.join("a/x.txt")).unwrap(), vec![b'x'; 10]);
    assert_eq!(fs::read(dest.join("b/y.txt")).unwrap(), vec![b'y'; 20]);
    assert!(dest.join("b/z").is_dir());
    let link = fs::symlink_metadata(dest.join("shortcut")).unwrap();
    assert!(link.file_type().is_symlink());
    assert_eq!(
        fs::read_link(dest.join("shortcut")).unwrap().to_str(),
        Some("a/x.txt")
    );
    assert_eq!(summary.copied_files, 3);
    assert_eq!(summary.copied_bytes, 30);
}

#[test]
fn test_copy_is_deterministic_for_worker_counts() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("src");
    fs::create_dir(&source).unwrap();
    build_fixed_tree(&source);

    for workers in [1usize, 8] {
        let dest = dir.path().join(format!("dst{}", workers));
        let opts = options(workers);
        let fs_provider = NativeFileSystem::new(opts.worker_count, opts.buffer_capacity);
        let stats = Arc::new(WalkStats::default());
        let collector = CopyCollector::new(
            &fs_provider,
            path_of(&source),
            path_of(&dest),
            CopyOptions::default(),
            Arc::clone(&stats),
        );
        let traversal = Traversal::new(&fs_provider, &collector, &NullMonitor, opts, stats);
        let (_, summary) = traversal.run(&path_of(&source)).unwrap();

        assert!(summary.errors.is_empty(), "workers = {}", workers);
        let (tree, _) = summarize(&dest, options(2));
        assert_eq!(tree.files, 2);
        assert_eq!(tree.bytes, 30);
        assert_eq!(tree.directories, 3);
    }
}

#[test]
fn test_delete_removes_tree_bottom_up() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("doomed");
    fs::create_dir(&root).unwrap();
    build_fixed_tree(&root);
    std::os::unix::fs::symlink("/nonexistent", root.join("dangling")).unwrap();

    let opts = options(4);
    let fs_provider = NativeFileSystem::new(opts.worker_count, opts.buffer_capacity);
    let stats = Arc::new(WalkStats::default());
    let collector = DeleteCollector::new(&fs_provider, Arc::clone(&stats));
    let traversal = Traversal::new(&fs_provider, &collector, &NullMonitor, opts, stats);
    let (root_entry, summary) = traversal.run(&path_of(&root)).unwrap();

    assert!(summary.errors.is_empty());
    // Subtree gone, root left for the caller
    assert!(root.exists());
    assert_eq!(fs::read_dir(&root).unwrap().count(), 0);
    // 2 files + 1 dangling link + 3 directories
    assert_eq!(summary.deleted_entries, 6);

    fs_provider.delete(&root_entry).unwrap();
    assert!(!root.exists());
}

#[test]
fn test_readonly_files_are_copied_and_deleted() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("src");
    fs::create_dir(&source).unwrap();
    let locked = source.join("locked.txt");
    fs::write(&locked, b"keep").unwrap();
    let mut perms = fs::metadata(&locked).unwrap().permissions();
    perms.set_readonly(true);
    fs::set_permissions(&locked, perms).unwrap();

    // Copy preserves the read-only attribute
    let dest = dir.path().join("dst");
    let opts = options(2);
    let fs_provider = NativeFileSystem::new(opts.worker_count, opts.buffer_capacity);
    let stats = Arc::new(WalkStats::default());
    let collector = CopyCollector::new(
        &fs_provider,
        path_of(&source),
        path_of(&dest),
        CopyOptions::default(),
        Arc::clone(&stats),
    );
    let traversal = Traversal::new(&fs_provider, &collector, &NullMonitor, opts, stats);
    let (_, summary) = traversal.run(&path_of(&source)).unwrap();
    assert!(summary.errors.is_empty());
    assert!(fs::metadata(dest.join("locked.txt"))
        .unwrap()
        .permissions()
        .readonly());

    // Delete clears it on the way out
    let opts = options(2);
    let stats = Arc::new(WalkStats::default());
    let collector = DeleteCollector::new(&fs_provider, Arc::clone(&stats));
    let traversal = Traversal::new(&fs_provider, &collector, &NullMonitor, opts, stats);
    let (_, summary) = traversal.run(&path_of(&dest)).unwrap();
    assert!(summary.errors.is_empty());
    assert!(!dest.join("locked.txt").exists());
}
