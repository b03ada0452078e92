//! Parallel traversal scheduler
//!
//! A fixed pool of named worker threads pulls directory nodes from a
//! bounded work queue. Processing one node is one unit of work: enumerate
//! the directory into a pooled batch, hand the batch to the collector,
//! then fan out child directories as new nodes. A node completes only
//! after all of its children complete; completion folds the child's
//! collector context into the parent under the parent's own lock and
//! cascades upward, so a parent's traversed event fires exactly once, after
//! its whole subtree.
//!
//! Failures on one directory are recorded and reported; siblings and
//! ancestors keep going. Cancellation is cooperative: a cancelled walk
//! drains its pending nodes without enumerating them, so the bookkeeping
//! still converges.

use crate::buffer::Pool;
use crate::config::WalkOptions;
use crate::error::{FsError, Result, WalkError, WalkerError, WorkerError};
use crate::fs::native::NativeFileSystem;
use crate::fs::{EntryKind, FileSystemEntry};
use crate::path::PathValue;
use crate::walker::collector::{Collector, WalkMonitor};
use crate::walker::queue::{WorkQueue, WorkQueueReceiver, WorkQueueSender};
use crate::walker::stats::{WalkStats, WalkSummary};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

const RECV_TIMEOUT: Duration = Duration::from_millis(100);
const COMPLETION_POLL: Duration = Duration::from_millis(25);

struct NodeState<Ctx> {
    /// Present from discovery until the node completes
    ctx: Option<Ctx>,
    pending_children: usize,
    entries_done: bool,
}

/// One directory in flight. Owned by the worker processing it; the state
/// mutex is the only point where a child touches its parent.
struct DirNode<C: Collector> {
    dir: FileSystemEntry,
    parent: Option<Arc<DirNode<C>>>,
    state: Mutex<NodeState<C::Context>>,
}

impl<C: Collector> DirNode<C> {
    fn new(dir: FileSystemEntry, parent: Option<Arc<DirNode<C>>>, ctx: C::Context) -> Arc<Self> {
        Arc::new(DirNode {
            dir,
            parent,
            state: Mutex::new(NodeState {
                ctx: Some(ctx),
                pending_children: 0,
                entries_done: false,
            }),
        })
    }
}

/// Shared state of one running walk.
struct RunState<'a, C: Collector> {
    fs: &'a NativeFileSystem,
    collector: &'a C,
    monitor: &'a dyn WalkMonitor,
    stats: &'a WalkStats,
    sender: WorkQueueSender<Arc<DirNode<C>>>,
    /// Nodes created but not yet completed; zero means the walk is done
    outstanding: AtomicUsize,
    cancel: &'a AtomicBool,
    follow_links: bool,
    /// File ids of scheduled directories, kept only when following links
    visited: Option<Mutex<HashSet<u64>>>,
    batch_pool: Pool<Vec<FileSystemEntry>>,
    root_ctx: Mutex<Option<C::Context>>,
}

/// A configured parallel walk, ready to run against a root.
pub struct Traversal<'a, C: Collector> {
    fs: &'a NativeFileSystem,
    collector: &'a C,
    monitor: &'a dyn WalkMonitor,
    options: WalkOptions,
    stats: Arc<WalkStats>,
    cancel: Arc<AtomicBool>,
}

impl<'a, C: Collector> Traversal<'a, C> {
    pub fn new(
        fs: &'a NativeFileSystem,
        collector: &'a C,
        monitor: &'a dyn WalkMonitor,
        options: WalkOptions,
        stats: Arc<WalkStats>,
    ) -> Traversal<'a, C> {
        Traversal {
            fs,
            collector,
            monitor,
            options,
            stats,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag that requests cooperative cancellation (hook it to ctrl-c).
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Walk the tree under `root`. Returns the root collector context and
    /// the final summary. A missing or non-directory root is fatal;
    /// everything below it is best-effort.
    pub fn run(&self, root: &PathValue) -> Result<(C::Context, WalkSummary)> {
        let started = Instant::now();

        let root_attrs = self.fs.get_attributes(root)?;
        if !root_attrs.is_directory() {
            return Err(WalkerError::Fs(FsError::NotADirectory {
                path: root.full_name(),
            }));
        }
        let root_entry = FileSystemEntry {
            path: root.clone(),
            entry: root_attrs,
        };

        let queue: WorkQueue<Arc<DirNode<C>>> = WorkQueue::new(self.options.queue_capacity);
        let state = RunState {
            fs: self.fs,
            collector: self.collector,
            monitor: self.monitor,
            stats: &self.stats,
            sender: queue.sender(),
            outstanding: AtomicUsize::new(0),
            cancel: &self.cancel,
            follow_links: self.options.follow_links,
            visited: self
                .options
                .follow_links
                .then(|| Mutex::new(HashSet::new())),
            batch_pool: Pool::new(
                self.options.worker_count * 2,
                || Vec::with_capacity(256),
                |batch: &mut Vec<FileSystemEntry>| batch.clear(),
            ),
            root_ctx: Mutex::new(None),
        };

        if let Some(visited) = &state.visited {
            visited.lock().insert(root_entry.entry.file_id);
        }
        let ctx = self.collector.on_directory_discovered(&root_entry);
        let root_node = DirNode::new(root_entry, None, ctx);
        state.outstanding.fetch_add(1, Ordering::SeqCst);
        state
            .sender
            .try_send(root_node)
            .ok()
            .filter(|sent| *sent)
            .ok_or(WalkerError::Worker(WorkerError::QueueSendFailed))?;

        let shutdown = AtomicBool::new(false);
        thread::scope(|scope| -> Result<()> {
            let mut workers = Vec::with_capacity(self.options.worker_count);
            for id in 0..self.options.worker_count {
                let receiver = queue.receiver();
                let state = &state;
                let shutdown = &shutdown;
                let handle = thread::Builder::new()
                    .name(format!("mtwalk-{}", id))
                    .spawn_scoped(scope, move || worker_loop(id, state, receiver, shutdown))
                    .map_err(|e| {
                        shutdown.store(true, Ordering::SeqCst);
                        WorkerError::InitFailed {
                            id,
                            reason: e.to_string(),
                        }
                    })?;
                workers.push(handle);
            }

            // The outstanding count is exact (incremented before a node is
            // queued, decremented when it completes), so zero means done.
            while state.outstanding.load(Ordering::SeqCst) != 0 {
                thread::sleep(COMPLETION_POLL);
            }
            shutdown.store(true, Ordering::SeqCst);
            Ok(())
        })?;

        let ctx = state
            .root_ctx
            .lock()
            .take()
            .expect("root context missing after completion");
        let summary = self.stats.snapshot(started.elapsed());
        debug!(
            directories = summary.directories,
            files = summary.files,
            errors = summary.errors.len(),
            "walk complete"
        );
        Ok((ctx, summary))
    }
}

fn worker_loop<C: Collector>(
    id: usize,
    state: &RunState<'_, C>,
    receiver: WorkQueueReceiver<Arc<DirNode<C>>>,
    shutdown: &AtomicBool,
) {
    debug!(worker = id, "worker starting");
    while !shutdown.load(Ordering::Relaxed) {
        let node = match receiver.recv_timeout(RECV_TIMEOUT) {
            Some(node) => node,
            None => continue,
        };
        process_node(state, node);
    }
    debug!(worker = id, "worker shutting down");
}

/// One unit of work: enumerate a directory, feed the collector, fan out
/// children, complete the node if it has none.
fn process_node<C: Collector>(state: &RunState<'_, C>, node: Arc<DirNode<C>>) {
    state.monitor.on_directory_traversing(&node.dir.path);

    if state.cancel.load(Ordering::Relaxed) {
        // Drain without enumerating so completion still cascades
        node.state.lock().entries_done = true;
        complete_node(state, node);
        return;
    }

    let mut batch = state.batch_pool.acquire();
    enumerate_into(state, &node.dir, &mut batch);

    state.stats.record_directory();
    for entry in batch.iter() {
        match entry.entry.kind() {
            EntryKind::File => state.stats.record_file(entry.entry.size),
            EntryKind::Directory => {}
            EntryKind::DirectoryReparse | EntryKind::FileReparse => state.stats.record_symlink(),
        }
    }

    {
        let mut node_state = node.state.lock();
        let ctx = node_state.ctx.as_mut().expect("node context taken early");
        state.collector.on_entries_enumerated(ctx, &node.dir, &batch);
    }
    state
        .monitor
        .on_entries_discovered(&node.dir.path, batch.len());

    // Children are registered on the parent before any of them can run.
    let mut children = Vec::new();
    for entry in batch.iter() {
        if !should_recurse(state, entry) {
            continue;
        }
        let ctx = state.collector.on_directory_discovered(entry);
        children.push(DirNode::new(entry.clone(), Some(Arc::clone(&node)), ctx));
    }
    drop(batch);

    {
        let mut node_state = node.state.lock();
        node_state.entries_done = true;
        node_state.pending_children = children.len();
    }

    state.stats.record_pulse();
    state.monitor.on_pulse();

    if children.is_empty() {
        complete_node(state, node);
        return;
    }

    for child in children {
        state.outstanding.fetch_add(1, Ordering::SeqCst);
        match state.sender.try_send(Arc::clone(&child)) {
            Ok(true) => {}
            // Queue full or closed: process on this worker instead
            Ok(false) | Err(()) => {
                state.sender.record_inline();
                trace!(path = %child.dir.path, "backpressure, processing inline");
                process_node(state, child);
            }
        }
    }
}

fn enumerate_into<C: Collector>(
    state: &RunState<'_, C>,
    dir: &FileSystemEntry,
    batch: &mut Vec<FileSystemEntry>,
) {
    let mut cursor = match state.fs.enumerate(&dir.path, None) {
        Ok(cursor) => cursor,
        Err(error) => {
            record_failure(state, &dir.path, error);
            return;
        }
    };
    loop {
        match cursor.move_next() {
            Ok(true) => {
                let entry = cursor.current().expect("cursor advanced").clone();
                match FileSystemEntry::new(&dir.path, entry) {
                    Ok(entry) => batch.push(entry),
                    Err(error) => record_failure(state, &dir.path, error),
                }
            }
            Ok(false) => break,
            Err(error) => {
                record_failure(state, &dir.path, error);
                break;
            }
        }
    }
}

fn record_failure<C: Collector>(state: &RunState<'_, C>, path: &PathValue, error: FsError) {
    if error.is_recoverable() {
        state.stats.record_skip();
    }
    warn!(path = %path, error = %error, "directory failed");
    state.monitor.on_error(&WalkError {
        path: path.full_name(),
        error: error.clone(),
    });
    state.stats.record_error(path.full_name(), error);
}

fn should_recurse<C: Collector>(state: &RunState<'_, C>, entry: &FileSystemEntry) -> bool {
    let eligible = match entry.entry.kind() {
        EntryKind::Directory => true,
        // Reported but not entered unless links are being followed
        EntryKind::DirectoryReparse => state.follow_links,
        EntryKind::File | EntryKind::FileReparse => false,
    };
    if !eligible {
        return false;
    }
    if let Some(visited) = &state.visited {
        if !visited.lock().insert(entry.entry.file_id) {
            trace!(path = %entry.path, "cycle detected, not recursing");
            state.stats.record_skip();
            return false;
        }
    }
    true
}

/// Complete `node` and cascade: fold its context into the parent, and if
/// that was the parent's last pending child, complete the parent too.
fn complete_node<C: Collector>(state: &RunState<'_, C>, node: Arc<DirNode<C>>) {
    let mut current = node;
    loop {
        state.monitor.on_directory_traversed(&current.dir.path);
        let ctx = current
            .state
            .lock()
            .ctx
            .take()
            .expect("node completed twice");

        match &current.parent {
            Some(parent) => {
                let mut parent_state = parent.state.lock();
                if let Some(parent_ctx) = parent_state.ctx.as_mut() {
                    state.collector.on_child_traversed(parent_ctx, ctx);
                }
                parent_state.pending_children -= 1;
                let parent_done = parent_state.pending_children == 0 && parent_state.entries_done;
                drop(parent_state);
                state.outstanding.fetch_sub(1, Ordering::SeqCst);
                if !parent_done {
                    return;
                }
                let parent = Arc::clone(parent);
                current = parent;
            }
            None => {
                // Publish the context before the count reaches zero; the
                // coordinator reads it as soon as it observes zero.
                *state.root_ctx.lock() = Some(ctx);
                state.outstanding.fetch_sub(1, Ordering::SeqCst);
                return;
            }
        }
    }
}
