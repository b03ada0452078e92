//! Native filesystem provider
//!
//! [`NativeFileSystem`] is the single syscall-level provider behind every
//! tool: attribute queries, directory enumeration, create/copy/delete, and
//! the reparse point operations. All blocking native calls happen here, on
//! whichever worker thread holds the operation.
//!
//! Every failing native call surfaces an [`FsError`] carrying the errno,
//! the operation name and the path; callers at the unit-of-work boundary
//! decide whether it is recoverable.

use crate::buffer::{buffer_pool, BufferPool};
use crate::error::{FsError, FsResult};
use crate::fs::enumerate::DirCursor;
use crate::fs::reparse::{self, nt_substitute_name, MAX_REPARSE_PAYLOAD};
use crate::fs::{
    CopyOptions, DirectoryEntry, FileAttributes, FileSystemEntry, ReparseKind, ReparsePointInfo,
};
use crate::path::PathValue;
use std::ffi::{CStr, CString};
use std::os::fd::RawFd;
use tracing::debug;

/// Initial capacity of directory query buffers.
pub const DEFAULT_DIR_BUFFER: usize = 64 << 10;

/// Initial capacity of reparse payload buffers.
const DEFAULT_REPARSE_BUFFER: usize = 1 << 10;

const NANOS_PER_SEC: i64 = 1_000_000_000;

/// Owned native file descriptor; closes on drop.
pub struct Fd(RawFd);

impl Drop for Fd {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.0);
        }
    }
}

pub(crate) fn c_path(path: &PathValue) -> FsResult<CString> {
    CString::new(path.full_name()).map_err(|_| FsError::InvalidPath {
        path: path.full_name(),
        reason: "path contains a NUL byte".into(),
    })
}

pub(crate) fn open_directory(path: &PathValue) -> FsResult<RawFd> {
    let c = c_path(path)?;
    let fd = unsafe { libc::open(c.as_ptr(), libc::O_RDONLY | libc::O_DIRECTORY | libc::O_CLOEXEC) };
    if fd < 0 {
        return Err(FsError::from_errno("open_directory", path));
    }
    Ok(fd)
}

/// Stat `name` relative to `dirfd`. Returns the raw errno on failure.
pub(crate) fn stat_at(dirfd: RawFd, name: &CStr, follow: bool) -> Result<libc::stat, i32> {
    let flags = if follow { 0 } else { libc::AT_SYMLINK_NOFOLLOW };
    let mut st: libc::stat = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::fstatat(dirfd, name.as_ptr(), &mut st, flags) };
    if rc != 0 {
        return Err(std::io::Error::last_os_error().raw_os_error().unwrap_or(0));
    }
    Ok(st)
}

fn timespec_nanos(sec: i64, nsec: i64) -> i64 {
    sec.saturating_mul(NANOS_PER_SEC).saturating_add(nsec)
}

/// Build a [`DirectoryEntry`] from stat results. For links, `target_stat`
/// classifies directory-ness; a dangling link counts as a file reparse.
pub(crate) fn entry_from_stat(
    name: &str,
    lstat: &libc::stat,
    target_stat: Option<&libc::stat>,
) -> DirectoryEntry {
    let file_type = lstat.st_mode & libc::S_IFMT;
    let is_link = file_type == libc::S_IFLNK;
    let is_directory = if is_link {
        target_stat
            .map(|st| st.st_mode & libc::S_IFMT == libc::S_IFDIR)
            .unwrap_or(false)
    } else {
        file_type == libc::S_IFDIR
    };

    let mut attributes = FileAttributes::empty();
    if is_directory {
        attributes |= FileAttributes::DIRECTORY;
    }
    if is_link {
        attributes |= FileAttributes::REPARSE_POINT;
    }
    if lstat.st_mode & 0o200 == 0 {
        attributes |= FileAttributes::READONLY;
    }
    if name.starts_with('.') {
        attributes |= FileAttributes::HIDDEN;
    }

    DirectoryEntry {
        name: name.to_string(),
        size: if is_directory || is_link {
            0
        } else {
            lstat.st_size as u64
        },
        attributes,
        created: timespec_nanos(lstat.st_ctime, lstat.st_ctime_nsec),
        accessed: timespec_nanos(lstat.st_atime, lstat.st_atime_nsec),
        modified: timespec_nanos(lstat.st_mtime, lstat.st_mtime_nsec),
        file_id: lstat.st_ino,
    }
}

/// The native provider. Owns the buffer pools shared by every worker.
pub struct NativeFileSystem {
    dir_buffers: BufferPool,
    reparse_buffers: BufferPool,
}

impl NativeFileSystem {
    /// `worker_count` sizes the pools: directory buffers at twice the
    /// worker count, reparse buffers at the worker count.
    pub fn new(worker_count: usize, dir_buffer_capacity: usize) -> NativeFileSystem {
        NativeFileSystem {
            dir_buffers: buffer_pool(worker_count * 2, dir_buffer_capacity),
            reparse_buffers: buffer_pool(worker_count.max(1), DEFAULT_REPARSE_BUFFER),
        }
    }

    /// Attributes of the entry at `path`, without following a final link.
    pub fn get_attributes(&self, path: &PathValue) -> FsResult<DirectoryEntry> {
        let c = c_path(path)?;
        let lstat = stat_at(libc::AT_FDCWD, &c, false)
            .map_err(|code| FsError::from_code(code, "get_attributes", path))?;
        let target_stat = if lstat.st_mode & libc::S_IFMT == libc::S_IFLNK {
            stat_at(libc::AT_FDCWD, &c, true).ok()
        } else {
            None
        };
        Ok(entry_from_stat(path.name(), &lstat, target_stat.as_ref()))
    }

    /// Open a cursor over the entries of `path`, optionally filtered by a
    /// `*`/`?` wildcard pattern.
    pub fn enumerate(&self, path: &PathValue, pattern: Option<&str>) -> FsResult<DirCursor<'_>> {
        DirCursor::open(path, pattern, &self.dir_buffers)
    }

    /// Delete a file, link or (empty) directory. A read-only entry has the
    /// read-only attribute cleared first.
    pub fn delete(&self, entry: &FileSystemEntry) -> FsResult<()> {
        let c = c_path(&entry.path)?;
        if entry.entry.is_readonly() && !entry.entry.is_reparse_point() {
            self.clear_readonly(&c, &entry.path)?;
        }
        let rc = if entry.entry.is_directory() && !entry.entry.is_reparse_point() {
            unsafe { libc::rmdir(c.as_ptr()) }
        } else {
            unsafe { libc::unlink(c.as_ptr()) }
        };
        if rc != 0 {
            return Err(FsError::from_errno("delete", &entry.path));
        }
        debug!(path = %entry.path, "deleted");
        Ok(())
    }

    /// Create a directory, creating missing parents as needed. The retry
    /// is bounded by the path depth; an existing directory is success.
    pub fn create_directory(&self, path: &PathValue) -> FsResult<()> {
        let mut retries = path.depth();
        let mut pending = vec![path.clone()];
        while let Some(dir) = pending.pop() {
            match self.mkdir(&dir) {
                Ok(()) => {}
                Err(FsError::NotFound { .. }) if retries > 0 && !dir.is_root() => {
                    retries -= 1;
                    let parent = dir.parent().ok_or(FsError::NotFound {
                        path: dir.full_name(),
                    })?;
                    pending.push(dir);
                    pending.push(parent);
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    fn mkdir(&self, path: &PathValue) -> FsResult<()> {
        let c = c_path(path)?;
        if unsafe { libc::mkdir(c.as_ptr(), 0o777) } == 0 {
            return Ok(());
        }
        let code = std::io::Error::last_os_error().raw_os_error().unwrap_or(0);
        if code == libc::EEXIST {
            return Ok(());
        }
        Err(FsError::from_code(code, "create_directory", path))
    }

    /// Copy `source` to `dest`, invoking `progress(copied, total)` as bytes
    /// move. Reparse point sources are re-created as links at the
    /// destination, never followed.
    pub fn copy_file(
        &self,
        source: &FileSystemEntry,
        dest: &PathValue,
        options: &CopyOptions,
        progress: &mut dyn FnMut(u64, u64),
    ) -> FsResult<()> {
        if source.entry.is_reparse_point() {
            return self.copy_reparse_point(source, dest, options);
        }
        self.copy_file_contents(source, dest, options, progress)
    }

    fn copy_file_contents(
        &self,
        source: &FileSystemEntry,
        dest: &PathValue,
        options: &CopyOptions,
        progress: &mut dyn FnMut(u64, u64),
    ) -> FsResult<()> {
        let src_c = c_path(&source.path)?;
        let dst_c = c_path(dest)?;

        let src_fd = unsafe { libc::open(src_c.as_ptr(), libc::O_RDONLY | libc::O_CLOEXEC) };
        if src_fd < 0 {
            return Err(FsError::from_errno("open_source", &source.path));
        }
        let src_fd = Fd(src_fd);

        let mut open_flags = libc::O_WRONLY | libc::O_CREAT | libc::O_TRUNC | libc::O_CLOEXEC;
        if !options.overwrite {
            open_flags |= libc::O_EXCL;
        }
        let mut dst_fd = unsafe { libc::open(dst_c.as_ptr(), open_flags, 0o666 as libc::c_uint) };
        if dst_fd < 0 && options.overwrite {
            let code = std::io::Error::last_os_error().raw_os_error().unwrap_or(0);
            if code == libc::EACCES {
                // Read-only destination: clear the attribute and retry once
                self.clear_readonly(&dst_c, dest)?;
                dst_fd = unsafe { libc::open(dst_c.as_ptr(), open_flags, 0o666 as libc::c_uint) };
            }
        }
        if dst_fd < 0 {
            return Err(FsError::from_errno("open_destination", dest));
        }
        let dst_fd = Fd(dst_fd);

        let total = source.entry.size;
        let mut copied = 0u64;
        let mut buf = self.dir_buffers.acquire();
        progress(0, total);
        loop {
            let read = unsafe {
                libc::read(
                    src_fd.0,
                    buf.as_mut_ptr() as *mut libc::c_void,
                    buf.capacity(),
                )
            };
            if read == 0 {
                break;
            }
            if read < 0 {
                return Err(FsError::from_errno("read", &source.path));
            }
            let read = read as usize;
            let mut written = 0usize;
            while written < read {
                let n = unsafe {
                    libc::write(
                        dst_fd.0,
                        buf.as_mut_ptr().add(written) as *const libc::c_void,
                        read - written,
                    )
                };
                if n <= 0 {
                    return Err(FsError::from_errno("write", dest));
                }
                written += n as usize;
            }
            copied += read as u64;
            progress(copied, total);
        }

        if source.entry.is_readonly() {
            unsafe { libc::fchmod(dst_fd.0, 0o444) };
        }
        if options.preserve_timestamps {
            self.set_file_times(dst_fd.0, &source.entry, dest)?;
        }
        Ok(())
    }

    /// Re-create a link source as a link at the destination, replacing
    /// whatever sits there.
    fn copy_reparse_point(
        &self,
        source: &FileSystemEntry,
        dest: &PathValue,
        options: &CopyOptions,
    ) -> FsResult<()> {
        let info = self.get_reparse_point_info(&source.path)?;
        if options.overwrite {
            match self.get_attributes(dest) {
                Ok(existing) => self.delete(&FileSystemEntry {
                    path: dest.clone(),
                    entry: existing,
                })?,
                Err(FsError::NotFound { .. }) => {}
                Err(err) => return Err(err),
            }
        }
        match info.kind {
            ReparseKind::Junction => self.create_junction_point(dest, &info.target),
            ReparseKind::Symlink if source.entry.is_directory() => {
                self.create_symbolic_link(dest, &info.target)
            }
            ReparseKind::Symlink => self.create_file_symbolic_link(dest, &info.target),
        }
    }

    /// Apply an attribute bitset to `path`. Only the read-only bit has a
    /// native representation on this provider.
    pub fn set_attributes(&self, path: &PathValue, attributes: FileAttributes) -> FsResult<()> {
        let c = c_path(path)?;
        let mode: libc::mode_t = if attributes.contains(FileAttributes::READONLY) {
            0o444
        } else {
            0o644
        };
        if unsafe { libc::chmod(c.as_ptr(), mode) } != 0 {
            return Err(FsError::from_errno("set_attributes", path));
        }
        Ok(())
    }

    /// Open the link itself, without following it. The returned descriptor
    /// supports reading the reparse data but not the target's contents.
    pub fn open_as_reparse_point(&self, path: &PathValue) -> FsResult<Fd> {
        let c = c_path(path)?;
        let fd = unsafe {
            libc::open(
                c.as_ptr(),
                libc::O_PATH | libc::O_NOFOLLOW | libc::O_CLOEXEC,
            )
        };
        if fd < 0 {
            return Err(FsError::from_errno("open_reparse_point", path));
        }
        Ok(Fd(fd))
    }

    /// Read and decode the reparse point at `path`. The payload read grows
    /// by doubling up to the codec's maximum, then fails.
    pub fn get_reparse_point_info(&self, path: &PathValue) -> FsResult<ReparsePointInfo> {
        let c = c_path(path)?;
        let lstat = stat_at(libc::AT_FDCWD, &c, false)
            .map_err(|code| FsError::from_code(code, "get_reparse_point", path))?;
        if lstat.st_mode & libc::S_IFMT != libc::S_IFLNK {
            return Err(FsError::Native {
                code: libc::EINVAL,
                operation: "get_reparse_point",
                path: path.full_name(),
            });
        }

        let fd = self.open_as_reparse_point(path)?;
        let empty = CString::new("").expect("static name");
        let mut buf = self.reparse_buffers.acquire();
        let target = loop {
            let n = unsafe {
                libc::readlinkat(
                    fd.0,
                    empty.as_ptr(),
                    buf.as_mut_ptr() as *mut libc::c_char,
                    buf.capacity(),
                )
            };
            if n < 0 {
                return Err(FsError::from_errno("read_reparse_point", path));
            }
            let n = n as usize;
            if n < buf.capacity() {
                break String::from_utf8_lossy(buf.read_bytes_at(0, n)).into_owned();
            }
            // Possibly truncated: grow and retry, bounded
            if buf.capacity() >= MAX_REPARSE_PAYLOAD {
                return Err(FsError::Native {
                    code: libc::ENAMETOOLONG,
                    operation: "read_reparse_point",
                    path: path.full_name(),
                });
            }
            buf.grow();
        };

        // Route the target through the wire codec so inspection and
        // creation share one layout.
        let target_is_relative = !target.starts_with('/');
        let target_is_directory = stat_at(libc::AT_FDCWD, &c, true)
            .map(|st| st.st_mode & libc::S_IFMT == libc::S_IFDIR)
            .unwrap_or(false);
        buf.clear();
        if !target_is_relative && target_is_directory {
            reparse::encode_junction(&nt_substitute_name(&target), &target, &mut buf)?;
        } else {
            reparse::encode_symlink(&target, &target, target_is_relative, &mut buf)?;
        }
        let mut info = reparse::decode(&buf, path)?;
        info.created = timespec_nanos(lstat.st_ctime, lstat.st_ctime_nsec);
        info.accessed = timespec_nanos(lstat.st_atime, lstat.st_atime_nsec);
        info.modified = timespec_nanos(lstat.st_mtime, lstat.st_mtime_nsec);
        Ok(info)
    }

    /// Create a directory symbolic link at `link` pointing to `target`.
    pub fn create_symbolic_link(&self, link: &PathValue, target: &str) -> FsResult<()> {
        let relative = !target.starts_with('/');
        let mut buf = self.reparse_buffers.acquire();
        reparse::encode_symlink(target, target, relative, &mut buf)?;
        let decoded = reparse::decode(&buf, link)?;
        self.symlink(link, &decoded.target)
    }

    /// Create a file symbolic link at `link` pointing to `target`.
    pub fn create_file_symbolic_link(&self, link: &PathValue, target: &str) -> FsResult<()> {
        self.create_symbolic_link(link, target)
    }

    /// Create a junction at `link` pointing to the absolute directory
    /// `target`.
    pub fn create_junction_point(&self, link: &PathValue, target: &str) -> FsResult<()> {
        if !target.starts_with('/') {
            return Err(FsError::InvalidPath {
                path: target.to_string(),
                reason: "junction target must be absolute".into(),
            });
        }
        let mut buf = self.reparse_buffers.acquire();
        reparse::encode_junction(&nt_substitute_name(target), target, &mut buf)?;
        let decoded = reparse::decode(&buf, link)?;
        self.symlink(link, &decoded.target)
    }

    fn symlink(&self, link: &PathValue, target: &str) -> FsResult<()> {
        let link_c = c_path(link)?;
        let target_c = CString::new(target).map_err(|_| FsError::InvalidPath {
            path: target.to_string(),
            reason: "target contains a NUL byte".into(),
        })?;
        if unsafe { libc::symlink(target_c.as_ptr(), link_c.as_ptr()) } != 0 {
            return Err(FsError::from_errno("create_link", link));
        }
        debug!(link = %link, target, "created link");
        Ok(())
    }

    fn clear_readonly(&self, c: &CStr, path: &PathValue) -> FsResult<()> {
        if unsafe { libc::chmod(c.as_ptr(), 0o644) } != 0 {
            return Err(FsError::from_errno("clear_readonly", path));
        }
        Ok(())
    }

    fn set_file_times(&self, fd: RawFd, source: &DirectoryEntry, dest: &PathValue) -> FsResult<()> {
        let to_timespec = |nanos: i64| libc::timespec {
            tv_sec: nanos / NANOS_PER_SEC,
            tv_nsec: nanos % NANOS_PER_SEC,
        };
        let times = [to_timespec(source.accessed), to_timespec(source.modified)];
        if unsafe { libc::futimens(fd, times.as_ptr()) } != 0 {
            return Err(FsError::from_errno("set_file_times", dest));
        }
        Ok(())
    }
}
