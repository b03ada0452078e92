//! Directory entry enumeration over the raw directory-query syscall
//!
//! [`DirCursor`] streams the entries of one directory through a pooled
//! buffer: the native call fills the buffer with a batch of fixed-layout
//! records, the cursor decodes one record at a time by offset and advances
//! by the record's declared length, and refills when the batch is consumed.
//! "No more entries" is normal termination, and it is sticky: once the
//! native call reports the end, the cursor never issues another call.
//!
//! Record layout (one entry in the query buffer):
//!
//! ```text
//! offset 0   u64  inode number
//! offset 8   i64  seek cookie
//! offset 16  u16  record length (advance to the next record)
//! offset 18  u8   entry type
//! offset 19  ...  NUL-terminated name
//! ```
//!
//! If the buffer is too small to hold even a single record the call fails
//! with an invalid-argument status; the cursor doubles the buffer and
//! retries, up to [`MAX_DIR_BUFFER`].

use crate::buffer::{BufferPool, Pooled, PooledBuffer};
use crate::error::{FsError, FsResult};
use crate::fs::native::{entry_from_stat, open_directory, stat_at};
use crate::fs::{wildcard_match, DirectoryEntry};
use crate::path::PathValue;
use std::ffi::CString;
use std::os::fd::RawFd;
use tracing::debug;

/// Directory query buffers never grow past this.
pub const MAX_DIR_BUFFER: usize = 16 << 20;

const RECLEN_OFFSET: usize = 16;
const NAME_OFFSET: usize = 19;

/// Cursor over the entries of a single directory.
///
/// Holds the directory file descriptor and one pooled buffer for the
/// lifetime of the enumeration; both are released when the cursor drops.
pub struct DirCursor<'p> {
    dir_path: PathValue,
    fd: RawFd,
    buffer: Pooled<'p, PooledBuffer>,
    /// Bytes of valid record data in the buffer
    valid: usize,
    /// Decode position within the valid region
    offset: usize,
    exhausted: bool,
    pattern: Option<String>,
    current: Option<DirectoryEntry>,
}

impl std::fmt::Debug for DirCursor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirCursor")
            .field("dir_path", &self.dir_path)
            .field("fd", &self.fd)
            .field("valid", &self.valid)
            .field("offset", &self.offset)
            .field("exhausted", &self.exhausted)
            .field("pattern", &self.pattern)
            .field("current", &self.current)
            .finish_non_exhaustive()
    }
}

impl<'p> DirCursor<'p> {
    /// Open `path` for enumeration. `pattern` filters entry names with
    /// `*`/`?` wildcards; `None` yields every entry.
    pub fn open(
        path: &PathValue,
        pattern: Option<&str>,
        pool: &'p BufferPool,
    ) -> FsResult<DirCursor<'p>> {
        let fd = open_directory(path)?;
        Ok(DirCursor {
            dir_path: path.clone(),
            fd,
            buffer: pool.acquire(),
            valid: 0,
            offset: 0,
            exhausted: false,
            pattern: pattern.map(str::to_string),
            current: None,
        })
    }

    /// Advance to the next entry. Returns `Ok(false)` at the end of the
    /// directory; after that every call returns `Ok(false)` without
    /// touching the native layer.
    pub fn move_next(&mut self) -> FsResult<bool> {
        loop {
            if self.offset >= self.valid {
                if !self.fill()? {
                    self.current = None;
                    return Ok(false);
                }
            }

            let record_length = self.buffer.read_u16_at(self.offset + RECLEN_OFFSET) as usize;
            if record_length == 0 {
                // A zero-length record cannot advance; abandon the batch
                debug!(
                    dir = %self.dir_path,
                    offset = self.offset,
                    "zero-length record, abandoning query batch"
                );
                self.offset = self.valid;
                continue;
            }
            let inode = self.buffer.read_u64_at(self.offset);
            let name = self.read_name(record_length);
            let record_offset = self.offset;
            self.offset += record_length;

            let name = match name {
                Some(name) => name,
                None => {
                    debug!(
                        dir = %self.dir_path,
                        offset = record_offset,
                        "skipping record with unterminated name"
                    );
                    continue;
                }
            };

            if name == "." || name == ".." {
                continue;
            }
            if let Some(pattern) = &self.pattern {
                if !wildcard_match(pattern, &name) {
                    continue;
                }
            }

            match self.stat_entry(&name, inode) {
                Some(entry) => {
                    self.current = Some(entry);
                    return Ok(true);
                }
                // Entry vanished between the query and the stat
                None => continue,
            }
        }
    }

    /// The entry produced by the last successful `move_next`.
    pub fn current(&self) -> Option<&DirectoryEntry> {
        self.current.as_ref()
    }

    /// Path of the directory being enumerated.
    pub fn dir_path(&self) -> &PathValue {
        &self.dir_path
    }

    /// Issue the native query call, growing the buffer on an
    /// invalid-argument status. Returns `Ok(false)` at end of directory.
    fn fill(&mut self) -> FsResult<bool> {
        if self.exhausted {
            return Ok(false);
        }
        loop {
            let read = unsafe {
                libc::syscall(
                    libc::SYS_getdents64,
                    self.fd,
                    self.buffer.as_mut_ptr(),
                    self.buffer.capacity(),
                )
            };
            if read > 0 {
                self.valid = read as usize;
                self.offset = 0;
                return Ok(true);
            }
            if read == 0 {
                self.exhausted = true;
                return Ok(false);
            }

            let code = std::io::Error::last_os_error().raw_os_error().unwrap_or(0);
            match code {
                // Buffer too small for a single record
                libc::EINVAL if self.buffer.capacity() < MAX_DIR_BUFFER => {
                    debug!(
                        dir = %self.dir_path,
                        capacity = self.buffer.capacity(),
                        "growing directory query buffer"
                    );
                    self.buffer.grow();
                }
                // A generic invalid status can also mean the handle is not
                // a directory; re-probe before reporting.
                libc::EINVAL | libc::ENOTDIR => {
                    return Err(self.classify_query_failure(code));
                }
                _ => return Err(FsError::from_code(code, "query_directory", &self.dir_path)),
            }
        }
    }

    fn classify_query_failure(&self, code: i32) -> FsError {
        let probe = CString::new(".").expect("static name");
        match stat_at(self.fd, &probe, true) {
            Ok(st) if st.st_mode & libc::S_IFMT != libc::S_IFDIR => FsError::NotADirectory {
                path: self.dir_path.full_name(),
            },
            _ => FsError::from_code(code, "query_directory", &self.dir_path),
        }
    }

    /// Decode the NUL-terminated name of the record at `self.offset`.
    fn read_name(&self, record_length: usize) -> Option<String> {
        let name_len = record_length.checked_sub(NAME_OFFSET)?;
        let raw = self.buffer.read_bytes_at(self.offset + NAME_OFFSET, name_len);
        let end = raw.iter().position(|&b| b == 0)?;
        Some(String::from_utf8_lossy(&raw[..end]).into_owned())
    }

    fn stat_entry(&self, name: &str, inode: u64) -> Option<DirectoryEntry> {
        let c_name = CString::new(name).ok()?;
        let lstat = match stat_at(self.fd, &c_name, false) {
            Ok(st) => st,
            Err(code) => {
                debug!(dir = %self.dir_path, name, code, "entry vanished during enumeration");
                return None;
            }
        };
        // For links, probe the target to classify directory-ness
        let target_stat = if lstat.st_mode & libc::S_IFMT == libc::S_IFLNK {
            stat_at(self.fd, &c_name, true).ok()
        } else {
            None
        };
        let mut entry = entry_from_stat(name, &lstat, target_stat.as_ref());
        // Identity of whatever recursion would enter: the target for links
        entry.file_id = target_stat.map_or(inode, |st| st.st_ino);
        Some(entry)
    }
}

impl Drop for DirCursor<'_> {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.fd);
        }
    }
}
