//! Reparse point wire codec
//!
//! Reparse point payloads are fixed-layout binary records:
//!
//! ```text
//! offset 0   u32  reparse tag
//! offset 4   u16  payload length (bytes after the 8-byte header)
//! offset 6   u16  reserved
//! offset 8   u16  substitute name offset   \
//! offset 10  u16  substitute name length    | offsets relative to the
//! offset 12  u16  print name offset         | path buffer, lengths in
//! offset 14  u16  print name length        /  bytes, excluding NUL
//! symlink:  offset 16  u32 flags, path buffer at 20
//! junction: path buffer at 16
//! ```
//!
//! Both names are NUL-terminated UTF-16, packed back-to-back (substitute
//! first). The substitute name carries the NT namespace prefix `\??\` and,
//! for junctions, a trailing separator; [`decode`] prefers the print name
//! and strips the prefix when falling back to the substitute name.
//!
//! All access goes through the bounds-checked offset reads of
//! [`PooledBuffer`]; a payload whose declared lengths exceed the buffer is
//! rejected, never overlaid.

use crate::buffer::PooledBuffer;
use crate::error::{FsError, FsResult};
use crate::fs::{ReparseKind, ReparsePointInfo};
use crate::path::PathValue;

pub const IO_REPARSE_TAG_SYMLINK: u32 = 0xA000_000C;
pub const IO_REPARSE_TAG_MOUNT_POINT: u32 = 0xA000_0003;
pub const SYMLINK_FLAG_RELATIVE: u32 = 0x1;

/// Bytes before the tag-specific body
const HEADER_SIZE: usize = 8;
/// The four u16 offset/length fields
const PATH_FIELDS_SIZE: usize = 8;
const JUNCTION_PATH_BUFFER: usize = 16;
const SYMLINK_FLAGS_OFFSET: usize = 16;
const SYMLINK_PATH_BUFFER: usize = 20;

const NT_NAMESPACE_PREFIX: &str = "\\??\\";

/// Upper bound for the get-reparse-point grow-and-retry loop.
pub const MAX_REPARSE_PAYLOAD: usize = 1 << 20;

/// The substitute name a junction payload carries for `target`:
/// NT namespace prefix plus a trailing separator.
pub fn nt_substitute_name(target: &str) -> String {
    format!("{}{}\\", NT_NAMESPACE_PREFIX, target)
}

/// Strip the NT namespace prefix and any trailing separator from a
/// substitute name, yielding the plain target path.
pub fn extract_path_from_substitute_name(substitute: &str) -> String {
    let mut path = substitute.strip_prefix(NT_NAMESPACE_PREFIX).unwrap_or(substitute);
    path = path.strip_suffix('\\').unwrap_or(path);
    path.to_string()
}

fn malformed(path: &PathValue) -> FsError {
    FsError::Native {
        code: libc::EINVAL,
        operation: "decode_reparse_point",
        path: path.full_name(),
    }
}

/// Decode a reparse point payload. `path` is used for error context only.
///
/// Timestamps in the returned info are zeroed; the provider fills them in
/// from the link's own attributes.
pub fn decode(buffer: &PooledBuffer, path: &PathValue) -> FsResult<ReparsePointInfo> {
    if buffer.capacity() < HEADER_SIZE {
        return Err(malformed(path));
    }
    let tag = buffer.read_u32_at(0);
    let data_length = buffer.read_u16_at(4) as usize;
    if HEADER_SIZE + data_length > buffer.capacity() {
        return Err(malformed(path));
    }

    let (path_buffer, target_is_relative, kind) = match tag {
        IO_REPARSE_TAG_SYMLINK => {
            if data_length < PATH_FIELDS_SIZE + 4 {
                return Err(malformed(path));
            }
            let flags = buffer.read_u32_at(SYMLINK_FLAGS_OFFSET);
            (
                SYMLINK_PATH_BUFFER,
                flags & SYMLINK_FLAG_RELATIVE != 0,
                ReparseKind::Symlink,
            )
        }
        IO_REPARSE_TAG_MOUNT_POINT => {
            if data_length < PATH_FIELDS_SIZE {
                return Err(malformed(path));
            }
            (JUNCTION_PATH_BUFFER, false, ReparseKind::Junction)
        }
        tag => {
            return Err(FsError::UnsupportedReparseTag {
                tag,
                path: path.full_name(),
            })
        }
    };

    let payload_end = HEADER_SIZE + data_length;
    let read_name = |offset: usize, length: usize| -> FsResult<String> {
        let start = path_buffer + offset;
        if start + length > payload_end {
            return Err(malformed(path));
        }
        Ok(buffer.read_utf16_at(start, length))
    };

    let substitute_offset = buffer.read_u16_at(8) as usize;
    let substitute_length = buffer.read_u16_at(10) as usize;
    let print_offset = buffer.read_u16_at(12) as usize;
    let print_length = buffer.read_u16_at(14) as usize;

    // Prefer the print name; fall back to the substitute name with the
    // NT namespace prefix stripped.
    let target = if print_length > 0 {
        read_name(print_offset, print_length)?
    } else {
        extract_path_from_substitute_name(&read_name(substitute_offset, substitute_length)?)
    };

    Ok(ReparsePointInfo {
        kind,
        target,
        target_is_relative,
        created: 0,
        accessed: 0,
        modified: 0,
    })
}

/// Both names as UTF-16 bytes, NUL terminators included.
fn names_length(substitute: &str, print: &str) -> usize {
    (substitute.encode_utf16().count() + print.encode_utf16().count() + 2) * 2
}

/// The payload length field is a u16; a name pair that cannot fit is
/// rejected before anything is written.
fn check_payload(data_length: usize, target: &str) -> FsResult<()> {
    if data_length > u16::MAX as usize {
        return Err(FsError::InvalidPath {
            path: target.to_string(),
            reason: "reparse target does not fit a payload".into(),
        });
    }
    Ok(())
}

fn write_names(buffer: &mut PooledBuffer, path_buffer: usize, substitute: &str, print: &str) {
    let substitute_bytes = substitute.encode_utf16().count() * 2;
    let print_bytes = print.encode_utf16().count() * 2;

    buffer.write_u16_at(8, 0);
    buffer.write_u16_at(10, substitute_bytes as u16);
    buffer.write_u16_at(12, (substitute_bytes + 2) as u16);
    buffer.write_u16_at(14, print_bytes as u16);

    let written = buffer.write_utf16_at(path_buffer, substitute);
    buffer.write_utf16_at(path_buffer + written, print);
}

/// Encode a junction payload into `buffer`, growing it as needed.
/// Returns the total payload size in bytes (header included).
pub fn encode_junction(
    substitute: &str,
    print: &str,
    buffer: &mut PooledBuffer,
) -> FsResult<usize> {
    let data_length = PATH_FIELDS_SIZE + names_length(substitute, print);
    check_payload(data_length, print)?;
    buffer.write_u32_at(0, IO_REPARSE_TAG_MOUNT_POINT);
    write_names(buffer, JUNCTION_PATH_BUFFER, substitute, print);
    buffer.write_u16_at(4, data_length as u16);
    buffer.write_u16_at(6, 0);
    Ok(HEADER_SIZE + data_length)
}

/// Encode a symlink payload into `buffer`, growing it as needed.
/// Returns the total payload size in bytes (header included).
pub fn encode_symlink(
    substitute: &str,
    print: &str,
    target_is_relative: bool,
    buffer: &mut PooledBuffer,
) -> FsResult<usize> {
    let data_length = PATH_FIELDS_SIZE + 4 + names_length(substitute, print);
    check_payload(data_length, print)?;
    buffer.write_u32_at(0, IO_REPARSE_TAG_SYMLINK);
    let flags = if target_is_relative {
        SYMLINK_FLAG_RELATIVE
    } else {
        0
    };
    buffer.write_u32_at(SYMLINK_FLAGS_OFFSET, flags);
    write_names(buffer, SYMLINK_PATH_BUFFER, substitute, print);
    buffer.write_u16_at(4, data_length as u16);
    buffer.write_u16_at(6, 0);
    Ok(HEADER_SIZE + data_length)
}
