//! Reusable byte buffers and bounded object pools
//!
//! The native layer hands us fixed-layout binary records (directory query
//! results, reparse point payloads) in caller-supplied buffers. This module
//! provides:
//!
//! - [`PooledBuffer`]: an owned, growable byte region with typed reads and
//!   writes at explicit byte offsets. Capacity only ever grows, and only by
//!   doubling, so a buffer that has seen a large directory never reallocates
//!   for a smaller one.
//! - [`Pool`]: a bounded recycling pool. Release runs a caller-supplied reset
//!   so a recycled item never exposes stale content, and releases beyond the
//!   pool bound simply drop the item instead of growing the pool.
//!
//! The pool's free list is a bounded crossbeam channel: acquire/release from
//! many workers are single channel operations, no global lock.

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError, TrySendError};
use std::ops::{Deref, DerefMut};

/// An owned byte buffer with typed access at fixed offsets.
///
/// All reads are bounds-checked against the current capacity and panic on
/// violation: reading past the end of a buffer is a bug in the decoder, not
/// a runtime condition. Writes grow the buffer (by doubling) as needed.
pub struct PooledBuffer {
    data: Vec<u8>,
}

impl PooledBuffer {
    pub fn new(capacity: usize) -> PooledBuffer {
        assert!(capacity > 0, "buffer capacity must be non-zero");
        PooledBuffer {
            data: vec![0u8; capacity],
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Double the capacity. New bytes are zeroed.
    pub fn grow(&mut self) {
        let new_capacity = self.data.len() * 2;
        self.data.resize(new_capacity, 0);
    }

    /// Grow (by doubling) until `offset + size` bytes fit.
    pub fn ensure_capacity(&mut self, offset: usize, size: usize) {
        while self.data.len() < offset + size {
            self.grow();
        }
    }

    /// Zero the entire buffer, keeping capacity.
    pub fn clear(&mut self) {
        self.data.fill(0);
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.data.as_mut_ptr()
    }

    fn check_range(&self, offset: usize, size: usize) {
        assert!(
            offset + size <= self.data.len(),
            "read past end of buffer (offset={}, size={}, capacity={})",
            offset,
            size,
            self.data.len()
        );
    }

    pub fn read_u8_at(&self, offset: usize) -> u8 {
        self.check_range(offset, 1);
        self.data[offset]
    }

    pub fn read_u16_at(&self, offset: usize) -> u16 {
        self.check_range(offset, 2);
        u16::from_le_bytes(self.data[offset..offset + 2].try_into().unwrap())
    }

    pub fn read_u32_at(&self, offset: usize) -> u32 {
        self.check_range(offset, 4);
        u32::from_le_bytes(self.data[offset..offset + 4].try_into().unwrap())
    }

    pub fn read_u64_at(&self, offset: usize) -> u64 {
        self.check_range(offset, 8);
        u64::from_le_bytes(self.data[offset..offset + 8].try_into().unwrap())
    }

    pub fn read_i64_at(&self, offset: usize) -> i64 {
        self.read_u64_at(offset) as i64
    }

    /// Read `len` raw bytes.
    pub fn read_bytes_at(&self, offset: usize, len: usize) -> &[u8] {
        self.check_range(offset, len);
        &self.data[offset..offset + len]
    }

    /// Read a UTF-16LE string of `len_bytes` bytes (excluding any terminator).
    pub fn read_utf16_at(&self, offset: usize, len_bytes: usize) -> String {
        self.check_range(offset, len_bytes);
        let units: Vec<u16> = self.data[offset..offset + len_bytes]
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    }

    pub fn write_u16_at(&mut self, offset: usize, value: u16) {
        self.ensure_capacity(offset, 2);
        self.data[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
    }

    pub fn write_u32_at(&mut self, offset: usize, value: u32) {
        self.ensure_capacity(offset, 4);
        self.data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    pub fn write_u64_at(&mut self, offset: usize, value: u64) {
        self.ensure_capacity(offset, 8);
        self.data[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
    }

    /// Write `value` as NUL-terminated UTF-16LE at `offset`.
    /// Returns the number of bytes written, including the terminator.
    pub fn write_utf16_at(&mut self, offset: usize, value: &str) -> usize {
        let units: Vec<u16> = value.encode_utf16().collect();
        let total = (units.len() + 1) * 2;
        self.ensure_capacity(offset, total);
        let mut at = offset;
        for unit in units {
            self.data[at..at + 2].copy_from_slice(&unit.to_le_bytes());
            at += 2;
        }
        self.data[at..at + 2].copy_from_slice(&0u16.to_le_bytes());
        total
    }
}

/// A bounded recycling pool of reusable objects.
///
/// `acquire` pops a free slot or creates a fresh item when the free list is
/// empty (requesting more items than the bound always succeeds). Dropping
/// the returned [`Pooled`] handle resets the item and pushes it back; if the
/// free list is already full the item is dropped instead.
pub struct Pool<T> {
    free_tx: Sender<T>,
    free_rx: Receiver<T>,
    create: Box<dyn Fn() -> T + Send + Sync>,
    reset: Box<dyn Fn(&mut T) + Send + Sync>,
}

impl<T> Pool<T> {
    pub fn new<C, R>(bound: usize, create: C, reset: R) -> Pool<T>
    where
        C: Fn() -> T + Send + Sync + 'static,
        R: Fn(&mut T) + Send + Sync + 'static,
    {
        let (free_tx, free_rx) = bounded(bound.max(1));
        Pool {
            free_tx,
            free_rx,
            create: Box::new(create),
            reset: Box::new(reset),
        }
    }

    /// Take an item from the pool, creating a new one if none is free.
    pub fn acquire(&self) -> Pooled<'_, T> {
        let item = match self.free_rx.try_recv() {
            Ok(item) => item,
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => (self.create)(),
        };
        Pooled {
            item: Some(item),
            pool: self,
        }
    }

    /// Number of items currently sitting in the free list.
    pub fn free_count(&self) -> usize {
        self.free_rx.len()
    }

    fn release(&self, mut item: T) {
        (self.reset)(&mut item);
        match self.free_tx.try_send(item) {
            Ok(()) => {}
            // Pool is full: drop the item rather than grow without bound
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {}
        }
    }
}

/// RAII handle to a pooled item; returns the item to the pool on drop.
pub struct Pooled<'a, T> {
    item: Option<T>,
    pool: &'a Pool<T>,
}

impl<'a, T> Deref for Pooled<'a, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.item.as_ref().expect("pooled item already released")
    }
}

impl<'a, T> DerefMut for Pooled<'a, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.item.as_mut().expect("pooled item already released")
    }
}

impl<'a, T> Drop for Pooled<'a, T> {
    fn drop(&mut self) {
        if let Some(item) = self.item.take() {
            self.pool.release(item);
        }
    }
}

/// Pool of [`PooledBuffer`]s. Reset zeroes the content but keeps the grown
/// capacity, so recycled buffers never expose stale bytes and never shrink.
pub type BufferPool = Pool<PooledBuffer>;

pub fn buffer_pool(bound: usize, initial_capacity: usize) -> BufferPool {
    Pool::new(
        bound,
        move || PooledBuffer::new(initial_capacity),
        |buf: &mut PooledBuffer| buf.clear(),
    )
}
