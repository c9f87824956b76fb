//! Fixed-capacity staging buffer
//!
//! Bytes from the producer accumulate here until a drain moves all of them
//! out at once. This is a fill-then-flush accumulator, not a ring: every
//! drain empties the buffer and the next push writes from offset 0 again.
//!
//! # Cursor protocol
//!
//! `head` (bytes ever accepted) and `tail` (bytes ever drained) are 32-bit
//! positions that wrap modulo 2^32, packed into a single `AtomicU64` so
//! both halves always change together:
//!
//! - push: copy the packet to offset `head - tail`, then CAS `head += len`
//!   (Release). If the CAS fails a drain reset the buffer in between, so the
//!   copy is redone at the new offset.
//! - drain: load (Acquire), copy `[0, head - tail)`, then CAS `tail = head`
//!   (AcqRel). If the CAS fails the writer appended more, so the new bytes
//!   are copied too before retrying.
//!
//! The writer only ever writes above the published `head`, and a drain only
//! reads below it, so the two never touch the same bytes concurrently.
//! [`StagingBuffer::split`] hands out exactly one [`StagingWriter`] and one
//! [`StagingDrain`], each needing `&mut self`, which keeps the protocol
//! single-writer / single-drainer.

use core::fmt;
use core::ops::Deref;
use std::cell::UnsafeCell;
use std::ptr;
use std::slice;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_utils::CachePadded;

use crate::constants::MAX_STAGING_CAPACITY;
use crate::error::ErrorKind;
use crate::stats::Stats;

/// Unpacked view of the cursor word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Cursors {
    head: u32,
    tail: u32,
}

impl Cursors {
    #[inline]
    fn unpack(word: u64) -> Self {
        Cursors {
            head: (word >> 32) as u32,
            tail: word as u32,
        }
    }

    #[inline]
    fn pack(self) -> u64 {
        ((self.head as u64) << 32) | self.tail as u64
    }

    #[inline]
    fn staged(self) -> usize {
        self.head.wrapping_sub(self.tail) as usize
    }
}

/// Shared storage and cursors.
///
/// Read-only queries are available on the shared value; mutation goes
/// through the [`StagingWriter`] and [`StagingDrain`] halves.
pub struct StagingBuffer {
    storage: Box<[UnsafeCell<u8>]>,
    cursors: CachePadded<AtomicU64>,
}

// Safety: storage is only written by the unique StagingWriter and only read
// by the unique StagingDrain, on disjoint ranges ordered by the cursor word.
unsafe impl Sync for StagingBuffer {}

impl StagingBuffer {
    /// Allocate a buffer of `capacity` bytes and split it into its two halves.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0 or above [`MAX_STAGING_CAPACITY`].
    pub fn split(capacity: usize) -> (StagingWriter, StagingDrain) {
        assert!(
            capacity > 0 && capacity <= MAX_STAGING_CAPACITY,
            "staging capacity must be in 1..={}",
            MAX_STAGING_CAPACITY
        );

        let buffer = Arc::new(StagingBuffer {
            storage: (0..capacity).map(|_| UnsafeCell::new(0)).collect(),
            cursors: CachePadded::new(AtomicU64::new(0)),
        });

        (
            StagingWriter {
                buffer: Arc::clone(&buffer),
            },
            StagingDrain { buffer },
        )
    }

    /// Capacity `C` in bytes
    #[inline]
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Bytes currently staged (`head - tail`)
    #[inline]
    pub fn staged(&self) -> usize {
        self.load().staged()
    }

    /// Bytes that can still be pushed before the next drain
    #[inline]
    pub fn free(&self) -> usize {
        self.capacity() - self.staged()
    }

    /// `staged / capacity`, in `[0, 1]`
    #[inline]
    pub fn fullness(&self) -> f32 {
        self.staged() as f32 / self.capacity() as f32
    }

    #[inline]
    fn load(&self) -> Cursors {
        Cursors::unpack(self.cursors.load(Ordering::Acquire))
    }

    #[inline]
    fn base(&self) -> *mut u8 {
        UnsafeCell::raw_get(self.storage.as_ptr())
    }
}

impl fmt::Debug for StagingBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StagingBuffer")
            .field("capacity", &self.capacity())
            .field("staged", &self.staged())
            .finish()
    }
}

/// Producer half. Not `Clone`: there is exactly one writer.
#[derive(Debug)]
pub struct StagingWriter {
    buffer: Arc<StagingBuffer>,
}

impl StagingWriter {
    /// Stage a whole packet or drop it.
    ///
    /// Returns the stats delta for this call: one received packet on
    /// success, or one dropped packet with [`ErrorKind::OutOfAllocatedMemory`]
    /// when the packet is larger than the capacity or than the free space.
    /// An empty packet is ignored and yields an empty delta.
    ///
    /// Never blocks and never allocates.
    pub fn push(&mut self, bytes: &[u8]) -> Stats {
        let len = bytes.len();
        if len == 0 {
            return Stats::default();
        }

        let buffer = &*self.buffer;
        let capacity = buffer.capacity();
        if len > capacity {
            return Stats::dropped(len as u64, ErrorKind::OutOfAllocatedMemory);
        }

        let mut current = buffer.load();
        loop {
            let staged = current.staged();
            if len > capacity - staged {
                return Stats::dropped(len as u64, ErrorKind::OutOfAllocatedMemory);
            }

            // Safety: staged + len <= capacity, and the range lies above every
            // published byte so no drain is reading it.
            unsafe {
                ptr::copy_nonoverlapping(bytes.as_ptr(), buffer.base().add(staged), len);
            }

            let next = Cursors {
                head: current.head.wrapping_add(len as u32),
                tail: current.tail,
            };
            match buffer.cursors.compare_exchange(
                current.pack(),
                next.pack(),
                Ordering::Release,
                Ordering::Acquire,
            ) {
                Ok(_) => return Stats::received(len as u64),
                // Drained under us: staged is now 0, write again from the start.
                Err(actual) => current = Cursors::unpack(actual),
            }
        }
    }

    /// Shared view of the buffer
    #[inline]
    pub fn buffer(&self) -> &Arc<StagingBuffer> {
        &self.buffer
    }
}

impl Deref for StagingWriter {
    type Target = StagingBuffer;

    #[inline]
    fn deref(&self) -> &StagingBuffer {
        &self.buffer
    }
}

/// Drain half. Not `Clone`: drains must be serialised by the owner.
#[derive(Debug)]
pub struct StagingDrain {
    buffer: Arc<StagingBuffer>,
}

impl StagingDrain {
    /// Take every staged byte, leaving the buffer empty.
    ///
    /// Returns an empty vector (without allocating) if nothing is staged.
    pub fn drain(&mut self) -> Vec<u8> {
        let buffer = &*self.buffer;
        let mut out = Vec::new();
        let mut current = buffer.load();

        loop {
            let staged = current.staged();
            if staged == 0 {
                return out;
            }

            let copied = out.len();
            // Safety: [copied, staged) is below the published head, which the
            // writer never rewrites until this drain moves tail.
            let published =
                unsafe { slice::from_raw_parts(buffer.base().add(copied), staged - copied) };
            out.extend_from_slice(published);

            let next = Cursors {
                head: current.head,
                tail: current.head,
            };
            match buffer.cursors.compare_exchange(
                current.pack(),
                next.pack(),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return out,
                // The writer appended; tail is unchanged so the copy so far stays valid.
                Err(actual) => current = Cursors::unpack(actual),
            }
        }
    }
}

impl Deref for StagingDrain {
    type Target = StagingBuffer;

    #[inline]
    fn deref(&self) -> &StagingBuffer {
        &self.buffer
    }
}
