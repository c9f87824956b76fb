//! Throughput and drop counters
//!
//! [`Stats`] is a plain value: the staging buffer returns one per push as a
//! delta, and deltas are merged with `+=`. [`StatsCell`] holds the running
//! totals for a controller. It is a sequence lock over atomics: the single
//! producer updates it without waiting, readers copy out a consistent
//! snapshot and retry if they raced an update.

use core::ops::{Add, AddAssign};
use std::sync::atomic::{fence, AtomicU64, AtomicU8, Ordering};

use crossbeam_utils::Backoff;

use crate::error::ErrorKind;

/// Counters for accepted and rejected packets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub bytes_received: u64,
    pub packets_received: u64,
    pub bytes_dropped: u64,
    pub packets_dropped: u64,
    /// Kind of the most recent rejection. Not cleared by later successes.
    pub last_error: ErrorKind,
}

impl Stats {
    /// Delta for one accepted packet of `len` bytes
    #[inline]
    pub const fn received(len: u64) -> Self {
        Stats {
            bytes_received: len,
            packets_received: 1,
            bytes_dropped: 0,
            packets_dropped: 0,
            last_error: ErrorKind::None,
        }
    }

    /// Delta for one rejected packet of `len` bytes
    #[inline]
    pub const fn dropped(len: u64, kind: ErrorKind) -> Self {
        Stats {
            bytes_received: 0,
            packets_received: 0,
            bytes_dropped: len,
            packets_dropped: 1,
            last_error: kind,
        }
    }

    /// Packets offered to the producer path, accepted or not
    #[inline]
    pub fn packets_total(&self) -> u64 {
        self.packets_received + self.packets_dropped
    }

    /// Fraction of offered packets that were dropped (0.0 when idle)
    pub fn drop_ratio(&self) -> f64 {
        match self.packets_total() {
            0 => 0.0,
            total => self.packets_dropped as f64 / total as f64,
        }
    }

    /// True if nothing has been counted
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.packets_total() == 0 && !self.last_error.is_error()
    }
}

impl AddAssign for Stats {
    fn add_assign(&mut self, rhs: Stats) {
        self.bytes_received += rhs.bytes_received;
        self.packets_received += rhs.packets_received;
        self.bytes_dropped += rhs.bytes_dropped;
        self.packets_dropped += rhs.packets_dropped;
        if rhs.last_error.is_error() {
            self.last_error = rhs.last_error;
        }
    }
}

impl Add for Stats {
    type Output = Stats;

    fn add(mut self, rhs: Stats) -> Stats {
        self += rhs;
        self
    }
}

/// Shared running totals with lock-free snapshots.
///
/// Exactly one thread may call [`record`](Self::record) at a time; any
/// number may call [`snapshot`](Self::snapshot).
#[derive(Debug, Default)]
pub struct StatsCell {
    /// Odd while an update is in progress
    seq: AtomicU64,
    bytes_received: AtomicU64,
    packets_received: AtomicU64,
    bytes_dropped: AtomicU64,
    packets_dropped: AtomicU64,
    last_error: AtomicU8,
}

impl StatsCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a delta into the totals
    pub fn record(&self, delta: &Stats) {
        let seq = self.seq.load(Ordering::Relaxed);
        self.seq.store(seq.wrapping_add(1), Ordering::Relaxed);
        fence(Ordering::Release);

        self.bytes_received
            .fetch_add(delta.bytes_received, Ordering::Relaxed);
        self.packets_received
            .fetch_add(delta.packets_received, Ordering::Relaxed);
        self.bytes_dropped
            .fetch_add(delta.bytes_dropped, Ordering::Relaxed);
        self.packets_dropped
            .fetch_add(delta.packets_dropped, Ordering::Relaxed);
        if delta.last_error.is_error() {
            self.last_error
                .store(delta.last_error as u8, Ordering::Relaxed);
        }

        self.seq.store(seq.wrapping_add(2), Ordering::Release);
    }

    /// Copy out a consistent view of the totals
    pub fn snapshot(&self) -> Stats {
        let backoff = Backoff::new();
        loop {
            let before = self.seq.load(Ordering::Acquire);
            if before & 1 == 0 {
                let stats = Stats {
                    bytes_received: self.bytes_received.load(Ordering::Relaxed),
                    packets_received: self.packets_received.load(Ordering::Relaxed),
                    bytes_dropped: self.bytes_dropped.load(Ordering::Relaxed),
                    packets_dropped: self.packets_dropped.load(Ordering::Relaxed),
                    last_error: ErrorKind::from_u8(self.last_error.load(Ordering::Relaxed)),
                };
                fence(Ordering::Acquire);
                if self.seq.load(Ordering::Relaxed) == before {
                    return stats;
                }
            }
            backoff.snooze();
        }
    }
}
