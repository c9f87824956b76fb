//! Block collector
//!
//! Holds drained snapshots of the staging buffer as an ordered list of
//! blocks and serves reads of any size across block boundaries.

use std::collections::VecDeque;

use crate::staging::StagingDrain;

/// One drain's worth of bytes, consumed front to back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrainedBlock {
    data: Vec<u8>,
    /// Bytes already handed out from the front
    consumed: usize,
}

impl DrainedBlock {
    fn new(data: Vec<u8>) -> Self {
        Self { data, consumed: 0 }
    }

    /// Unread bytes
    #[inline]
    pub fn remaining(&self) -> &[u8] {
        &self.data[self.consumed..]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len() - self.consumed
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop `n` bytes from the front
    #[inline]
    fn advance(&mut self, n: usize) {
        debug_assert!(n <= self.len());
        self.consumed += n;
    }
}

/// Ordered blocks plus a running byte total.
///
/// `total` always equals the sum of `len()` over all blocks.
#[derive(Debug, Default)]
pub struct BlockCollector {
    blocks: VecDeque<DrainedBlock>,
    total: usize,
}

impl BlockCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move everything staged into a new block at the back.
    ///
    /// Returns the number of bytes collected; 0 means nothing was staged
    /// and no block was added.
    pub fn drain_from(&mut self, staging: &mut StagingDrain) -> usize {
        self.append(staging.drain())
    }

    /// Append an already drained snapshot. Empty snapshots are ignored.
    pub fn append(&mut self, snapshot: Vec<u8>) -> usize {
        let len = snapshot.len();
        if len > 0 {
            self.blocks.push_back(DrainedBlock::new(snapshot));
            self.total += len;
        }
        len
    }

    #[inline]
    pub fn has_data(&self) -> bool {
        self.total != 0
    }

    /// Bytes available to read
    #[inline]
    pub fn len(&self) -> usize {
        self.total
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    #[inline]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Take up to `n` bytes from the front.
    ///
    /// Returns exactly `min(n, len())` bytes. Blocks that are fully read are
    /// removed; a block that is only partly read keeps its unread suffix at
    /// the front.
    pub fn read(&mut self, n: usize) -> Vec<u8> {
        let want = n.min(self.total);
        if want == 0 {
            return Vec::new();
        }

        let mut out = Vec::with_capacity(want);
        while out.len() < want {
            let Some(front) = self.blocks.front_mut() else {
                break;
            };
            let take = front.len().min(want - out.len());
            out.extend_from_slice(&front.remaining()[..take]);
            front.advance(take);
            if front.is_empty() {
                self.blocks.pop_front();
            }
        }

        debug_assert_eq!(out.len(), want);
        self.total -= out.len();
        out
    }

    /// Discard every block, returning how many bytes were dropped
    pub fn clear(&mut self) -> usize {
        let dropped = self.total;
        self.blocks.clear();
        self.total = 0;
        dropped
    }
}
