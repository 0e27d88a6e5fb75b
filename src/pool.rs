//! Claim bookkeeping for finite hardware resources.
//!
//! State machines and DMA channels are tracked the same way: a bitmask of
//! identifiers the pool may hand out, and a bitmask of identifiers already
//! handed out. Claims always return the lowest free identifier.

/// A pool of up to 32 numbered hardware resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimPool {
    available: u32,
    claimed: u32,
}

impl ClaimPool {
    /// Create a pool containing the identifiers whose bits are set in `available`.
    pub const fn new(available: u32) -> Self {
        Self {
            available,
            claimed: 0,
        }
    }

    /// Create a pool containing identifiers `0..count`.
    pub const fn with_count(count: usize) -> Self {
        let available = if count >= 32 {
            u32::MAX
        } else {
            (1u32 << count) - 1
        };
        Self::new(available)
    }

    /// Claim the lowest free identifier, or `None` if the pool is exhausted.
    pub fn claim(&mut self) -> Option<u8> {
        let free = self.available & !self.claimed;
        if free == 0 {
            return None;
        }
        let id = free.trailing_zeros();
        self.claimed |= 1 << id;
        Some(id as u8)
    }

    /// Return an identifier to the pool.
    ///
    /// Only used to undo a claim within a single failed bind; bound
    /// resources are never released.
    pub fn unclaim(&mut self, id: u8) {
        self.claimed &= !(1u32 << id);
    }

    /// Number of identifiers still free.
    pub fn free(&self) -> usize {
        (self.available & !self.claimed).count_ones() as usize
    }
}
