//! Counter cells mirrored by DMA.

use core::sync::atomic::{AtomicI32, Ordering};

use crate::registers::NUM_SLOTS;

/// A 32-bit count written by exactly one DMA channel and read by the host.
///
/// The DMA engine writes the cell behind the compiler's back, so all host
/// accesses go through an atomic. Only one host context should read a given
/// cell; reads from several contexts are not synchronised with each other.
#[repr(transparent)]
#[derive(Debug, Default)]
pub struct CounterCell(AtomicI32);

impl CounterCell {
    /// A cell holding 0.
    pub const fn new() -> Self {
        Self(AtomicI32::new(0))
    }

    /// Latest value written by the DMA channel.
    pub fn load(&self) -> i32 {
        self.0.load(Ordering::Acquire)
    }

    /// Overwrite the cell, used to reset it before a channel is started.
    pub fn store(&self, value: i32) {
        self.0.store(value, Ordering::Release)
    }

    /// Address the DMA channel writes to.
    pub fn as_ptr(&self) -> *mut i32 {
        self.0.as_ptr()
    }
}

/// One counter cell per state machine, indexed by slot.
///
/// The bank must outlive the decoder that writes into it, and must not move
/// while DMA channels point at it. [`QuadratureDecoder`] borrows it for its
/// whole lifetime to guarantee both.
///
/// [`QuadratureDecoder`]: crate::QuadratureDecoder
#[derive(Debug, Default)]
pub struct CounterBank {
    cells: [CounterCell; NUM_SLOTS],
}

impl CounterBank {
    /// A bank with every cell at 0. Usable in a `static`.
    pub const fn new() -> Self {
        Self {
            cells: [const { CounterCell::new() }; NUM_SLOTS],
        }
    }

    /// Panics if `slot >= NUM_SLOTS`.
    pub fn cell(&self, slot: usize) -> &CounterCell {
        &self.cells[slot]
    }

    pub(crate) fn clear(&self) {
        for cell in &self.cells {
            cell.store(0);
        }
    }
}
