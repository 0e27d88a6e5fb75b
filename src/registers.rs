//! Hardware constants for the RP2040/RP2350 PIO and DMA blocks.
//!
//! Each PIO block has four state machines sharing one 32-word instruction
//! memory. Each state machine has a 4-word TX FIFO and a 4-word RX FIFO,
//! which can be joined into a single 8-word FIFO in one direction.

// ---------------------------------------------------------------------------
// PIO block
// ---------------------------------------------------------------------------

/// Number of state machines (decode slots) in one PIO block.
pub const NUM_SLOTS: usize = 4;

/// Number of instruction words in a PIO block's shared instruction memory.
pub const INSTRUCTION_MEMORY_SIZE: usize = 32;

/// Depth of an unjoined RX FIFO.
pub const RX_FIFO_DEPTH: usize = 4;

/// Depth of the RX FIFO once the TX FIFO has been joined into it.
pub const JOINED_RX_FIFO_DEPTH: usize = 2 * RX_FIFO_DEPTH;

/// The decode program must be loaded at this offset. Its jump table is
/// entered with `mov pc, isr`, which cannot be relocated.
pub const PROGRAM_OFFSET: u8 = 0;

// ---------------------------------------------------------------------------
// DMA block
// ---------------------------------------------------------------------------

/// Number of DMA channels on both RP2040 and RP2350.
pub const NUM_DMA_CHANNELS: usize = 12;

/// Largest transfer count a DMA channel accepts.
///
/// The RP2350 reserves the top four bits of `TRANS_COUNT` for the transfer
/// mode, leaving 28 bits of count.
#[cfg(not(feature = "rp235xa"))]
pub const MAX_TRANSFER_COUNT: u32 = 0xFFFF_FFFF;
#[cfg(feature = "rp235xa")]
pub const MAX_TRANSFER_COUNT: u32 = 0x0FFF_FFFF;

/// Remaining-transfer level at or below which a mover channel is restarted.
///
/// Half of [`MAX_TRANSFER_COUNT`], rounded up.
pub const REFRESH_THRESHOLD: u32 = MAX_TRANSFER_COUNT / 2 + 1;
