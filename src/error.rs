//! Error types for the quadrature decoder.

use core::fmt;

/// Errors reported while setting up the decoder.
///
/// Out-of-range slot indices are not represented here: they can only come
/// from a caller bug and cause a panic instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderError {
    /// The PIO instruction memory cannot hold the decode program at offset 0.
    ProgramSpace,

    /// Every state machine in the PIO block is already claimed.
    NoFreeSlot,

    /// Every DMA channel available to the decoder is already claimed.
    NoFreeChannel,
}

impl DecoderError {
    /// The value the C-style API used for exhaustion failures.
    pub const fn sentinel(self) -> i32 {
        -1
    }
}

impl fmt::Display for DecoderError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DecoderError::ProgramSpace => {
                write!(f, "Not enough PIO instruction memory for the decode program")
            }
            DecoderError::NoFreeSlot => write!(f, "No free PIO state machine"),
            DecoderError::NoFreeChannel => write!(f, "No free DMA channel"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for DecoderError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            DecoderError::ProgramSpace => defmt::write!(f, "Insufficient PIO program space"),
            DecoderError::NoFreeSlot => defmt::write!(f, "No free PIO state machine"),
            DecoderError::NoFreeChannel => defmt::write!(f, "No free DMA channel"),
        }
    }
}
