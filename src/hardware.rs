//! Capability interface between the decoder and the PIO/DMA hardware.
//!
//! [`QuadratureDecoder`](crate::QuadratureDecoder) only ever talks to the
//! hardware through [`DecoderHardware`]. Two backends implement it:
//!
//! - `rp::PioDmaHardware` drives the PIO and DMA registers of a real
//!   RP2040/RP2350 (target builds with the `rp2040` or `rp235xa` feature).
//! - `sim::SimulatedHardware` executes the same program in software
//!   (tests and the `sim` feature).

use crate::counter::CounterCell;
use crate::program::DecodeProgram;

/// How the TX and RX FIFOs of a state machine are arranged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FifoJoin {
    /// Separate 4-word TX and RX FIFOs.
    Duplex,
    /// TX storage donated to RX: one 8-word RX FIFO, no TX path.
    RxOnly,
}

/// State machine configuration written before the slot is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SlotConfig {
    /// First input pin; the program samples `in_base` and `in_base + 1`.
    pub in_base: u8,
    /// `SHIFTCTRL.IN_SHIFTDIR`. Cleared for the decoder so that each
    /// `in` places the new bits at the bottom of the ISR.
    pub in_shift_right: bool,
    /// `SHIFTCTRL.AUTOPUSH`.
    pub autopush: bool,
    /// `SHIFTCTRL.PUSH_THRESH`, 1-32.
    pub push_threshold: u8,
    pub fifo_join: FifoJoin,
    /// `EXECCTRL.WRAP_TOP`.
    pub wrap_top: u8,
    /// `EXECCTRL.WRAP_BOTTOM`.
    pub wrap_bottom: u8,
    /// Program counter the state machine starts at.
    pub start: u8,
}

/// DMA channel configuration for mirroring one slot into one counter cell.
///
/// The channel reads the slot's RX FIFO and writes the counter cell, both
/// without address increment, one 32-bit word per transfer, paced by the
/// slot's RX DREQ.
#[derive(Debug, Clone, Copy)]
pub struct MoverConfig<'d> {
    pub source_slot: u8,
    pub destination: &'d CounterCell,
    pub transfer_count: u32,
}

/// Hardware operations the decoder needs from a PIO block and its DMA
/// channels.
///
/// `'d` is the lifetime of the counter cells DMA channels write into.
pub trait DecoderHardware<'d> {
    // -----------------------------------------------------------------------
    // Program memory
    // -----------------------------------------------------------------------

    /// Whether every word the program needs at its origin is free.
    fn can_add_program(&self, program: &DecodeProgram) -> bool;

    /// Write the program into instruction memory at its origin.
    fn add_program(&mut self, program: &DecodeProgram);

    // -----------------------------------------------------------------------
    // Resource pools
    // -----------------------------------------------------------------------

    /// Claim an unused state machine.
    fn claim_slot(&mut self) -> Option<u8>;

    /// Undo a [`claim_slot`](Self::claim_slot) for a slot that was never
    /// configured.
    fn unclaim_slot(&mut self, slot: u8);

    /// Claim an unused DMA channel.
    fn claim_channel(&mut self) -> Option<u8>;

    // -----------------------------------------------------------------------
    // State machines
    // -----------------------------------------------------------------------

    /// Apply `config` to a disabled state machine, clear its FIFOs and set
    /// its program counter to `config.start`.
    fn configure_slot(&mut self, slot: u8, config: &SlotConfig);

    /// Execute a single instruction on the state machine immediately.
    fn exec(&mut self, slot: u8, instruction: u16);

    fn set_slot_enabled(&mut self, slot: u8, enabled: bool);

    // -----------------------------------------------------------------------
    // DMA channels
    // -----------------------------------------------------------------------

    /// Configure the channel and start it immediately.
    fn configure_mover(&mut self, channel: u8, config: MoverConfig<'d>);

    /// Transfers left before the channel stops.
    fn transfers_remaining(&self, channel: u8) -> u32;

    /// Abort the channel and trigger it again with its original settings,
    /// which reloads the full transfer count.
    fn restart_mover(&mut self, channel: u8);
}

impl<'d, T> DecoderHardware<'d> for &mut T
where
    T: DecoderHardware<'d> + ?Sized,
{
    fn can_add_program(&self, program: &DecodeProgram) -> bool {
        T::can_add_program(self, program)
    }

    fn add_program(&mut self, program: &DecodeProgram) {
        T::add_program(self, program)
    }

    fn claim_slot(&mut self) -> Option<u8> {
        T::claim_slot(self)
    }

    fn unclaim_slot(&mut self, slot: u8) {
        T::unclaim_slot(self, slot)
    }

    fn claim_channel(&mut self) -> Option<u8> {
        T::claim_channel(self)
    }

    fn configure_slot(&mut self, slot: u8, config: &SlotConfig) {
        T::configure_slot(self, slot, config)
    }

    fn exec(&mut self, slot: u8, instruction: u16) {
        T::exec(self, slot, instruction)
    }

    fn set_slot_enabled(&mut self, slot: u8, enabled: bool) {
        T::set_slot_enabled(self, slot, enabled)
    }

    fn configure_mover(&mut self, channel: u8, config: MoverConfig<'d>) {
        T::configure_mover(self, channel, config)
    }

    fn transfers_remaining(&self, channel: u8) -> u32 {
        T::transfers_remaining(self, channel)
    }

    fn restart_mover(&mut self, channel: u8) {
        T::restart_mover(self, channel)
    }
}
