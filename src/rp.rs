//! PIO and DMA register backend for the RP2040 and RP2350.
//!
//! Talks to the peripherals through `embassy_rp::pac` directly, because the
//! decoder needs what the typed embassy PIO/DMA drivers do not offer:
//! claiming state machines and channels at runtime, and DMA transfers with
//! a fixed write address paced by a PIO RX DREQ.

use core::sync::atomic::{compiler_fence, Ordering};

use embassy_rp::pac;
use embassy_rp::pac::dma::vals::{DataSize, TreqSel};

use crate::hardware::{DecoderHardware, FifoJoin, MoverConfig, SlotConfig};
use crate::pool::ClaimPool;
use crate::program::{jmp, DecodeProgram};

/// Which PIO block the decoder runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PioBlock {
    Pio0,
    Pio1,
    #[cfg(feature = "rp235xa")]
    Pio2,
}

impl PioBlock {
    fn regs(self) -> pac::pio::Pio {
        match self {
            PioBlock::Pio0 => pac::PIO0,
            PioBlock::Pio1 => pac::PIO1,
            #[cfg(feature = "rp235xa")]
            PioBlock::Pio2 => pac::PIO2,
        }
    }

    fn index(self) -> u8 {
        self as u8
    }
}

/// Resources the backend may claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RpConfig {
    pub pio: PioBlock,
    /// Bit `n` set: state machine `n` of the block may be claimed.
    pub slots: u8,
    /// Bit `n` set: DMA channel `n` may be claimed.
    pub channels: u16,
}

impl Default for RpConfig {
    fn default() -> Self {
        Self {
            pio: PioBlock::Pio0,
            slots: 0b1111,
            channels: 0x0FFF,
        }
    }
}

/// [`DecoderHardware`] implementation driving real PIO and DMA registers.
pub struct PioDmaHardware {
    block: PioBlock,
    pio: pac::pio::Pio,
    slot_pool: ClaimPool,
    channel_pool: ClaimPool,
    used_instructions: u32,
}

impl PioDmaHardware {
    /// Create a backend for the PIO block and DMA channels in `config`.
    ///
    /// Expects the PIO and DMA blocks to be out of reset, which
    /// `embassy_rp::init` takes care of.
    ///
    /// # Safety
    /// The backend assumes exclusive use of the PIO block's instruction
    /// memory and state machines, and of every DMA channel in
    /// `config.channels`. Nothing else may drive them while it exists.
    pub unsafe fn new(config: RpConfig) -> Self {
        Self {
            block: config.pio,
            pio: config.pio.regs(),
            slot_pool: ClaimPool::new(config.slots as u32 & 0b1111),
            channel_pool: ClaimPool::new(config.channels as u32 & 0x0FFF),
            used_instructions: 0,
        }
    }

    /// DREQ number of a state machine's RX FIFO.
    fn rx_dreq(&self, slot: u8) -> TreqSel {
        TreqSel::from(self.block.index() * 8 + 4 + slot)
    }
}

#[cfg(feature = "rp2040")]
fn write_trans_count(ch: pac::dma::Channel, count: u32) {
    ch.trans_count().write_value(count);
}

#[cfg(feature = "rp235xa")]
fn write_trans_count(ch: pac::dma::Channel, count: u32) {
    ch.trans_count().write(|w| {
        w.set_mode(pac::dma::vals::TransCountMode::NORMAL);
        w.set_count(count);
    });
}

#[cfg(feature = "rp2040")]
fn read_trans_count(ch: pac::dma::Channel) -> u32 {
    ch.trans_count().read()
}

#[cfg(feature = "rp235xa")]
fn read_trans_count(ch: pac::dma::Channel) -> u32 {
    ch.trans_count().read().count()
}

impl<'d> DecoderHardware<'d> for PioDmaHardware {
    fn can_add_program(&self, program: &DecodeProgram) -> bool {
        self.used_instructions & program.footprint() == 0
    }

    fn add_program(&mut self, program: &DecodeProgram) {
        let origin = program.program.origin.unwrap_or(0) as usize;
        for (offset, word) in program.code().iter().enumerate() {
            self.pio
                .instr_mem(origin + offset)
                .write(|w| w.set_instr_mem(*word));
        }
        self.used_instructions |= program.footprint();
    }

    fn claim_slot(&mut self) -> Option<u8> {
        self.slot_pool.claim()
    }

    fn unclaim_slot(&mut self, slot: u8) {
        self.slot_pool.unclaim(slot);
    }

    fn claim_channel(&mut self) -> Option<u8> {
        self.channel_pool.claim()
    }

    fn configure_slot(&mut self, slot: u8, config: &SlotConfig) {
        self.set_slot_enabled(slot, false);

        let sm = self.pio.sm(slot as usize);
        sm.clkdiv().write(|w| {
            w.set_int(1);
            w.set_frac(0);
        });
        sm.execctrl().write(|w| {
            w.set_wrap_top(config.wrap_top);
            w.set_wrap_bottom(config.wrap_bottom);
        });
        // Toggling FJOIN_RX flushes both FIFOs.
        sm.shiftctrl().write(|w| {
            w.set_in_shiftdir(config.in_shift_right);
            w.set_out_shiftdir(true);
            w.set_autopush(config.autopush);
            // A threshold of 32 is encoded as 0.
            w.set_push_thresh(config.push_threshold & 0x1F);
            w.set_fjoin_rx(config.fifo_join == FifoJoin::RxOnly);
        });
        sm.pinctrl().write(|w| w.set_in_base(config.in_base));

        let mask = 1u8 << slot;
        self.pio.ctrl().modify(|w| {
            w.set_sm_restart(mask);
            w.set_clkdiv_restart(mask);
        });
        self.exec(slot, jmp(config.start));
    }

    fn exec(&mut self, slot: u8, instruction: u16) {
        self.pio
            .sm(slot as usize)
            .instr()
            .write(|w| w.set_instr(instruction));
    }

    fn set_slot_enabled(&mut self, slot: u8, enabled: bool) {
        let mask = 1u8 << slot;
        self.pio.ctrl().modify(|w| {
            let current = w.sm_enable();
            w.set_sm_enable(if enabled { current | mask } else { current & !mask });
        });
    }

    fn configure_mover(&mut self, channel: u8, config: MoverConfig<'d>) {
        let ch = pac::DMA.ch(channel as usize);
        let source = self.pio.rxf(config.source_slot as usize).as_ptr() as u32;

        ch.read_addr().write_value(source);
        ch.write_addr().write_value(config.destination.as_ptr() as u32);
        write_trans_count(ch, config.transfer_count);
        compiler_fence(Ordering::SeqCst);

        ch.ctrl_trig().write(|w| {
            w.set_treq_sel(self.rx_dreq(config.source_slot));
            w.set_data_size(DataSize::SIZE_WORD);
            w.set_incr_read(false);
            w.set_incr_write(false);
            // Chaining to itself disables chaining.
            w.set_chain_to(channel);
            w.set_en(true);
        });
        compiler_fence(Ordering::SeqCst);
    }

    fn transfers_remaining(&self, channel: u8) -> u32 {
        read_trans_count(pac::DMA.ch(channel as usize))
    }

    fn restart_mover(&mut self, channel: u8) {
        let mask = 1u16 << channel;
        pac::DMA.chan_abort().write(|w| w.set_chan_abort(mask));
        while pac::DMA.chan_abort().read().chan_abort() & mask != 0 {}

        // Re-triggering reloads TRANS_COUNT from its last written value.
        pac::DMA
            .multi_chan_trigger()
            .write(|w| w.set_multi_chan_trigger(mask));
    }
}
