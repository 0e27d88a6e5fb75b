//! Software model of a PIO block and its DMA channels.
//!
//! [`SimulatedHardware`] executes the real decode program one instruction
//! per clock and moves words from RX FIFOs into counter cells the way the
//! DMA engine would. Only the instructions and register fields the decoder
//! uses are modelled.
//!
//! Drive it from a test by changing pin levels with
//! [`set_pins`](SimulatedHardware::set_pins) and letting time pass with
//! [`run`](SimulatedHardware::run).

use heapless::Deque;

use crate::hardware::{DecoderHardware, FifoJoin, MoverConfig, SlotConfig};
use crate::pool::ClaimPool;
use crate::program::DecodeProgram;
use crate::registers::{
    INSTRUCTION_MEMORY_SIZE, JOINED_RX_FIFO_DEPTH, NUM_DMA_CHANNELS, NUM_SLOTS, RX_FIFO_DEPTH,
};

/// Sizing of the simulated hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimConfig {
    /// State machines available to claim (at most [`NUM_SLOTS`]).
    pub slots: usize,
    /// DMA channels available to claim (at most [`NUM_DMA_CHANNELS`]).
    pub channels: usize,
    /// Instruction memory words already occupied by other programs.
    pub occupied_instructions: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            slots: NUM_SLOTS,
            channels: NUM_DMA_CHANNELS,
            occupied_instructions: 0,
        }
    }
}

// ── State machine ────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct SimSlot {
    config: Option<SlotConfig>,
    enabled: bool,
    pc: u8,
    x: u32,
    y: u32,
    isr: u32,
    isr_count: u8,
    rx: Deque<u32, JOINED_RX_FIFO_DEPTH>,
    dropped: u32,
}

impl SimSlot {
    fn rx_capacity(&self) -> usize {
        match self.config.map(|c| c.fifo_join) {
            Some(FifoJoin::RxOnly) => JOINED_RX_FIFO_DEPTH,
            _ => RX_FIFO_DEPTH,
        }
    }

    fn read_source(&self, source: u8, pins: u32) -> u32 {
        match source {
            0b000 => pins,
            0b001 => self.x,
            0b010 => self.y,
            0b110 => self.isr,
            _ => 0,
        }
    }

    fn shift_in(&mut self, data: u32, bit_count: u8) {
        let Some(config) = self.config else { return };
        if bit_count >= 32 {
            self.isr = data;
        } else {
            let data = data & ((1u32 << bit_count) - 1);
            self.isr = if config.in_shift_right {
                (self.isr >> bit_count) | (data << (32 - bit_count))
            } else {
                (self.isr << bit_count) | data
            };
        }
        self.isr_count = (self.isr_count + bit_count).min(32);
        if config.autopush && self.isr_count >= config.push_threshold {
            self.push();
        }
    }

    /// Non-blocking push: a full FIFO drops the word.
    fn push(&mut self) {
        if self.rx.len() < self.rx_capacity() {
            let _ = self.rx.push_back(self.isr);
        } else {
            self.dropped += 1;
        }
        self.isr = 0;
        self.isr_count = 0;
    }

    /// Execute one instruction. Returns the new program counter if the
    /// instruction jumped.
    fn execute(&mut self, instruction: u16, pins: u32) -> Option<u8> {
        let opcode = instruction >> 13;
        let arg1 = ((instruction >> 5) & 0b111) as u8;
        let arg2 = (instruction & 0x1F) as u8;

        match opcode {
            // JMP
            0b000 => {
                let taken = match arg1 {
                    0b000 => true,
                    0b001 => self.x == 0,
                    0b010 => {
                        let taken = self.x != 0;
                        self.x = self.x.wrapping_sub(1);
                        taken
                    }
                    0b011 => self.y == 0,
                    0b100 => {
                        let taken = self.y != 0;
                        self.y = self.y.wrapping_sub(1);
                        taken
                    }
                    0b101 => self.x != self.y,
                    _ => false,
                };
                taken.then_some(arg2)
            }
            // IN
            0b010 => {
                let bit_count = if arg2 == 0 { 32 } else { arg2 };
                let data = self.read_source(arg1, pins);
                self.shift_in(data, bit_count);
                None
            }
            // PUSH (bit 7 clear) / PULL
            0b100 => {
                if instruction & 0x80 == 0 {
                    self.push();
                }
                None
            }
            // MOV
            0b101 => {
                let source = arg2 & 0b111;
                let value = match (arg2 >> 3) & 0b11 {
                    0b01 => !self.read_source(source, pins),
                    0b10 => self.read_source(source, pins).reverse_bits(),
                    _ => self.read_source(source, pins),
                };
                match arg1 {
                    0b001 => self.x = value,
                    0b010 => self.y = value,
                    0b101 => return Some((value & 0x1F) as u8),
                    0b110 => {
                        self.isr = value;
                        self.isr_count = 0;
                    }
                    _ => {}
                }
                None
            }
            // SET
            0b111 => {
                match arg1 {
                    0b001 => self.x = arg2 as u32,
                    0b010 => self.y = arg2 as u32,
                    _ => {}
                }
                None
            }
            _ => None,
        }
    }
}

// ── DMA channel ──────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct SimMover<'d> {
    config: Option<MoverConfig<'d>>,
    remaining: u32,
    busy: bool,
    restarts: u32,
}

// ── Simulated hardware ───────────────────────────────────────────────────

/// A PIO block with four state machines plus twelve DMA channels, in software.
#[derive(Debug)]
pub struct SimulatedHardware<'d> {
    instruction_memory: [u16; INSTRUCTION_MEMORY_SIZE],
    used_instructions: u32,
    slot_pool: ClaimPool,
    channel_pool: ClaimPool,
    slots: [SimSlot; NUM_SLOTS],
    movers: [SimMover<'d>; NUM_DMA_CHANNELS],
    pins: u32,
}

impl<'d> SimulatedHardware<'d> {
    pub fn new(config: SimConfig) -> Self {
        Self {
            instruction_memory: [0; INSTRUCTION_MEMORY_SIZE],
            used_instructions: config.occupied_instructions,
            slot_pool: ClaimPool::with_count(config.slots.min(NUM_SLOTS)),
            channel_pool: ClaimPool::with_count(config.channels.min(NUM_DMA_CHANNELS)),
            slots: Default::default(),
            movers: Default::default(),
            pins: 0,
        }
    }

    // -----------------------------------------------------------------------
    // Stimulus
    // -----------------------------------------------------------------------

    /// Set the level of a single GPIO. Pin numbers wrap at 32, as the PIO
    /// input mapping does.
    pub fn set_pin(&mut self, pin: u8, high: bool) {
        let mask = 1u32 << (pin % 32);
        if high {
            self.pins |= mask;
        } else {
            self.pins &= !mask;
        }
    }

    /// Set the encoder lines at `pin_base` (bit 0) and `pin_base + 1` (bit 1).
    pub fn set_pins(&mut self, pin_base: u8, state: u8) {
        self.set_pin(pin_base, state & 0b01 != 0);
        self.set_pin(pin_base.wrapping_add(1), state & 0b10 != 0);
    }

    /// Advance every enabled state machine and busy DMA channel by `cycles`
    /// clocks.
    pub fn run(&mut self, cycles: usize) {
        for _ in 0..cycles {
            self.step();
        }
    }

    fn step(&mut self) {
        let pins = self.pins;
        for slot in self.slots.iter_mut().filter(|s| s.enabled) {
            let Some(config) = slot.config else { continue };
            let instruction = self.instruction_memory[slot.pc as usize];
            slot.pc = match slot.execute(instruction, pins.rotate_right(config.in_base as u32)) {
                Some(target) => target,
                None if slot.pc == config.wrap_top => config.wrap_bottom,
                None => (slot.pc + 1) % INSTRUCTION_MEMORY_SIZE as u8,
            };
        }

        for mover in self.movers.iter_mut().filter(|m| m.busy) {
            let Some(config) = mover.config else { continue };
            let Some(word) = self.slots[config.source_slot as usize].rx.pop_front() else {
                continue;
            };
            config.destination.store(word as i32);
            mover.remaining -= 1;
            if mover.remaining == 0 {
                mover.busy = false;
            }
        }
    }

    // -----------------------------------------------------------------------
    // Inspection
    // -----------------------------------------------------------------------

    pub fn free_slots(&self) -> usize {
        self.slot_pool.free()
    }

    pub fn free_channels(&self) -> usize {
        self.channel_pool.free()
    }

    pub fn is_slot_enabled(&self, slot: u8) -> bool {
        self.slots[slot as usize].enabled
    }

    pub fn slot_config(&self, slot: u8) -> Option<SlotConfig> {
        self.slots[slot as usize].config
    }

    /// The running count held in the state machine's X register.
    pub fn slot_count(&self, slot: u8) -> i32 {
        self.slots[slot as usize].x as i32
    }

    /// Words currently waiting in the state machine's RX FIFO.
    pub fn rx_level(&self, slot: u8) -> usize {
        self.slots[slot as usize].rx.len()
    }

    /// Pushes lost because the RX FIFO was full.
    pub fn dropped_pushes(&self, slot: u8) -> u32 {
        self.slots[slot as usize].dropped
    }

    pub fn is_mover_busy(&self, channel: u8) -> bool {
        self.movers[channel as usize].busy
    }

    /// How many times the channel has been aborted and re-triggered.
    pub fn mover_restarts(&self, channel: u8) -> u32 {
        self.movers[channel as usize].restarts
    }

    /// Overwrite a channel's remaining transfer count, as if that many
    /// transfers had already happened.
    pub fn set_transfers_remaining(&mut self, channel: u8, remaining: u32) {
        let mover = &mut self.movers[channel as usize];
        mover.remaining = remaining;
        mover.busy = remaining > 0 && mover.config.is_some();
    }

    pub fn program_word(&self, address: usize) -> u16 {
        self.instruction_memory[address]
    }
}

impl<'d> DecoderHardware<'d> for SimulatedHardware<'d> {
    fn can_add_program(&self, program: &DecodeProgram) -> bool {
        self.used_instructions & program.footprint() == 0
    }

    fn add_program(&mut self, program: &DecodeProgram) {
        let origin = program.program.origin.unwrap_or(0) as usize;
        for (offset, word) in program.code().iter().enumerate() {
            self.instruction_memory[origin + offset] = *word;
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
        let sm = &mut self.slots[slot as usize];
        sm.enabled = false;
        sm.config = Some(*config);
        sm.rx.clear();
        sm.isr = 0;
        sm.isr_count = 0;
        sm.pc = config.start;
    }

    fn exec(&mut self, slot: u8, instruction: u16) {
        let pins = self.pins;
        let sm = &mut self.slots[slot as usize];
        let in_base = sm.config.map_or(0, |c| c.in_base);
        if let Some(target) = sm.execute(instruction, pins.rotate_right(in_base as u32)) {
            sm.pc = target;
        }
    }

    fn set_slot_enabled(&mut self, slot: u8, enabled: bool) {
        self.slots[slot as usize].enabled = enabled;
    }

    fn configure_mover(&mut self, channel: u8, config: MoverConfig<'d>) {
        let mover = &mut self.movers[channel as usize];
        mover.remaining = config.transfer_count;
        mover.busy = config.transfer_count > 0;
        mover.config = Some(config);
    }

    fn transfers_remaining(&self, channel: u8) -> u32 {
        self.movers[channel as usize].remaining
    }

    fn restart_mover(&mut self, channel: u8) {
        let mover = &mut self.movers[channel as usize];
        if let Some(config) = mover.config {
            mover.remaining = config.transfer_count;
            mover.busy = config.transfer_count > 0;
            mover.restarts += 1;
        }
    }
}
