//! The PIO decode program and the single instructions executed during setup.
//!
//! The program samples the two encoder pins in a tight loop. Each pass
//! builds a 4-bit index `previous << 2 | current` in the ISR and jumps
//! into a 16-entry table with `mov pc, isr`. The table routes to one of
//! `delta0`, `plus1` or `minus1`. X holds the running count; every change
//! is pushed to the RX FIFO without blocking.
//!
//! Pin bit 0 is `pin_base` (channel A), bit 1 is `pin_base + 1` (channel B).
//! Counting up follows the Gray sequence `00 -> 10 -> 11 -> 01 -> 00`.

use crate::registers::PROGRAM_OFFSET;

/// An assembled decode program ready to be written to instruction memory.
pub struct DecodeProgram {
    /// Assembled instruction words, to be loaded at [`PROGRAM_OFFSET`].
    pub program: pio::Program<32>,
    /// Address of the first instruction of the sampling loop.
    pub start: u8,
}

impl DecodeProgram {
    /// Instruction words of the program.
    pub fn code(&self) -> &[u16] {
        &self.program.code
    }

    /// Last instruction of the loop (`EXECCTRL.WRAP_TOP`).
    pub fn wrap_top(&self) -> u8 {
        PROGRAM_OFFSET + self.program.wrap.source
    }

    /// Jump target after the last instruction (`EXECCTRL.WRAP_BOTTOM`).
    pub fn wrap_bottom(&self) -> u8 {
        PROGRAM_OFFSET + self.program.wrap.target
    }

    /// Bitmask of the instruction memory words the program occupies.
    pub fn footprint(&self) -> u32 {
        let len = self.code().len();
        let words = if len >= 32 { u32::MAX } else { (1u32 << len) - 1 };
        words << PROGRAM_OFFSET
    }
}

/// Assemble the decode program.
pub fn decode_program() -> DecodeProgram {
    let assembled = pio::pio_asm!(
        ".origin 0",
        // Index: previous AB state in bits 3:2, current in bits 1:0.
        "    jmp delta0",  // 00 -> 00
        "    jmp minus1",  // 00 -> 01
        "    jmp plus1",   // 00 -> 10
        "    jmp delta0",  // 00 -> 11
        "    jmp plus1",   // 01 -> 00
        "    jmp delta0",  // 01 -> 01
        "    jmp delta0",  // 01 -> 10
        "    jmp minus1",  // 01 -> 11
        "    jmp minus1",  // 10 -> 00
        "    jmp delta0",  // 10 -> 01
        "    jmp delta0",  // 10 -> 10
        "    jmp plus1",   // 10 -> 11
        "    jmp delta0",  // 11 -> 00
        "    jmp plus1",   // 11 -> 01
        "    jmp minus1",  // 11 -> 10
        "    jmp delta0",  // 11 -> 11
        ".wrap_target",
        "delta0:",
        "public start:",
        "    mov isr, null",
        "    in y, 2",
        "    mov y, pins",
        "    in y, 2",
        "    mov pc, isr",
        "minus1:",
        "    jmp x-- output",
        "    jmp output",
        "plus1:",
        // x + 1 == ~(~x - 1)
        "    mov x, ~x",
        "    jmp x-- next2",
        "next2:",
        "    mov x, ~x",
        "output:",
        "    mov isr, x",
        "    push noblock",
        ".wrap",
    );

    DecodeProgram {
        program: assembled.program,
        start: PROGRAM_OFFSET + assembled.public_defines.start as u8,
    }
}

// ---------------------------------------------------------------------------
// Setup instructions executed with SMx_INSTR
// ---------------------------------------------------------------------------

/// `set x, value` (5-bit immediate).
pub const fn set_x(value: u8) -> u16 {
    0b111_00000_001_00000 | (value as u16 & 0x1F)
}

/// `mov y, pins`
pub const MOV_Y_PINS: u16 = 0b101_00000_010_00_000;

/// `jmp address` (unconditional).
pub const fn jmp(address: u8) -> u16 {
    address as u16 & 0x1F
}
