//! Quadrature decoder context: binding encoders to PIO state machines and
//! DMA channels, and reading their counts.
//!
//! [`QuadratureDecoder`] owns a hardware backend and borrows a
//! [`CounterBank`]. Each encoder gets one state machine running the decode
//! program and one DMA channel that mirrors the state machine's latest count
//! into the encoder's counter cell. Reading a count never touches the state
//! machine; it only reads memory and, occasionally, reloads the DMA channel.

use crate::counter::CounterBank;
use crate::error::DecoderError;
use crate::hardware::{DecoderHardware, FifoJoin, MoverConfig, SlotConfig};
use crate::program::{decode_program, set_x, MOV_Y_PINS};
use crate::registers::{MAX_TRANSFER_COUNT, NUM_SLOTS, REFRESH_THRESHOLD};

/// Whether a DMA channel with `remaining` transfers left should be reloaded.
pub const fn needs_refresh(remaining: u32) -> bool {
    remaining <= REFRESH_THRESHOLD
}

/// Quadrature encoder counting on one PIO block.
///
/// Up to [`NUM_SLOTS`] encoders can be bound, limited further by the DMA
/// channels the backend is allowed to claim. The slot index returned by
/// [`add_decoder`](Self::add_decoder) is the encoder's handle.
///
/// # Example
///
/// ```ignore
/// use pio_quadrature::{CounterBank, QuadratureDecoder};
///
/// static COUNTERS: CounterBank = CounterBank::new();
///
/// // `hardware` is any `DecoderHardware` backend
/// let mut decoder = QuadratureDecoder::init(hardware, &COUNTERS)?;
/// let encoder = decoder.add_decoder(9)?;
///
/// let ticks = decoder.count(encoder);
/// ```
pub struct QuadratureDecoder<'d, H> {
    hardware: H,
    counters: &'d CounterBank,
    channels: [Option<u8>; NUM_SLOTS],
    wrap_top: u8,
    wrap_bottom: u8,
    start: u8,
}

impl<'d, H> QuadratureDecoder<'d, H>
where
    H: DecoderHardware<'d>,
{
    /// Load the decode program and create an empty decoder context.
    ///
    /// The program is always loaded at offset 0. All counter cells are
    /// reset to zero.
    ///
    /// # Arguments
    /// * `hardware` — backend for the PIO block (takes ownership)
    /// * `counters` — counter cells the DMA channels will write into
    ///
    /// # Errors
    /// * [`DecoderError::ProgramSpace`] if any instruction word the program
    ///   needs is already in use. Nothing is written in that case.
    pub fn init(mut hardware: H, counters: &'d CounterBank) -> Result<Self, DecoderError> {
        let program = decode_program();
        if !hardware.can_add_program(&program) {
            #[cfg(feature = "defmt")]
            defmt::warn!("Decode program does not fit at offset 0");
            return Err(DecoderError::ProgramSpace);
        }

        hardware.add_program(&program);
        counters.clear();

        #[cfg(feature = "defmt")]
        defmt::debug!("Decode program loaded ({} words)", program.code().len());

        Ok(Self {
            hardware,
            counters,
            channels: [None; NUM_SLOTS],
            wrap_top: program.wrap_top(),
            wrap_bottom: program.wrap_bottom(),
            start: program.start,
        })
    }

    // -----------------------------------------------------------------------
    // Binding
    // -----------------------------------------------------------------------

    /// Start counting an encoder wired to `pin_base` and `pin_base + 1`.
    ///
    /// The pins must already be configured as inputs with a defined idle
    /// level. Both resources are claimed before anything is configured; if
    /// the DMA claim fails the state machine is handed back, so a failed
    /// call leaves no trace.
    ///
    /// # Arguments
    /// * `pin_base` — GPIO of channel A; channel B is the next GPIO
    ///
    /// # Returns
    /// The slot index that identifies this encoder in [`count`](Self::count).
    ///
    /// # Errors
    /// * [`DecoderError::NoFreeSlot`] if all state machines are claimed
    /// * [`DecoderError::NoFreeChannel`] if no DMA channel is left
    pub fn add_decoder(&mut self, pin_base: u8) -> Result<usize, DecoderError> {
        let slot = self.hardware.claim_slot().ok_or(DecoderError::NoFreeSlot)?;
        let channel = match self.hardware.claim_channel() {
            Some(channel) => channel,
            None => {
                self.hardware.unclaim_slot(slot);
                return Err(DecoderError::NoFreeChannel);
            }
        };
        let index = slot as usize;

        // No TX path is used, so join the FIFOs for an 8-deep RX buffer.
        let config = SlotConfig {
            in_base: pin_base,
            in_shift_right: false,
            autopush: false,
            push_threshold: 32,
            fifo_join: FifoJoin::RxOnly,
            wrap_top: self.wrap_top,
            wrap_bottom: self.wrap_bottom,
            start: self.start,
        };
        self.hardware.configure_slot(slot, &config);

        self.channels[index] = Some(channel);
        let counters: &'d CounterBank = self.counters;
        let counter = counters.cell(index);
        self.hardware.configure_mover(
            channel,
            MoverConfig {
                source_slot: slot,
                destination: counter,
                transfer_count: MAX_TRANSFER_COUNT,
            },
        );

        // X holds the running count; Y the previous pin state.
        counter.store(0);
        self.hardware.exec(slot, set_x(0));
        self.hardware.exec(slot, MOV_Y_PINS);
        self.hardware.set_slot_enabled(slot, true);

        #[cfg(feature = "defmt")]
        defmt::info!(
            "Encoder on GP{}/GP{}: slot {}, DMA channel {}",
            pin_base,
            pin_base.wrapping_add(1),
            slot,
            channel
        );

        Ok(index)
    }

    // -----------------------------------------------------------------------
    // Reading
    // -----------------------------------------------------------------------

    /// Current tick count of the encoder bound to `slot`.
    ///
    /// Returns the value most recently copied by DMA, which may trail the
    /// state machine's own count by the DMA latency. Also reloads the DMA
    /// channel if its transfer budget has fallen to half.
    ///
    /// Whether `slot` was actually bound is not checked; an unbound slot
    /// reads as 0.
    ///
    /// # Panics
    /// If `slot >= NUM_SLOTS`. A valid handle only ever comes from
    /// [`add_decoder`](Self::add_decoder).
    pub fn count(&mut self, slot: usize) -> i32 {
        assert!(slot < NUM_SLOTS, "slot index {} out of range", slot);
        let count = self.counters.cell(slot).load();
        self.refresh_if_needed(slot);
        count
    }

    /// Counts of every slot, `None` for slots without an encoder.
    pub fn read_all_counts(&mut self) -> [Option<i32>; NUM_SLOTS] {
        let mut counts = [None; NUM_SLOTS];
        for slot in 0..NUM_SLOTS {
            if self.is_bound(slot) {
                counts[slot] = Some(self.count(slot));
            }
        }
        counts
    }

    /// Reload the slot's DMA channel if fewer than half of its transfers
    /// remain.
    ///
    /// Aborting and re-triggering the channel restores its original
    /// settings, including the full transfer count. Words the state machine
    /// pushes in the meantime wait in its RX FIFO.
    pub fn refresh_if_needed(&mut self, slot: usize) {
        let Some(channel) = self.channels[slot] else {
            return;
        };

        let remaining = self.hardware.transfers_remaining(channel);
        if !needs_refresh(remaining) {
            return;
        }

        self.hardware.restart_mover(channel);

        #[cfg(feature = "defmt")]
        defmt::debug!(
            "DMA channel {} reloaded ({} transfers were left)",
            channel,
            remaining
        );
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// Whether an encoder has been bound to `slot`.
    pub fn is_bound(&self, slot: usize) -> bool {
        self.channel(slot).is_some()
    }

    /// DMA channel mirroring `slot`, if bound.
    pub fn channel(&self, slot: usize) -> Option<u8> {
        self.channels.get(slot).copied().flatten()
    }

    /// The hardware backend.
    pub fn hardware(&self) -> &H {
        &self.hardware
    }

    /// Mutable access to the hardware backend.
    pub fn hardware_mut(&mut self) -> &mut H {
        &mut self.hardware
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimConfig, SimulatedHardware};

    const FORWARD: [u8; 4] = [0b10, 0b11, 0b01, 0b00];
    const REVERSE: [u8; 4] = [0b01, 0b11, 0b10, 0b00];

    type SimDecoder<'d> = QuadratureDecoder<'d, SimulatedHardware<'d>>;

    fn decoder_with(config: SimConfig, counters: &CounterBank) -> SimDecoder<'_> {
        QuadratureDecoder::init(SimulatedHardware::new(config), counters).unwrap()
    }

    /// Walk the pins through `steps` states of `sequence`, starting from 00,
    /// giving the state machine and DMA time to catch up after each one.
    struct Walker {
        pin_base: u8,
        phase: usize,
    }

    impl Walker {
        fn new(pin_base: u8) -> Self {
            Self { pin_base, phase: 0 }
        }

        fn forward(&mut self, decoder: &mut SimDecoder<'_>, steps: usize) {
            for _ in 0..steps {
                let state = FORWARD[self.phase];
                self.phase = (self.phase + 1) % 4;
                decoder.hardware_mut().set_pins(self.pin_base, state);
                decoder.hardware_mut().run(32);
            }
        }

        fn reverse(&mut self, decoder: &mut SimDecoder<'_>, steps: usize) {
            for _ in 0..steps {
                // Current state is FORWARD[phase - 1]; step back one.
                self.phase = (self.phase + 3) % 4;
                let state = FORWARD[(self.phase + 3) % 4];
                decoder.hardware_mut().set_pins(self.pin_base, state);
                decoder.hardware_mut().run(32);
            }
        }
    }

    // ── Program loading ──────────────────────────────────────────────

    #[test]
    fn init_zeroes_counters() {
        let counters = CounterBank::new();
        counters.cell(2).store(55);
        let _decoder = decoder_with(SimConfig::default(), &counters);
        assert_eq!(counters.cell(2).load(), 0);
    }

    #[test]
    fn init_fails_without_program_space() {
        let counters = CounterBank::new();
        counters.cell(0).store(7);
        let mut sim = SimulatedHardware::new(SimConfig {
            occupied_instructions: 1 << 20,
            ..SimConfig::default()
        });

        let result = QuadratureDecoder::init(&mut sim, &counters);
        assert!(matches!(result, Err(DecoderError::ProgramSpace)));

        // Nothing written.
        assert_eq!(sim.program_word(0), 0);
        assert_eq!(counters.cell(0).load(), 7);
    }

    // ── Binding ──────────────────────────────────────────────────────

    #[test]
    fn add_decoder_returns_distinct_slots() {
        let counters = CounterBank::new();
        let mut decoder = decoder_with(SimConfig::default(), &counters);

        let mut seen = [false; NUM_SLOTS];
        for pin_base in [0, 9, 14, 26] {
            let slot = decoder.add_decoder(pin_base).unwrap();
            assert!(!seen[slot]);
            seen[slot] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn add_decoder_configures_and_starts_slot() {
        let counters = CounterBank::new();
        let mut decoder = decoder_with(SimConfig::default(), &counters);
        let slot = decoder.add_decoder(9).unwrap() as u8;

        let sim = decoder.hardware();
        let config = sim.slot_config(slot).unwrap();
        assert_eq!(config.in_base, 9);
        assert_eq!(config.fifo_join, FifoJoin::RxOnly);
        assert_eq!(config.push_threshold, 32);
        assert!(!config.autopush);
        assert!(sim.is_slot_enabled(slot));

        let channel = decoder.channel(slot as usize).unwrap();
        assert!(sim.is_mover_busy(channel));
        assert_eq!(sim.transfers_remaining(channel), MAX_TRANSFER_COUNT);
    }

    #[test]
    fn exhausting_slots_fails_next_call() {
        let counters = CounterBank::new();
        let mut decoder = decoder_with(SimConfig::default(), &counters);

        for slot in 0..NUM_SLOTS {
            assert_eq!(decoder.add_decoder(2 * slot as u8), Ok(slot));
        }
        Walker::new(0).forward(&mut decoder, 5);
        Walker::new(4).reverse(&mut decoder, 2);

        let counts_before = [0, 1, 2, 3].map(|s| counters.cell(s).load());
        let channels_before = [0, 1, 2, 3].map(|s| decoder.channel(s));
        assert_eq!(counts_before, [5, 0, -2, 0]);

        let err = decoder.add_decoder(20).unwrap_err();
        assert_eq!(err, DecoderError::NoFreeSlot);
        assert_eq!(err.sentinel(), -1);

        decoder.hardware_mut().run(64);
        assert_eq!([0, 1, 2, 3].map(|s| counters.cell(s).load()), counts_before);
        assert_eq!([0, 1, 2, 3].map(|s| decoder.channel(s)), channels_before);
    }

    #[test]
    fn channel_exhaustion_rolls_back_slot() {
        let counters = CounterBank::new();
        let mut decoder = decoder_with(
            SimConfig {
                channels: 1,
                ..SimConfig::default()
            },
            &counters,
        );

        let first = decoder.add_decoder(0).unwrap();
        let mut walker = Walker::new(0);
        walker.forward(&mut decoder, 3);
        let counts_before = [0, 1, 2, 3].map(|s| counters.cell(s).load());
        let channels_before = [0, 1, 2, 3].map(|s| decoder.channel(s));

        assert_eq!(decoder.add_decoder(4), Err(DecoderError::NoFreeChannel));

        assert_eq!([0, 1, 2, 3].map(|s| counters.cell(s).load()), counts_before);
        assert_eq!([0, 1, 2, 3].map(|s| decoder.channel(s)), channels_before);
        assert_eq!(decoder.hardware().free_slots(), NUM_SLOTS - 1);
        assert!(!decoder.hardware().is_slot_enabled(1));
        assert_eq!(decoder.count(first), 3);
    }

    // ── Counting ─────────────────────────────────────────────────────

    #[test]
    fn count_is_zero_after_binding() {
        let counters = CounterBank::new();
        let mut decoder = decoder_with(SimConfig::default(), &counters);
        let slot = decoder.add_decoder(9).unwrap();
        decoder.hardware_mut().run(100);
        assert_eq!(decoder.count(slot), 0);
    }

    #[test]
    fn baseline_uses_live_pin_state() {
        let counters = CounterBank::new();
        let mut decoder = decoder_with(SimConfig::default(), &counters);

        // Encoder resting at 11 when bound must not register a movement.
        decoder.hardware_mut().set_pins(9, 0b11);
        let slot = decoder.add_decoder(9).unwrap();
        decoder.hardware_mut().run(100);
        assert_eq!(decoder.count(slot), 0);

        // 11 -> 01 is one step forward.
        decoder.hardware_mut().set_pins(9, 0b01);
        decoder.hardware_mut().run(32);
        assert_eq!(decoder.count(slot), 1);
    }

    #[test]
    fn repeated_reads_are_stable() {
        let counters = CounterBank::new();
        let mut decoder = decoder_with(SimConfig::default(), &counters);
        let slot = decoder.add_decoder(9).unwrap();
        Walker::new(9).forward(&mut decoder, 5);

        let first = decoder.count(slot);
        for _ in 0..10 {
            decoder.hardware_mut().run(50);
            assert_eq!(decoder.count(slot), first);
        }
    }

    #[test]
    fn thirty_seven_forward_steps_on_gp9() {
        let counters = CounterBank::new();
        let mut decoder = decoder_with(SimConfig::default(), &counters);

        let slot = decoder.add_decoder(9).unwrap();
        assert_eq!(slot, 0);

        Walker::new(9).forward(&mut decoder, 37);
        assert_eq!(decoder.count(0), 37);
    }

    #[test]
    fn channel_b_wraps_to_gp0_above_gp31() {
        let counters = CounterBank::new();
        let mut decoder = decoder_with(SimConfig::default(), &counters);

        let high = decoder.add_decoder(31).unwrap();
        let wrapped = decoder.add_decoder(u8::MAX).unwrap();

        Walker::new(31).forward(&mut decoder, 6);
        assert_eq!(decoder.count(high), 6);
        assert_eq!(decoder.count(wrapped), 6);

        Walker::new(31).reverse(&mut decoder, 6);
        assert_eq!(decoder.count(high), 0);
    }

    #[test]
    fn reverse_steps_count_down() {
        let counters = CounterBank::new();
        let mut decoder = decoder_with(SimConfig::default(), &counters);
        let slot = decoder.add_decoder(3).unwrap();

        for (i, state) in REVERSE.iter().cycle().take(21).enumerate() {
            decoder.hardware_mut().set_pins(3, *state);
            decoder.hardware_mut().run(32);
            assert_eq!(decoder.count(slot), -(i as i32 + 1));
        }
    }

    #[test]
    fn interleaved_steps_sum() {
        let counters = CounterBank::new();
        let mut decoder = decoder_with(SimConfig::default(), &counters);
        let slot = decoder.add_decoder(9).unwrap();
        let mut walker = Walker::new(9);

        walker.forward(&mut decoder, 10);
        walker.reverse(&mut decoder, 4);
        walker.forward(&mut decoder, 1);
        walker.reverse(&mut decoder, 12);
        assert_eq!(decoder.count(slot), 10 - 4 + 1 - 12);
    }

    #[test]
    fn encoders_count_independently() {
        let counters = CounterBank::new();
        let mut decoder = decoder_with(SimConfig::default(), &counters);
        let a = decoder.add_decoder(2).unwrap();
        let b = decoder.add_decoder(6).unwrap();

        Walker::new(2).forward(&mut decoder, 8);
        Walker::new(6).reverse(&mut decoder, 3);

        assert_eq!(decoder.count(a), 8);
        assert_eq!(decoder.count(b), -3);
        assert_eq!(decoder.read_all_counts(), [Some(8), Some(-3), None, None]);
    }

    #[test]
    fn unbound_slot_reads_zero() {
        let counters = CounterBank::new();
        let mut decoder = decoder_with(SimConfig::default(), &counters);
        decoder.add_decoder(0).unwrap();
        assert_eq!(decoder.count(3), 0);
        assert!(!decoder.is_bound(3));
    }

    #[test]
    #[should_panic]
    fn count_panics_on_out_of_range_slot() {
        let counters = CounterBank::new();
        let mut decoder = decoder_with(SimConfig::default(), &counters);
        decoder.count(NUM_SLOTS);
    }

    #[test]
    #[should_panic]
    fn count_panics_on_huge_slot() {
        let counters = CounterBank::new();
        let mut decoder = decoder_with(SimConfig::default(), &counters);
        decoder.count(usize::MAX);
    }

    // ── Transfer budget ──────────────────────────────────────────────

    #[test]
    fn refresh_threshold_boundary() {
        assert!(needs_refresh(0));
        assert!(needs_refresh(1));
        assert!(needs_refresh(REFRESH_THRESHOLD - 1));
        assert!(needs_refresh(REFRESH_THRESHOLD));
        assert!(!needs_refresh(REFRESH_THRESHOLD + 1));
        assert!(!needs_refresh(MAX_TRANSFER_COUNT - 1));
        assert!(!needs_refresh(MAX_TRANSFER_COUNT));
    }

    #[test]
    fn reads_restart_channel_iff_at_or_below_threshold() {
        let counters = CounterBank::new();
        let mut decoder = decoder_with(SimConfig::default(), &counters);
        let slot = decoder.add_decoder(9).unwrap();
        let channel = decoder.channel(slot).unwrap();

        let samples = [
            1,
            1000,
            REFRESH_THRESHOLD - 1,
            REFRESH_THRESHOLD,
            REFRESH_THRESHOLD + 1,
            REFRESH_THRESHOLD + 12345,
            MAX_TRANSFER_COUNT - 1,
            MAX_TRANSFER_COUNT,
        ];
        for remaining in samples {
            decoder.hardware_mut().set_transfers_remaining(channel, remaining);
            let restarts = decoder.hardware().mover_restarts(channel);

            decoder.count(slot);

            let sim = decoder.hardware();
            if remaining <= REFRESH_THRESHOLD {
                assert_eq!(sim.mover_restarts(channel), restarts + 1);
                assert_eq!(sim.transfers_remaining(channel), MAX_TRANSFER_COUNT);
            } else {
                assert_eq!(sim.mover_restarts(channel), restarts);
                assert_eq!(sim.transfers_remaining(channel), remaining);
            }
        }
    }

    #[test]
    fn exhausted_channel_resumes_from_fifo_after_read() {
        let counters = CounterBank::new();
        let mut decoder = decoder_with(SimConfig::default(), &counters);
        let slot = decoder.add_decoder(9).unwrap();
        let channel = decoder.channel(slot).unwrap();
        let mut walker = Walker::new(9);

        // One transfer left: the second and third counts stay in the FIFO.
        decoder.hardware_mut().set_transfers_remaining(channel, 1);
        walker.forward(&mut decoder, 3);
        assert!(!decoder.hardware().is_mover_busy(channel));
        assert_eq!(decoder.hardware().rx_level(slot as u8), 2);

        // The read sees the stale value and reloads the channel.
        assert_eq!(decoder.count(slot), 1);
        decoder.hardware_mut().run(4);
        assert_eq!(decoder.count(slot), 3);
    }
}
