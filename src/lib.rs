//! Quadrature encoder counting on RP2040/RP2350 PIO state machines.
//!
//! Each encoder gets a PIO state machine running a small decode program and
//! a DMA channel that copies every new count into a counter cell in RAM.
//! The host reads counts from memory without polling the pins or the PIO.
//!
//! # Architecture
//!
//! - **[`QuadratureDecoder`]** (public) — loads the program, binds encoders
//!   to state machines and DMA channels, reads counts and keeps the DMA
//!   transfer budget topped up.
//! - **[`DecoderHardware`]** (public) — the hardware operations the decoder
//!   needs, implemented by:
//!   - `rp::PioDmaHardware` — PIO/DMA registers (target builds with the
//!     `rp2040` or `rp235xa` feature).
//!   - `sim::SimulatedHardware` — a software PIO/DMA model for host tests
//!     (`sim` feature).
//! - **`program`** — the PIO decode program, assembled at compile time.
//!
//! # Quick start
//!
//! ```ignore
//! use pio_quadrature::rp::{PioDmaHardware, RpConfig};
//! use pio_quadrature::{CounterBank, QuadratureDecoder};
//!
//! static COUNTERS: CounterBank = CounterBank::new();
//!
//! let hardware = unsafe { PioDmaHardware::new(RpConfig::default()) };
//! let mut decoder = QuadratureDecoder::init(hardware, &COUNTERS)?;
//!
//! // Encoder on GP9 (A) and GP10 (B)
//! let encoder = decoder.add_decoder(9)?;
//! let ticks = decoder.count(encoder);
//! ```
//!
//! # Features
//!
//! - **`defmt`** — logging via [`defmt`] and [`defmt::Format`] on public
//!   types.
//! - **`rp2040`** / **`rp235xa`** — chip selection for the register backend.
//! - **`sim`** — export the simulated backend outside of tests.

#![cfg_attr(not(test), no_std)]

#[cfg(all(feature = "rp2040", feature = "rp235xa"))]
compile_error!("Enable only one of the 'rp2040' and 'rp235xa' features");

pub use counter::{CounterBank, CounterCell};
pub use decoder::{needs_refresh, QuadratureDecoder};
pub use error::DecoderError;
pub use hardware::{DecoderHardware, FifoJoin, MoverConfig, SlotConfig};
pub use registers::{MAX_TRANSFER_COUNT, NUM_SLOTS, REFRESH_THRESHOLD};

mod counter;
mod decoder;
mod error;
mod hardware;
#[cfg(any(test, feature = "sim", target_os = "none"))]
mod pool;
pub mod program;
pub mod registers;
#[cfg(all(target_os = "none", any(feature = "rp2040", feature = "rp235xa")))]
pub mod rp;
#[cfg(any(test, feature = "sim"))]
pub mod sim;
