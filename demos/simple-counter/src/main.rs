//! Simple counter example
//!
//! Counts one quadrature encoder with a PIO0 state machine on the Raspberry
//! Pi Pico 2 and logs the tick count via defmt every 200 ms.
//!
//! # Wiring
//!
//! | Signal | Pico 2 Pin | Notes                 |
//! |--------|------------|-----------------------|
//! | ENC A  | GP9        | Pull-down enabled     |
//! | ENC B  | GP10       | Pull-down enabled     |

#![no_std]
#![no_main]

use defmt::*;
use embassy_executor::Spawner;
use embassy_rp::block::ImageDef;
use embassy_rp::gpio::{Input, Pull};
use embassy_time::{Duration, Timer};
use {defmt_rtt as _, panic_probe as _};

use pio_quadrature::rp::{PioDmaHardware, RpConfig};
use pio_quadrature::{CounterBank, QuadratureDecoder};

/// Tell the Boot ROM about our application.
#[link_section = ".start_block"]
#[used]
pub static IMAGE_DEF: ImageDef = ImageDef::secure_exe();

/// Counter cells written by DMA. Static so their address never changes.
static COUNTERS: CounterBank = CounterBank::new();

/// First of the two encoder pins (channel B is the next GPIO).
const ENCODER_PIN_BASE: u8 = 9;

#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    let p = embassy_rp::init(Default::default());

    // --- Encoder lines (GP9 = A, GP10 = B) ---
    // Kept alive for the whole program so the pads stay configured.
    let _enc_a = Input::new(p.PIN_9, Pull::Down);
    let _enc_b = Input::new(p.PIN_10, Pull::Down);

    // SAFETY: nothing else in this firmware uses PIO0 or DMA.
    let hardware = unsafe { PioDmaHardware::new(RpConfig::default()) };

    let mut decoder = match QuadratureDecoder::init(hardware, &COUNTERS) {
        Ok(decoder) => decoder,
        Err(e) => {
            error!("Decoder init failed: {}", e);
            return;
        }
    };

    let encoder = match decoder.add_decoder(ENCODER_PIN_BASE) {
        Ok(slot) => slot,
        Err(e) => {
            error!("Could not bind encoder: {}", e);
            return;
        }
    };

    info!("Counter example started — turn the encoder to see the count change");

    loop {
        info!("{}", decoder.count(encoder));
        Timer::after(Duration::from_millis(200)).await;
    }
}
