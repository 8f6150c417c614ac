// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Secure in-field bootloader for RP2040: boot decision (C5) over the
//! primary/backup flash slot model (C2), with a BOOTLOOP firmware-update
//! mode (C4) served over USB CDC.

#![no_std]
#![no_main]

mod boot;
mod flash;
mod peripherals;
mod update;
mod usb_transport;

use defmt_rtt as _;
use embedded_hal::digital::InputPin;
use panic_probe as _;

defmt::timestamp!("{=u64:us}", { 0 });

use cortex_m_rt::entry;

#[unsafe(link_section = ".boot2")]
#[used]
pub static BOOT2: [u8; 256] = rp2040_boot2::BOOT_LOADER_GENERIC_03H;

#[entry]
fn main() -> ! {
    defmt::println!("Bootloader init");

    let mut p = peripherals::init();

    crispy_common::blink(&mut p.led_pin, &mut p.timer, 3, 200);
    flash::init();

    let button_pressed = p.gp2.is_low().unwrap_or(false);
    let outcome = boot::decide_and_boot(button_pressed);

    // `decide_and_boot` only returns on BootOutcome::Bootloop; Boot jumps
    // and never returns.
    defmt::println!("Boot decision: {:?}", defmt::Debug2Format(&outcome));
    update::enter_update_mode(&mut p);
}
