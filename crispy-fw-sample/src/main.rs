// Copyright (c) 2026 ADNT Sarl <info@adnt.io>
// SPDX-License-Identifier: MIT

//! Minimal resident application for the primary slot, used to exercise the
//! boot decision state machine and update engine end to end on hardware.
//! Owns no bootloader logic: a button press just resets the device, and the
//! bootloader's own INIT handler reads the button and enters BOOTLOOP.

#![no_std]
#![no_main]

use defmt_rtt as _;
use embedded_hal::digital::InputPin;
use panic_probe as _;
use rp2040_hal as hal;

defmt::timestamp!("{=u64:us}", { 0 });

use cortex_m_rt::entry;

#[entry]
fn main() -> ! {
    defmt::println!("Firmware started!");

    let mut pac = unsafe { hal::pac::Peripherals::steal() };

    let mut watchdog = hal::Watchdog::new(pac.WATCHDOG);
    let clocks = hal::clocks::init_clocks_and_plls(
        12_000_000u32,
        pac.XOSC,
        pac.CLOCKS,
        pac.PLL_SYS,
        pac.PLL_USB,
        &mut pac.RESETS,
        &mut watchdog,
    )
    .unwrap();

    let mut timer = hal::Timer::new(pac.TIMER, &mut pac.RESETS, &clocks);
    let sio = hal::Sio::new(pac.SIO);
    let pins = hal::gpio::Pins::new(pac.IO_BANK0, pac.PADS_BANK0, sio.gpio_bank0, &mut pac.RESETS);

    let mut led_pin = pins.gpio25.into_push_pull_output();
    let mut gp2 = pins.gpio2.into_pull_up_input();

    crispy_common::blink(&mut led_pin, &mut timer, 5, 100);

    defmt::println!("Resident application running; hold GP2 low to enter update mode");

    loop {
        use embedded_hal::delay::DelayNs;
        if gp2.is_low().unwrap_or(false) {
            defmt::println!("Button held: resetting into bootloader");
            timer.delay_ms(20u32);
            cortex_m::peripheral::SCB::sys_reset();
        }
        timer.delay_ms(50u32);
    }
}
