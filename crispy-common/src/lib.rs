// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Common types and utilities for crispy-bootloader.
//!
//! This crate supports both `no_std` (embedded) and `std` (host) environments:
//! - Default: `no_std` mode for embedded targets
//! - `std` feature: enables `std` support for host tools
//! - `embedded` feature: enables embedded-specific board support (rp2040-hal)
//!
//! Modules map directly onto the core subsystems: [`flash`] is the sector
//! driver (C1), [`header`] the slot/header layer (C2), [`crc`] and [`auth`]
//! the integrity/authenticity layer (C3), [`protocol`] and [`update`] the
//! firmware update engine (C4), [`boot_fsm`] the boot decision state machine
//! (C5).

#![cfg_attr(not(feature = "std"), no_std)]

pub mod auth;
pub mod boot_fsm;
pub mod config;
pub mod crc;
pub mod error;
pub mod flash;
pub mod header;
pub mod protocol;
pub mod update;

pub use config::{FlashLayout, Slot};
pub use error::{AuthError, FlashError, ProtocolError};
pub use header::ImageHeader;

#[cfg(feature = "embedded")]
use embedded_hal::delay::DelayNs;
#[cfg(feature = "embedded")]
use embedded_hal::digital::OutputPin;
#[cfg(feature = "embedded")]
use rp2040_hal as hal;

#[cfg(feature = "embedded")]
pub type LedPin =
    hal::gpio::Pin<hal::gpio::bank0::Gpio25, hal::gpio::FunctionSioOutput, hal::gpio::PullDown>;

/// Initialize RP2040 board peripherals.
///
/// # Safety
/// Uses `Peripherals::steal()` -- caller must ensure exclusive peripheral access.
#[cfg(feature = "embedded")]
pub fn init_board() -> (hal::Timer, LedPin) {
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

    let timer = hal::Timer::new(pac.TIMER, &mut pac.RESETS, &clocks);
    let sio = hal::Sio::new(pac.SIO);
    let pins = hal::gpio::Pins::new(
        pac.IO_BANK0,
        pac.PADS_BANK0,
        sio.gpio_bank0,
        &mut pac.RESETS,
    );

    (timer, pins.gpio25.into_push_pull_output())
}

/// Blink an LED a specified number of times.
#[cfg(feature = "embedded")]
pub fn blink(led: &mut impl OutputPin, timer: &mut impl DelayNs, count: u32, period_ms: u32) {
    for _ in 0..count {
        led.set_high().ok();
        timer.delay_ms(period_ms);
        led.set_low().ok();
        timer.delay_ms(period_ms);
    }
}
