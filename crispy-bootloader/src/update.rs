// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! BOOTLOOP glue: USB CDC transport driving the firmware update engine (C4).
//! All session logic lives in `crispy_common::update`; this module only
//! ferries bytes in and out and paces the idle loop.

use crate::boot::flash_layout;
use crate::flash::RomFlash;
use crate::peripherals::{self, Peripherals};
use crate::usb_transport::SerialTransport;
use crispy_common::header::SlotManager;
use crispy_common::protocol::MAX_FRAME_LEN;
use crispy_common::update::{dispatch, UpdateSession};
use embedded_hal::digital::OutputPin;
use rp2040_hal as hal;
use usb_device::class_prelude::UsbBusAllocator;

/// Enter BOOTLOOP: initialize USB CDC and serve the update protocol forever.
pub fn enter_update_mode(p: &mut Peripherals) -> ! {
    defmt::println!("Entering BOOTLOOP: serving update protocol");

    let mut usb = p.usb.take().expect("USB peripherals already taken");
    let usb_bus = UsbBusAllocator::new(hal::usb::UsbBus::new(
        usb.regs,
        usb.dpram,
        usb.clock,
        true,
        &mut usb.resets,
    ));

    peripherals::store_usb_bus(usb_bus);
    let mut transport = SerialTransport::new(peripherals::usb_bus_ref());

    p.led_pin.set_high().ok();

    let layout = flash_layout();
    let mut flash = RomFlash::new();
    let mut session = UpdateSession::new();
    let mut now_us: u64 = 0;

    loop {
        transport.poll();
        transport.tick_watchdog(now_us);

        if let Some(len) = transport.try_receive(now_us) {
            let mut mgr = SlotManager::new(&layout, &mut flash);
            let mut out = [0u8; MAX_FRAME_LEN];
            let raw = {
                let mut buf = [0u8; MAX_FRAME_LEN];
                let frame = transport.rx_frame(len);
                buf[..frame.len()].copy_from_slice(frame);
                buf
            };
            let out_len = dispatch(&mut session, &mut mgr, &raw[..len], &mut out);
            transport.send(&out[..out_len]);
        } else {
            use embedded_hal::delay::DelayNs;
            p.timer.delay_ms(1);
            now_us += 1000;
        }
    }
}
