// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! USB CDC transport for the firmware update engine (C4). Frames are
//! self-delimiting (`type`, `len`, body, CRC-16), so no COBS framing is
//! needed: once `len` declared bytes have arrived, a frame is complete.
//!
//! Implements the receive-gap watchdog: if no byte arrives for
//! `GAP_TIMEOUT_US`, the partially received frame is discarded and the
//! receive state re-armed. This runs from the foreground poll loop rather
//! than a UART ISR (USB CDC has no natural byte-interrupt here), but plays
//! the same role the protocol's §4.4 transport contract describes.

use crispy_common::protocol::MAX_FRAME_LEN;
use rp2040_hal::usb::UsbBus;
use usb_device::class_prelude::UsbBusAllocator;
use usb_device::prelude::*;
use usbd_serial::SerialPort;

/// Design target from the protocol's transport contract.
const GAP_TIMEOUT_US: u64 = 15_000_000;

pub struct SerialTransport {
    serial: SerialPort<'static, UsbBus>,
    usb_dev: UsbDevice<'static, UsbBus>,
    rx_buf: [u8; MAX_FRAME_LEN],
    rx_pos: usize,
    last_byte_at_us: u64,
}

impl SerialTransport {
    pub fn new(usb_bus: &'static UsbBusAllocator<UsbBus>) -> Self {
        let serial = SerialPort::new(usb_bus);
        let usb_dev = UsbDeviceBuilder::new(usb_bus, UsbVidPid(0x2E8A, 0x000A))
            .strings(&[StringDescriptors::default()
                .manufacturer("ADNT")
                .product("Crispy Bootloader")
                .serial_number("0001")])
            .unwrap()
            .device_class(usbd_serial::USB_CLASS_CDC)
            .build();

        Self { serial, usb_dev, rx_buf: [0u8; MAX_FRAME_LEN], rx_pos: 0, last_byte_at_us: 0 }
    }

    /// Poll the USB device. Must be called frequently.
    pub fn poll(&mut self) -> bool {
        self.usb_dev.poll(&mut [&mut self.serial])
    }

    /// Resets a partially received frame if the gap since the last byte
    /// exceeds the watchdog timeout. Session state is untouched.
    pub fn tick_watchdog(&mut self, now_us: u64) {
        if self.rx_pos > 0 && now_us.wrapping_sub(self.last_byte_at_us) > GAP_TIMEOUT_US {
            self.rx_pos = 0;
        }
    }

    /// Drains available USB bytes, returning the length of a complete frame
    /// in `self.rx_buf` once `len` declared bytes have arrived.
    pub fn try_receive(&mut self, now_us: u64) -> Option<usize> {
        let mut tmp = [0u8; 64];
        let count = match self.serial.read(&mut tmp) {
            Ok(n) if n > 0 => n,
            _ => return None,
        };
        self.last_byte_at_us = now_us;

        for &byte in &tmp[..count] {
            if self.rx_pos >= self.rx_buf.len() {
                // Overflow without a recognisable header: discard and resync.
                self.rx_pos = 0;
            }
            self.rx_buf[self.rx_pos] = byte;
            self.rx_pos += 1;

            if self.rx_pos >= 2 {
                let declared_len = self.rx_buf[1] as usize;
                if declared_len >= 2 && self.rx_pos >= declared_len {
                    // Bytes of a following frame already in `tmp` are
                    // dropped; the host retries on its own response timeout.
                    let n = declared_len;
                    self.rx_pos = 0;
                    return Some(n);
                }
            }
        }
        None
    }

    pub fn rx_frame(&self, len: usize) -> &[u8] {
        &self.rx_buf[..len]
    }

    /// Blocking send of a complete response frame.
    pub fn send(&mut self, frame: &[u8]) {
        let mut offset = 0;
        while offset < frame.len() {
            match self.serial.write(&frame[offset..]) {
                Ok(n) => offset += n,
                Err(UsbError::WouldBlock) => {
                    self.poll();
                }
                Err(_) => break,
            }
        }
    }
}
