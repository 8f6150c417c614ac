// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Serial transport layer for bootloader communication.

use std::io::{Read, Write};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serialport::SerialPort;

use crispy_common::protocol::{self, MsgType, CRC_LEN, HEADER_LEN, MAX_FRAME_LEN};

/// Default timeout for serial operations in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// USB CDC transport for communicating with the bootloader. Frames are
/// self-delimiting (`type`, `len`, body, CRC-16): the two header bytes give
/// the exact number of bytes still to read, so no COBS delimiter is needed.
pub struct Transport {
    port: Box<dyn SerialPort>,
}

impl Transport {
    /// Create a new transport connection to the specified serial port.
    pub fn new(port_name: &str) -> Result<Self> {
        Self::with_timeout(port_name, DEFAULT_TIMEOUT_MS)
    }

    /// Create a new transport connection with a custom timeout.
    pub fn with_timeout(port_name: &str, timeout_ms: u64) -> Result<Self> {
        let port = serialport::new(port_name, 115200)
            .timeout(Duration::from_millis(timeout_ms))
            .open()
            .with_context(|| format!("Failed to open serial port {}", port_name))?;

        Ok(Self { port })
    }

    /// Get the port name.
    pub fn port_name(&self) -> String {
        self.port.name().unwrap_or_else(|| "?".to_string())
    }

    /// Send one frame of `msg_type` carrying `body`.
    pub fn send(&mut self, msg_type: MsgType, body: &[u8]) -> Result<()> {
        let mut buf = [0u8; MAX_FRAME_LEN];
        let n = protocol::encode(&mut buf, msg_type, body);
        self.port
            .write_all(&buf[..n])
            .map_err(|e| anyhow::anyhow!("Failed to write to serial port: {}", e))?;
        self.port.flush()?;
        Ok(())
    }

    /// Receive one complete, CRC-validated frame, returning its type and body.
    pub fn receive(&mut self) -> Result<(MsgType, Vec<u8>)> {
        let mut header = [0u8; HEADER_LEN];
        self.read_exact_timeout(&mut header)?;

        let declared_len = header[1] as usize;
        if declared_len < HEADER_LEN + CRC_LEN || declared_len > MAX_FRAME_LEN {
            bail!("Malformed frame length {}", declared_len);
        }

        let mut frame = vec![0u8; declared_len];
        frame[..HEADER_LEN].copy_from_slice(&header);
        self.read_exact_timeout(&mut frame[HEADER_LEN..])?;

        let decoded = protocol::decode(&frame).map_err(|e| anyhow::anyhow!("{:?}", e))?;
        Ok((decoded.msg_type, decoded.body.to_vec()))
    }

    fn read_exact_timeout(&mut self, buf: &mut [u8]) -> Result<()> {
        self.port.read_exact(buf).map_err(|e| {
            if e.kind() == std::io::ErrorKind::TimedOut {
                anyhow::anyhow!("Timeout waiting for response")
            } else {
                anyhow::anyhow!("Serial read error: {}", e)
            }
        })
    }

    fn drain_rx(&mut self) {
        let mut buf = [0u8; 64];
        let old_timeout = self.port.timeout();
        let _ = self.port.set_timeout(Duration::from_millis(10));
        while self.port.read(&mut buf).unwrap_or(0) > 0 {}
        let _ = self.port.set_timeout(old_timeout);
    }

    /// Send a frame and wait for the response.
    pub fn send_recv(&mut self, msg_type: MsgType, body: &[u8]) -> Result<(MsgType, Vec<u8>)> {
        self.drain_rx();
        self.send(msg_type, body)?;
        self.receive()
    }

    /// Send a frame and wait for the response with a custom timeout.
    pub fn send_recv_timeout(
        &mut self,
        msg_type: MsgType,
        body: &[u8],
        timeout_ms: u64,
    ) -> Result<(MsgType, Vec<u8>)> {
        let old_timeout = self.port.timeout();
        self.port
            .set_timeout(Duration::from_millis(timeout_ms))
            .map_err(|e| anyhow::anyhow!("Failed to set timeout: {}", e))?;

        let result = self.send_recv(msg_type, body);

        let _ = self.port.set_timeout(old_timeout);
        result
    }
}
