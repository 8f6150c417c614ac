// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Slot & header layer (C2): maps address ranges to primary/backup slots and
//! parses/writes the per-slot trailer header, plus the atomic promotion
//! protocol the boot FSM (C5) drives on a successful backup verification.

use crate::config::{FlashLayout, Slot};
use crate::crc::Crc32Ieee;
use crate::error::FlashError;
use crate::flash::FlashDriver;

/// Raw (r||s) ECDSA-P256 signature length.
pub const SIGNATURE_LEN: usize = 64;
/// `FW_VERSION(4) | IMAGE_CRC32(4) | IMAGE_SHA256(32) | SIGNATURE(64)`.
pub const HEADER_LEN: usize = 4 + 4 + 32 + SIGNATURE_LEN;

/// Per-slot trailer: version, CRC, hash and signature over the payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageHeader {
    pub version: u32,
    pub crc32: u32,
    pub sha256: [u8; 32],
    pub signature: [u8; SIGNATURE_LEN],
}

impl ImageHeader {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let version = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
        let crc32 = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
        let mut sha256 = [0u8; 32];
        sha256.copy_from_slice(&bytes[8..40]);
        let mut signature = [0u8; SIGNATURE_LEN];
        signature.copy_from_slice(&bytes[40..40 + SIGNATURE_LEN]);
        Self { version, crc32, sha256, signature }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0..4].copy_from_slice(&self.version.to_le_bytes());
        out[4..8].copy_from_slice(&self.crc32.to_le_bytes());
        out[8..40].copy_from_slice(&self.sha256);
        out[40..40 + SIGNATURE_LEN].copy_from_slice(&self.signature);
        out
    }
}

/// Fixed read chunk used when streaming a whole payload through flash reads.
const CHUNK: usize = 256;

/// Maps slots to address ranges and drives reads/erases/promotion over a
/// `FlashDriver`. Borrows the layout and driver for its lifetime so callers
/// control exactly when flash access happens.
pub struct SlotManager<'a, D: FlashDriver> {
    pub layout: &'a FlashLayout,
    pub flash: &'a mut D,
}

impl<'a, D: FlashDriver> SlotManager<'a, D> {
    pub fn new(layout: &'a FlashLayout, flash: &'a mut D) -> Self {
        Self { layout, flash }
    }

    pub fn slot_bounds(&self, slot: Slot) -> (u32, u32) {
        self.layout.slot_bounds(slot)
    }

    pub fn read_header(&mut self, slot: Slot) -> Result<ImageHeader, FlashError> {
        let addr = self.layout.header_addr(slot);
        let mut buf = [0u8; HEADER_LEN];
        self.flash.read(&mut buf, addr)?;
        Ok(ImageHeader::from_bytes(&buf))
    }

    /// "Backup is newer than primary" iff `backup.version > primary.version`
    /// — a total order decided strictly by `>`; equal versions are not newer.
    pub fn is_backup_newer(&mut self) -> Result<bool, FlashError> {
        let primary = self.read_header(Slot::Primary)?;
        let backup = self.read_header(Slot::Backup)?;
        Ok(backup.version > primary.version)
    }

    pub fn erase_backup(&mut self) -> Result<(), FlashError> {
        let (start, end) = self.slot_bounds(Slot::Backup);
        self.flash.erase(start, end)
    }

    /// Streams the payload (slot minus trailer) through CRC-32/IEEE.
    pub fn compute_payload_crc32(&mut self, slot: Slot) -> Result<u32, FlashError> {
        let (start, end) = self.slot_bounds(slot);
        let payload_end = end - self.layout.header_size;
        let mut crc = Crc32Ieee::new();
        let mut addr = start;
        let mut buf = [0u8; CHUNK];
        while addr < payload_end {
            let n = core::cmp::min(CHUNK as u32, payload_end - addr) as usize;
            self.flash.read(&mut buf[..n], addr)?;
            crc.update(&buf[..n]);
            addr += n as u32;
        }
        Ok(crc.finalize())
    }

    /// Atomic copy backup -> primary: assert equal sizes, erase primary,
    /// program it byte-for-byte from backup, all under one interrupt-disabled
    /// window. A failure inside the window leaves primary undefined; the
    /// bootloader does not try to restore it — next boot will discover
    /// "primary CRC bad, backup CRC good" and re-enter recovery.
    pub fn promote_backup_to_primary(&mut self) -> Result<(), FlashError> {
        if !self.layout.sizes_match() {
            return Err(FlashError::SizeMismatch);
        }
        let (primary_start, primary_end) = self.slot_bounds(Slot::Primary);
        let (backup_start, _) = self.slot_bounds(Slot::Backup);
        let size = primary_end - primary_start;

        self.flash.with_irq_disabled(move |flash| {
            flash.erase(primary_start, primary_end)?;
            copy_in_chunks(flash, backup_start, primary_start, size)
        })
    }
}

fn copy_in_chunks<D: FlashDriver>(flash: &mut D, src: u32, dst: u32, size: u32) -> Result<(), FlashError> {
    let mut offset = 0u32;
    let mut buf = [0u8; CHUNK];
    while offset < size {
        let n = core::cmp::min(CHUNK as u32, size - offset);
        flash.read(&mut buf[..n as usize], src + offset)?;
        flash.program(&buf[..n as usize], dst + offset)?;
        offset += n;
    }
    Ok(())
}
