// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Flash/slot geometry, exposed as a single configuration record rather than
//! read ad hoc from `unsafe extern "C"` linker symbols. The embedded binary
//! builds one of these from real linker symbols once at startup; tests build
//! one by hand against a RAM-backed flash simulator.

/// Identifies one of the two firmware slots.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Slot {
    Primary,
    Backup,
}

/// Geometry of the primary/backup slots and their trailer header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FlashLayout {
    pub sector_size: u32,
    pub primary_start: u32,
    pub primary_size: u32,
    pub backup_start: u32,
    pub backup_size: u32,
    pub header_size: u32,
}

impl FlashLayout {
    /// Start (inclusive) and end (exclusive) address of `slot`.
    pub fn slot_bounds(&self, slot: Slot) -> (u32, u32) {
        match slot {
            Slot::Primary => (self.primary_start, self.primary_start + self.primary_size),
            Slot::Backup => (self.backup_start, self.backup_start + self.backup_size),
        }
    }

    /// Address of the first byte of `slot`'s trailer header.
    pub fn header_addr(&self, slot: Slot) -> u32 {
        let (_, end) = self.slot_bounds(slot);
        end - self.header_size
    }

    /// `true` iff primary and backup are the same size, the precondition for
    /// promotion.
    pub fn sizes_match(&self) -> bool {
        self.primary_size == self.backup_size
    }
}
