// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Flash sector driver (C1): byte-granular program, whole-sector erase,
//! bounded read. Hardware-agnostic: `FlashDriver` is implemented once for the
//! real RP2040 ROM routines (`crispy-bootloader`) and once for a RAM-backed
//! simulator used by every test in this crate.

use crate::config::FlashLayout;
use crate::error::FlashError;

/// Collaborator contract for the underlying flash hardware, or a simulator.
///
/// No operation is re-entrant, and none may be invoked while the currently
/// executing image occupies the address range being erased or programmed;
/// both are caller discipline, not something this trait enforces.
pub trait FlashDriver {
    /// Unconditional copy out of flash. No side effects.
    fn read(&mut self, dest: &mut [u8], src_addr: u32) -> Result<(), FlashError>;

    /// Erases every sector whose span intersects `[start, end)`.
    fn erase(&mut self, start: u32, end: u32) -> Result<(), FlashError>;

    /// Byte-at-a-time write of `src` starting at `dst_addr`.
    fn program(&mut self, src: &[u8], dst_addr: u32) -> Result<(), FlashError>;

    /// Runs `f` with interrupts disabled, re-enabling them on every exit path.
    /// Required around promotion: executing from primary while erasing
    /// primary is undefined, and the transport ISR must not preempt a
    /// program cycle. Hosts and tests default to a no-op pass-through.
    fn with_irq_disabled<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R
    where
        Self: Sized,
    {
        f(self)
    }
}

#[cfg(feature = "std")]
pub mod sim {
    use super::*;
    use std::vec::Vec;

    /// RAM-backed flash standing in for hardware in tests, pre-filled with
    /// 0xFF, the erased state of the real flash family.
    pub struct SimFlash {
        base: u32,
        mem: Vec<u8>,
        sector_size: u32,
    }

    impl SimFlash {
        pub fn new(base: u32, len: u32, sector_size: u32) -> Self {
            Self { base, mem: std::vec![0xFFu8; len as usize], sector_size }
        }

        pub fn bytes_at(&self, addr: u32, len: u32) -> &[u8] {
            let off = (addr - self.base) as usize;
            &self.mem[off..off + len as usize]
        }

        fn offset(&self, addr: u32) -> Option<usize> {
            if addr < self.base {
                return None;
            }
            let off = (addr - self.base) as usize;
            if off > self.mem.len() {
                None
            } else {
                Some(off)
            }
        }
    }

    impl FlashDriver for SimFlash {
        fn read(&mut self, dest: &mut [u8], src_addr: u32) -> Result<(), FlashError> {
            let off = self.offset(src_addr).ok_or(FlashError::BadRange)?;
            if off + dest.len() > self.mem.len() {
                return Err(FlashError::BadRange);
            }
            dest.copy_from_slice(&self.mem[off..off + dest.len()]);
            Ok(())
        }

        fn erase(&mut self, start: u32, end: u32) -> Result<(), FlashError> {
            let start_off = self.offset(start).ok_or(FlashError::BadRange)?;
            let end_off = self.offset(end).ok_or(FlashError::BadRange)?;
            if start_off % self.sector_size as usize != 0 {
                return Err(FlashError::BadRange);
            }
            for b in &mut self.mem[start_off..end_off] {
                *b = 0xFF;
            }
            Ok(())
        }

        fn program(&mut self, src: &[u8], dst_addr: u32) -> Result<(), FlashError> {
            let off = self.offset(dst_addr).ok_or(FlashError::BadRange)?;
            if off + src.len() > self.mem.len() {
                return Err(FlashError::BadRange);
            }
            self.mem[off..off + src.len()].copy_from_slice(src);
            Ok(())
        }
    }
}

/// `true` iff `[dst, dst+n)` lies entirely within one of the two slots.
pub fn in_slot_bounds(layout: &FlashLayout, dst: u32, n: u32) -> bool {
    let end = dst.saturating_add(n);
    let (p_start, p_end) = layout.slot_bounds(crate::config::Slot::Primary);
    let (b_start, b_end) = layout.slot_bounds(crate::config::Slot::Backup);
    (dst >= p_start && end <= p_end) || (dst >= b_start && end <= b_end)
}
