// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! `FlashDriver` implementation over the RP2040's ROM flash routines.
//!
//! Flash operations (erase/program) require XIP to be torn down first. The
//! full sequence is:
//!   1. connect_internal_flash()
//!   2. flash_exit_xip()
//!   3. flash_range_erase() or flash_range_program()
//!   4. flash_flush_cache()
//!   5. flash_enter_cmd_xip()
//!
//! All code executing during steps 1-5 must run from RAM, not flash. We use
//! `#[link_section = ".data"]` to place those functions in RAM, and
//! pre-resolve all ROM function pointers once at init time.

use crispy_common::error::FlashError;
use crispy_common::flash::FlashDriver;

pub const FLASH_BASE: u32 = 0x1000_0000;
pub const FLASH_PAGE_SIZE: u32 = 256;

type RomFnVoid = unsafe extern "C" fn();
type RomFnErase = unsafe extern "C" fn(u32, usize, u32, u8);
type RomFnProgram = unsafe extern "C" fn(u32, *const u8, usize);

static mut ROM_CONNECT_INTERNAL_FLASH: RomFnVoid = dummy_void;
static mut ROM_FLASH_EXIT_XIP: RomFnVoid = dummy_void;
static mut ROM_FLASH_RANGE_ERASE: RomFnErase = dummy_erase;
static mut ROM_FLASH_RANGE_PROGRAM: RomFnProgram = dummy_program;
static mut ROM_FLASH_FLUSH_CACHE: RomFnVoid = dummy_void;
static mut ROM_FLASH_ENTER_CMD_XIP: RomFnVoid = dummy_void;

unsafe extern "C" fn dummy_void() {}
unsafe extern "C" fn dummy_erase(_: u32, _: usize, _: u32, _: u8) {}
unsafe extern "C" fn dummy_program(_: u32, _: *const u8, _: usize) {}

/// Look up a ROM function by its two-character tag. ROM table pointer at
/// 0x14 and lookup function at 0x18 are 16-bit halfword pointers.
unsafe fn rom_func_lookup(tag: &[u8; 2]) -> usize {
    let fn_table = *(0x14 as *const u16) as *const u16;
    let lookup: unsafe extern "C" fn(*const u16, u32) -> usize =
        core::mem::transmute::<usize, unsafe extern "C" fn(*const u16, u32) -> usize>(
            *(0x18 as *const u16) as usize,
        );
    let code = u16::from_le_bytes(*tag) as u32;
    lookup(fn_table, code)
}

/// Resolve ROM flash function pointers. Must run once before any `RomFlash`
/// operation; performs ROM table lookups which require XIP to be active.
pub fn init() {
    unsafe {
        ROM_CONNECT_INTERNAL_FLASH = core::mem::transmute::<usize, RomFnVoid>(rom_func_lookup(b"IF"));
        ROM_FLASH_EXIT_XIP = core::mem::transmute::<usize, RomFnVoid>(rom_func_lookup(b"EX"));
        ROM_FLASH_RANGE_ERASE = core::mem::transmute::<usize, RomFnErase>(rom_func_lookup(b"RE"));
        ROM_FLASH_RANGE_PROGRAM = core::mem::transmute::<usize, RomFnProgram>(rom_func_lookup(b"RP"));
        ROM_FLASH_FLUSH_CACHE = core::mem::transmute::<usize, RomFnVoid>(rom_func_lookup(b"FC"));
        ROM_FLASH_ENTER_CMD_XIP = core::mem::transmute::<usize, RomFnVoid>(rom_func_lookup(b"CX"));
    }
}

#[link_section = ".data"]
#[inline(never)]
unsafe fn rom_erase(offset: u32, size: u32) {
    cortex_m::interrupt::disable();
    ROM_CONNECT_INTERNAL_FLASH();
    ROM_FLASH_EXIT_XIP();
    ROM_FLASH_RANGE_ERASE(offset, size as usize, FLASH_PAGE_SIZE * 16, 0x20);
    ROM_FLASH_FLUSH_CACHE();
    ROM_FLASH_ENTER_CMD_XIP();
    cortex_m::interrupt::enable();
}

#[link_section = ".data"]
#[inline(never)]
unsafe fn rom_program(offset: u32, data: *const u8, len: usize) {
    cortex_m::interrupt::disable();
    ROM_CONNECT_INTERNAL_FLASH();
    ROM_FLASH_EXIT_XIP();
    ROM_FLASH_RANGE_PROGRAM(offset, data, len);
    ROM_FLASH_FLUSH_CACHE();
    ROM_FLASH_ENTER_CMD_XIP();
    cortex_m::interrupt::enable();
}

/// `FlashDriver` over the onboard QSPI flash, addressed via the XIP window.
pub struct RomFlash;

impl RomFlash {
    pub const fn new() -> Self {
        Self
    }
}

impl Default for RomFlash {
    fn default() -> Self {
        Self::new()
    }
}

impl FlashDriver for RomFlash {
    fn read(&mut self, dest: &mut [u8], src_addr: u32) -> Result<(), FlashError> {
        for (i, byte) in dest.iter_mut().enumerate() {
            *byte = unsafe { ((src_addr + i as u32) as *const u8).read_volatile() };
        }
        Ok(())
    }

    fn erase(&mut self, start: u32, end: u32) -> Result<(), FlashError> {
        if start < FLASH_BASE || end < start {
            return Err(FlashError::BadRange);
        }
        unsafe { rom_erase(start - FLASH_BASE, end - start) };
        Ok(())
    }

    /// Pads `src` up to a full 256-byte page, preserving whatever already
    /// occupies the rest of the page (read back, not assumed erased), since
    /// `flash_range_program` requires a page-multiple length.
    fn program(&mut self, src: &[u8], dst_addr: u32) -> Result<(), FlashError> {
        if dst_addr < FLASH_BASE {
            return Err(FlashError::BadRange);
        }
        let page_size = FLASH_PAGE_SIZE as usize;
        let page_start = dst_addr - (dst_addr % FLASH_PAGE_SIZE);
        let page_off = (dst_addr - page_start) as usize;
        let padded_len = (page_off + src.len()).div_ceil(page_size) * page_size;

        let mut page = [0u8; 512];
        let page = &mut page[..padded_len];
        self.read(page, page_start)?;
        page[page_off..page_off + src.len()].copy_from_slice(src);

        unsafe { rom_program(page_start - FLASH_BASE, page.as_ptr(), page.len()) };
        Ok(())
    }

    fn with_irq_disabled<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        cortex_m::interrupt::disable();
        let result = f(self);
        unsafe { cortex_m::interrupt::enable() };
        result
    }
}
