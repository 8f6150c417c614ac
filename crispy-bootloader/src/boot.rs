// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Boot glue: resolves the linker-provided slot geometry into a
//! `FlashLayout`, drives the boot decision state machine (C5), and performs
//! the vector-table relocation and jump into the primary slot on success.

use crate::flash::RomFlash;
use crispy_common::auth::PublicKeyBytes;
use crispy_common::boot_fsm::{run, BootOutcome};
use crispy_common::config::FlashLayout;
use crispy_common::header::SlotManager;

unsafe extern "C" {
    static __primary_start: u32;
    static __primary_size: u32;
    static __backup_start: u32;
    static __backup_size: u32;
    static __flash_sector_size: u32;
    static __image_header_size: u32;
}

macro_rules! linker_addr {
    ($sym:ident) => {
        unsafe { &$sym as *const u32 as u32 }
    };
}

/// Deployment public key (uncompressed SEC1 x||y), burned in at build time.
///
/// TODO: wire this up to a build-time provisioning step instead of a literal.
const PUBLIC_KEY: PublicKeyBytes = [0u8; 64];

pub fn flash_layout() -> FlashLayout {
    FlashLayout {
        sector_size: linker_addr!(__flash_sector_size),
        primary_start: linker_addr!(__primary_start),
        primary_size: linker_addr!(__primary_size),
        backup_start: linker_addr!(__backup_start),
        backup_size: linker_addr!(__backup_size),
        header_size: linker_addr!(__image_header_size),
    }
}

/// Runs the boot decision FSM and either jumps into the primary slot or
/// returns, meaning the caller should enter the update loop (BOOTLOOP).
pub fn decide_and_boot(button_pressed: bool) -> BootOutcome {
    let layout = flash_layout();
    let mut flash = RomFlash::new();
    let mut mgr = SlotManager::new(&layout, &mut flash);

    let outcome = run(&mut mgr, &PUBLIC_KEY, button_pressed);
    if outcome == BootOutcome::Boot {
        defmt::println!("Boot decision: launching primary at 0x{:08x}", layout.primary_start);
        unsafe { jump_to_primary(layout.primary_start) }
    }
    outcome
}

/// # Safety
/// `primary_start` must point at a verified, valid vector table.
unsafe fn jump_to_primary(primary_start: u32) -> ! {
    prepare_for_handoff();
    relocate_vector_table(primary_start);

    let initial_sp = (primary_start as *const u32).read_volatile();
    let reset_vector = (primary_start as *const u32).offset(1).read_volatile();
    branch_to(initial_sp, reset_vector);
}

/// Deinitialise interrupts ahead of handoff. MPU lockdown of the bootloader
/// region and peripheral deinitialisation are board-specific collaborators
/// not modeled here.
unsafe fn prepare_for_handoff() {
    cortex_m::interrupt::disable();

    const NVIC_ICPR: *mut u32 = 0xE000_E280 as *mut u32;
    NVIC_ICPR.write_volatile(0xFFFF_FFFF);
    const NVIC_ICER: *mut u32 = 0xE000_E180 as *mut u32;
    NVIC_ICER.write_volatile(0xFFFF_FFFF);
}

unsafe fn relocate_vector_table(addr: u32) {
    const SCB_VTOR: *mut u32 = 0xE000_ED08 as *mut u32;
    SCB_VTOR.write_volatile(addr);
    cortex_m::asm::dsb();
    cortex_m::asm::isb();
}

unsafe fn branch_to(initial_sp: u32, reset_vector: u32) -> ! {
    core::arch::asm!(
        "msr msp, {sp}",
        "cpsie i",
        "bx {reset}",
        sp = in(reg) initial_sp,
        reset = in(reg) reset_vector,
        options(noreturn)
    );
}
