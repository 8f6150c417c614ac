// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Boot Decision State Machine (C5): pure logic, no hardware dependencies.
//! Orchestrates C2 (slot/header) and C3 (integrity/authenticity) to pick a
//! bootable slot, recover a corrupted primary from the backup, and promote a
//! newer backup image, driven entirely off two bias latches rather than an
//! explicit "current candidate" field.

use crate::auth::{verify_slot, PublicKeyBytes};
use crate::config::Slot;
use crate::flash::FlashDriver;
use crate::header::SlotManager;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BootState {
    None,
    Init,
    CrcCheck,
    Auth,
    BootApp,
    Bootloop,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BootEvent {
    NoneOrErr,
    CheckPass,
    CheckFail,
    ButtonPressed,
}

/// Per-boot context. `newer_on_backup` is set in INIT when the backup carries
/// a newer version; `recover_primary` is set the first time a primary CRC
/// check fails. Each latch is consumed (cleared) the first time CRC_CHECK or
/// AUTH acts on it — a second failure on the pivoted candidate is fatal, not
/// a second pivot.
#[derive(Clone, Copy, Debug)]
pub struct BootCtx {
    pub state: BootState,
    pub newer_on_backup: bool,
    pub recover_primary: bool,
}

impl BootCtx {
    pub const fn new() -> Self {
        Self { state: BootState::None, newer_on_backup: false, recover_primary: false }
    }
}

impl Default for BootCtx {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of running the FSM to completion for one boot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BootOutcome {
    /// Verification (and promotion, if applicable) succeeded; jump to primary.
    Boot,
    /// No viable image; serve the update protocol.
    Bootloop,
}

/// Drives the FSM to a terminal decision. `button_pressed` is sampled once,
/// at INIT, matching the legacy source — it is never re-polled afterwards.
pub fn run<D: FlashDriver>(
    mgr: &mut SlotManager<'_, D>,
    pubkey: &PublicKeyBytes,
    button_pressed: bool,
) -> BootOutcome {
    let mut ctx = BootCtx::new();
    let mut event = BootEvent::NoneOrErr;

    loop {
        let next_state = match (ctx.state, event) {
            (BootState::None, BootEvent::NoneOrErr) => BootState::Init,
            (BootState::Init, BootEvent::NoneOrErr) => BootState::CrcCheck,
            (BootState::Init, BootEvent::ButtonPressed) => BootState::Bootloop,
            (BootState::CrcCheck, BootEvent::CheckPass) => BootState::Auth,
            (BootState::CrcCheck, BootEvent::CheckFail) => BootState::CrcCheck,
            (BootState::Auth, BootEvent::CheckPass) => BootState::BootApp,
            (BootState::Auth, BootEvent::CheckFail) => BootState::CrcCheck,
            // Unlisted cells terminate boot with a fatal log.
            _ => BootState::Bootloop,
        };
        ctx.state = next_state;

        event = match ctx.state {
            BootState::Init => init_hdl(&mut ctx, mgr, button_pressed),
            BootState::CrcCheck => crc_check_hdl(&mut ctx, mgr),
            BootState::Auth => auth_hdl(&mut ctx, mgr, pubkey),
            BootState::BootApp => return BootOutcome::Boot,
            BootState::Bootloop => return BootOutcome::Bootloop,
            BootState::None => BootEvent::NoneOrErr,
        };
    }
}

fn init_hdl<D: FlashDriver>(ctx: &mut BootCtx, mgr: &mut SlotManager<'_, D>, button_pressed: bool) -> BootEvent {
    if button_pressed {
        return BootEvent::ButtonPressed;
    }
    ctx.newer_on_backup = mgr.is_backup_newer().unwrap_or(false);
    BootEvent::NoneOrErr
}

/// `true` iff `slot`'s header CRC matches its payload. A flash read failure
/// is treated the same as a CRC failure: the candidate is not usable.
fn crc_ok<D: FlashDriver>(mgr: &mut SlotManager<'_, D>, slot: Slot) -> bool {
    let header = match mgr.read_header(slot) {
        Ok(h) => h,
        Err(_) => return false,
    };
    matches!(mgr.compute_payload_crc32(slot), Ok(crc) if crc == header.crc32)
}

fn crc_check_hdl<D: FlashDriver>(ctx: &mut BootCtx, mgr: &mut SlotManager<'_, D>) -> BootEvent {
    if ctx.newer_on_backup {
        if crc_ok(mgr, Slot::Backup) {
            BootEvent::CheckPass
        } else {
            // Abandon the newer image, fall back to the current primary.
            ctx.newer_on_backup = false;
            BootEvent::CheckFail
        }
    } else if !ctx.recover_primary {
        if crc_ok(mgr, Slot::Primary) {
            BootEvent::CheckPass
        } else {
            ctx.recover_primary = true;
            BootEvent::CheckFail
        }
    } else if crc_ok(mgr, Slot::Backup) {
        BootEvent::CheckPass
    } else {
        // recover_primary already spent this boot: a second failure is fatal.
        BootEvent::NoneOrErr
    }
}

fn auth_hdl<D: FlashDriver>(ctx: &mut BootCtx, mgr: &mut SlotManager<'_, D>, pubkey: &PublicKeyBytes) -> BootEvent {
    if ctx.newer_on_backup {
        ctx.newer_on_backup = false;
        match verify_slot(mgr, Slot::Backup, pubkey) {
            Ok(_) => match mgr.promote_backup_to_primary() {
                Ok(()) => BootEvent::CheckPass,
                Err(_) => BootEvent::CheckFail,
            },
            Err(_) => BootEvent::CheckFail,
        }
    } else if ctx.recover_primary {
        ctx.recover_primary = false;
        match verify_slot(mgr, Slot::Backup, pubkey) {
            Ok(_) => match mgr.promote_backup_to_primary() {
                Ok(()) => BootEvent::CheckPass,
                // Recovery's only candidate failed to promote: fatal.
                Err(_) => BootEvent::NoneOrErr,
            },
            Err(_) => BootEvent::NoneOrErr,
        }
    } else {
        match verify_slot(mgr, Slot::Primary, pubkey) {
            Ok(_) => BootEvent::CheckPass,
            Err(_) => {
                ctx.recover_primary = true;
                BootEvent::CheckFail
            }
        }
    }
}
