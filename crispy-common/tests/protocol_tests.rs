// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! End-to-end firmware update session tests driven entirely through the wire
//! protocol, as a transport on the real device would see it.

use crispy_common::config::FlashLayout;
use crispy_common::flash::sim::SimFlash;
use crispy_common::flash::FlashDriver;
use crispy_common::header::SlotManager;
use crispy_common::protocol::{self, FwugDataBody, MsgType, OpResult, MAX_FRAME_LEN};
use crispy_common::update::{dispatch, UpdateSession};

const SECTOR: u32 = 256;
const SLOT_SIZE: u32 = 1024;
const HEADER_SIZE: u32 = 104;

fn layout() -> FlashLayout {
    FlashLayout {
        sector_size: SECTOR,
        primary_start: 0,
        primary_size: SLOT_SIZE,
        backup_start: SLOT_SIZE,
        backup_size: SLOT_SIZE,
        header_size: HEADER_SIZE,
    }
}

struct Status {
    op_result: u8,
    is_active: bool,
    packets_received: u16,
}

fn roundtrip<D: FlashDriver>(
    session: &mut UpdateSession,
    mgr: &mut SlotManager<'_, D>,
    msg_type: MsgType,
    body: &[u8],
) -> Status {
    let mut raw = [0u8; MAX_FRAME_LEN];
    let n = protocol::encode(&mut raw, msg_type, body);
    let mut out = [0u8; MAX_FRAME_LEN];
    let out_len = dispatch(session, mgr, &raw[..n], &mut out);
    let frame = protocol::decode(&out[..out_len]).expect("valid response frame");
    assert_eq!(frame.msg_type, MsgType::FwugStatus);
    Status {
        op_result: frame.body[0],
        is_active: frame.body[1] != 0,
        packets_received: u16::from_le_bytes([frame.body[2], frame.body[3]]),
    }
}

/// A full update: START, two DATA packets, then the backup slot holds
/// exactly what was sent.
#[test]
fn full_update_session_persists_payload_to_backup() {
    let mut flash = SimFlash::new(0, SLOT_SIZE * 2, SECTOR);
    let layout = layout();
    let mut mgr = SlotManager::new(&layout, &mut flash);
    let mut session = UpdateSession::new();

    let start = roundtrip(&mut session, &mut mgr, MsgType::FwugStart, &[]);
    assert_eq!(start.op_result, OpResult::Ok as u8);
    assert!(start.is_active);
    assert_eq!(start.packets_received, 0);

    let mut body0 = [0u8; FwugDataBody::LEN];
    FwugDataBody { packet_number: 0, payload: [0x11; 128] }.write(&mut body0);
    let s0 = roundtrip(&mut session, &mut mgr, MsgType::FwugData, &body0);
    assert_eq!(s0.op_result, OpResult::Ok as u8);
    assert_eq!(s0.packets_received, 1);

    let mut body1 = [0u8; FwugDataBody::LEN];
    FwugDataBody { packet_number: 1, payload: [0x22; 128] }.write(&mut body1);
    let s1 = roundtrip(&mut session, &mut mgr, MsgType::FwugData, &body1);
    assert_eq!(s1.op_result, OpResult::Ok as u8);
    assert_eq!(s1.packets_received, 2);

    assert_eq!(mgr.flash.bytes_at(SLOT_SIZE, 128), &[0x11u8; 128][..]);
    assert_eq!(mgr.flash.bytes_at(SLOT_SIZE + 128, 128), &[0x22u8; 128][..]);
}

/// Sending FWUG_START twice without a cancel is rejected; the first session
/// stays active.
#[test]
fn double_start_is_rejected() {
    let mut flash = SimFlash::new(0, SLOT_SIZE * 2, SECTOR);
    let layout = layout();
    let mut mgr = SlotManager::new(&layout, &mut flash);
    let mut session = UpdateSession::new();

    roundtrip(&mut session, &mut mgr, MsgType::FwugStart, &[]);
    let second = roundtrip(&mut session, &mut mgr, MsgType::FwugStart, &[]);
    assert_eq!(second.op_result, OpResult::Generic as u8);
    assert!(second.is_active);
}

/// A DATA packet arriving before START is rejected and leaves no session.
#[test]
fn data_without_active_session_is_rejected() {
    let mut flash = SimFlash::new(0, SLOT_SIZE * 2, SECTOR);
    let layout = layout();
    let mut mgr = SlotManager::new(&layout, &mut flash);
    let mut session = UpdateSession::new();

    let mut body = [0u8; FwugDataBody::LEN];
    FwugDataBody { packet_number: 0, payload: [0xAA; 128] }.write(&mut body);
    let status = roundtrip(&mut session, &mut mgr, MsgType::FwugData, &body);
    assert_eq!(status.op_result, OpResult::Generic as u8);
    assert!(!status.is_active);
}

/// Cancelling mid-transfer resets packet count and deactivates the session;
/// a subsequent START begins a fresh transfer from packet 0.
#[test]
fn cancel_then_restart_begins_fresh_sequence() {
    let mut flash = SimFlash::new(0, SLOT_SIZE * 2, SECTOR);
    let layout = layout();
    let mut mgr = SlotManager::new(&layout, &mut flash);
    let mut session = UpdateSession::new();

    roundtrip(&mut session, &mut mgr, MsgType::FwugStart, &[]);
    let mut body0 = [0u8; FwugDataBody::LEN];
    FwugDataBody { packet_number: 0, payload: [0xAA; 128] }.write(&mut body0);
    roundtrip(&mut session, &mut mgr, MsgType::FwugData, &body0);

    let cancelled = roundtrip(&mut session, &mut mgr, MsgType::FwugCancel, &[]);
    assert_eq!(cancelled.op_result, OpResult::Ok as u8);
    assert!(!cancelled.is_active);
    assert_eq!(cancelled.packets_received, 0);

    let restarted = roundtrip(&mut session, &mut mgr, MsgType::FwugStart, &[]);
    assert!(restarted.is_active);
    assert_eq!(restarted.packets_received, 0);

    let s0 = roundtrip(&mut session, &mut mgr, MsgType::FwugData, &body0);
    assert_eq!(s0.op_result, OpResult::Ok as u8);
    assert_eq!(s0.packets_received, 1);
}

/// An unrecognised message type elicits OP_RESULT(UNKNOWN_MESSAGE), not a
/// FWUG_STATUS frame, and must not disturb an in-flight session.
#[test]
fn reserved_message_type_yields_op_result_unknown() {
    let mut flash = SimFlash::new(0, SLOT_SIZE * 2, SECTOR);
    let layout = layout();
    let mut mgr = SlotManager::new(&layout, &mut flash);
    let mut session = UpdateSession::new();
    roundtrip(&mut session, &mut mgr, MsgType::FwugStart, &[]);

    let mut raw = [0u8; MAX_FRAME_LEN];
    let n = protocol::encode(&mut raw, MsgType::Cmd, &[0x01]);
    let mut out = [0u8; MAX_FRAME_LEN];
    let out_len = dispatch(&mut session, &mut mgr, &raw[..n], &mut out);
    let frame = protocol::decode(&out[..out_len]).unwrap();
    assert_eq!(frame.msg_type, MsgType::OpResult);
    assert_eq!(frame.body[0], OpResult::UnknownMessage as u8);
    assert!(session.active);
}

/// A frame whose CRC-16 does not match its contents is dropped entirely:
/// the response reports a CRC failure and the session is untouched.
#[test]
fn corrupted_frame_is_rejected_and_session_untouched() {
    let mut flash = SimFlash::new(0, SLOT_SIZE * 2, SECTOR);
    let layout = layout();
    let mut mgr = SlotManager::new(&layout, &mut flash);
    let mut session = UpdateSession::new();
    roundtrip(&mut session, &mut mgr, MsgType::FwugStart, &[]);

    let mut body0 = [0u8; FwugDataBody::LEN];
    FwugDataBody { packet_number: 0, payload: [0xCC; 128] }.write(&mut body0);
    let mut raw = [0u8; MAX_FRAME_LEN];
    let n = protocol::encode(&mut raw, MsgType::FwugData, &body0);
    raw[n - 1] ^= 0x01;

    let mut out = [0u8; MAX_FRAME_LEN];
    let out_len = dispatch(&mut session, &mut mgr, &raw[..n], &mut out);
    let frame = protocol::decode(&out[..out_len]).unwrap();
    assert_eq!(frame.msg_type, MsgType::OpResult);
    assert_eq!(frame.body[0], OpResult::Crc as u8);
    assert_eq!(session.packets_received, 0);
}
