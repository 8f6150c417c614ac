// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Firmware update engine (C4): session lifecycle, handler dispatch, and the
//! write-to-backup discipline. Pure data-in/data-out: the transport hands a
//! raw received frame to `dispatch` and writes whatever bytes it returns back
//! out the wire; no I/O happens in this module.

use crate::config::Slot;
use crate::error::{FlashError, ProtocolError};
use crate::flash::FlashDriver;
use crate::header::SlotManager;
use crate::protocol::{self, Frame, FwugDataBody, FwugStatusBody, MsgType, OpResult, OpResultBody};

/// Volatile, RAM-resident update session state. Created on a successful
/// `FWUG_START`, destroyed on reset or `FWUG_CANCEL` — a reset always cancels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UpdateSession {
    pub active: bool,
    pub packets_received: u32,
}

impl UpdateSession {
    pub const fn new() -> Self {
        Self { active: false, packets_received: 0 }
    }

    pub fn cancel(&mut self) {
        self.active = false;
        self.packets_received = 0;
    }
}

/// Decodes, CRC-validates and dispatches one received frame, writing the
/// response frame into `out` and returning its length.
pub fn dispatch<D: FlashDriver>(
    session: &mut UpdateSession,
    mgr: &mut SlotManager<'_, D>,
    raw: &[u8],
    out: &mut [u8],
) -> usize {
    match protocol::decode(raw) {
        Ok(frame) => handle_frame(session, mgr, frame, out),
        Err(ProtocolError::CrcMismatch) => write_op_result(out, OpResult::Crc),
        Err(_) => write_op_result(out, OpResult::UnknownMessage),
    }
}

fn handle_frame<D: FlashDriver>(
    session: &mut UpdateSession,
    mgr: &mut SlotManager<'_, D>,
    frame: Frame<'_>,
    out: &mut [u8],
) -> usize {
    match frame.msg_type {
        MsgType::FwugStart => {
            let result = handle_start(session, mgr);
            write_status(out, session, result)
        }
        MsgType::FwugData => {
            let result = handle_data(session, mgr, frame.body);
            write_status(out, session, result)
        }
        MsgType::FwugCancel => {
            session.cancel();
            write_status(out, session, OpResult::Ok)
        }
        // REQ_DATA and CMD are reserved for this revision: acknowledge with
        // an error, do not sub-dispatch.
        MsgType::ReqData | MsgType::Cmd => write_op_result(out, OpResult::UnknownMessage),
        // FWUG_STATUS, DATA and OP_RESULT are device->host only; receiving
        // one as an incoming request is itself malformed.
        MsgType::FwugStatus | MsgType::Data | MsgType::OpResult => {
            write_op_result(out, OpResult::UnknownMessage)
        }
    }
}

fn handle_start<D: FlashDriver>(session: &mut UpdateSession, mgr: &mut SlotManager<'_, D>) -> OpResult {
    if session.active {
        return OpResult::Generic;
    }
    match mgr.erase_backup() {
        Ok(()) => {
            session.active = true;
            session.packets_received = 0;
            OpResult::Ok
        }
        Err(_) => OpResult::Generic,
    }
}

fn handle_data<D: FlashDriver>(
    session: &mut UpdateSession,
    mgr: &mut SlotManager<'_, D>,
    body: &[u8],
) -> OpResult {
    if !session.active {
        return OpResult::Generic;
    }
    let parsed = match FwugDataBody::parse(body) {
        Ok(p) => p,
        Err(_) => return OpResult::Generic,
    };
    if parsed.packet_number != session.packets_received {
        // Out-of-sequence: the session stays active so the host can retry
        // the expected sequence number.
        return OpResult::Generic;
    }
    let (backup_start, _) = mgr.slot_bounds(Slot::Backup);
    let offset = session.packets_received * protocol::DATA_PAYLOAD_LEN as u32;
    let dst = backup_start + offset;
    match write_packet(mgr, dst, &parsed.payload) {
        Ok(()) => {
            session.packets_received += 1;
            OpResult::Ok
        }
        Err(_) => OpResult::Generic,
    }
}

fn write_packet<D: FlashDriver>(
    mgr: &mut SlotManager<'_, D>,
    dst: u32,
    payload: &[u8],
) -> Result<(), FlashError> {
    mgr.flash.program(payload, dst)
}

fn write_status(out: &mut [u8], session: &UpdateSession, op_result: OpResult) -> usize {
    let body = FwugStatusBody {
        op_result,
        is_active: session.active,
        packets_received: session.packets_received as u16,
    };
    let mut body_buf = [0u8; FwugStatusBody::LEN];
    body.write(&mut body_buf);
    protocol::encode(out, MsgType::FwugStatus, &body_buf)
}

fn write_op_result(out: &mut [u8], op_result: OpResult) -> usize {
    let body = OpResultBody { op_result };
    let mut body_buf = [0u8; OpResultBody::LEN];
    body.write(&mut body_buf);
    protocol::encode(out, MsgType::OpResult, &body_buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FlashLayout;
    use crate::flash::sim::SimFlash;
    use crate::protocol::{MAX_FRAME_LEN, OpResult};

    fn layout() -> FlashLayout {
        FlashLayout {
            sector_size: 256,
            primary_start: 0,
            primary_size: 1024,
            backup_start: 1024,
            backup_size: 1024,
            header_size: 104,
        }
    }

    fn flash() -> SimFlash {
        SimFlash::new(0, 2048, 256)
    }

    fn send<D: FlashDriver>(
        session: &mut UpdateSession,
        mgr: &mut SlotManager<'_, D>,
        msg_type: MsgType,
        body: &[u8],
    ) -> (OpResult, Option<(bool, u16)>) {
        let mut raw = [0u8; MAX_FRAME_LEN];
        let n = protocol::encode(&mut raw, msg_type, body);
        let mut out = [0u8; MAX_FRAME_LEN];
        let out_len = dispatch(session, mgr, &raw[..n], &mut out);
        let frame = protocol::decode(&out[..out_len]).unwrap();
        match frame.msg_type {
            MsgType::FwugStatus => {
                let op_result = match frame.body[0] {
                    0x00 => OpResult::Ok,
                    0xE2 => OpResult::Crc,
                    0xE3 => OpResult::Auth,
                    0xE4 => OpResult::UnknownMessage,
                    _ => OpResult::Generic,
                };
                let is_active = frame.body[1] != 0;
                let packets_received = u16::from_le_bytes([frame.body[2], frame.body[3]]);
                (op_result, Some((is_active, packets_received)))
            }
            MsgType::OpResult => {
                let op_result = match frame.body[0] {
                    0x00 => OpResult::Ok,
                    0xE2 => OpResult::Crc,
                    0xE3 => OpResult::Auth,
                    _ => OpResult::UnknownMessage,
                };
                (op_result, None)
            }
            _ => panic!("unexpected response type"),
        }
    }

    #[test]
    fn start_erases_backup_and_activates_session() {
        let mut flash = flash();
        // dirty the backup slot so we can observe the erase.
        flash.program(&[0x11; 16], 1024).unwrap();
        let layout = layout();
        let mut mgr = SlotManager::new(&layout, &mut flash);
        let mut session = UpdateSession::new();

        let (result, status) = send(&mut session, &mut mgr, MsgType::FwugStart, &[]);
        assert_eq!(result, OpResult::Ok);
        assert_eq!(status, Some((true, 0)));
        assert!(mgr.flash.bytes_at(1024, 16).iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn well_ordered_data_packets_advance_counter_and_persist_payload() {
        let mut flash = flash();
        let layout = layout();
        let mut mgr = SlotManager::new(&layout, &mut flash);
        let mut session = UpdateSession::new();
        send(&mut session, &mut mgr, MsgType::FwugStart, &[]);

        let mut body0 = [0u8; FwugDataBody::LEN];
        FwugDataBody { packet_number: 0, payload: [0xAA; 128] }.write(&mut body0);
        let (r0, s0) = send(&mut session, &mut mgr, MsgType::FwugData, &body0);
        assert_eq!(r0, OpResult::Ok);
        assert_eq!(s0, Some((true, 1)));

        let mut body1 = [0u8; FwugDataBody::LEN];
        FwugDataBody { packet_number: 1, payload: [0xBB; 128] }.write(&mut body1);
        let (r1, s1) = send(&mut session, &mut mgr, MsgType::FwugData, &body1);
        assert_eq!(r1, OpResult::Ok);
        assert_eq!(s1, Some((true, 2)));

        assert_eq!(mgr.flash.bytes_at(1024, 128), &[0xAAu8; 128][..]);
        assert_eq!(mgr.flash.bytes_at(1024 + 128, 128), &[0xBBu8; 128][..]);

        // replay of packet 1: rejected, counters unchanged.
        let (r2, s2) = send(&mut session, &mut mgr, MsgType::FwugData, &body1);
        assert_eq!(r2, OpResult::Generic);
        assert_eq!(s2, Some((true, 2)));
    }

    #[test]
    fn cancel_resets_session() {
        let mut flash = flash();
        let layout = layout();
        let mut mgr = SlotManager::new(&layout, &mut flash);
        let mut session = UpdateSession::new();
        send(&mut session, &mut mgr, MsgType::FwugStart, &[]);

        let (result, status) = send(&mut session, &mut mgr, MsgType::FwugCancel, &[]);
        assert_eq!(result, OpResult::Ok);
        assert_eq!(status, Some((false, 0)));
    }

    #[test]
    fn frame_with_bad_crc_leaves_session_untouched() {
        let mut flash = flash();
        let layout = layout();
        let mut mgr = SlotManager::new(&layout, &mut flash);
        let mut session = UpdateSession::new();
        send(&mut session, &mut mgr, MsgType::FwugStart, &[]);

        let mut raw = [0u8; MAX_FRAME_LEN];
        let n = protocol::encode(&mut raw, MsgType::FwugCancel, &[]);
        raw[n - 1] ^= 0xFF;
        let mut out = [0u8; MAX_FRAME_LEN];
        dispatch(&mut session, &mut mgr, &raw[..n], &mut out);

        assert!(session.active);
        assert_eq!(session.packets_received, 0);
    }
}
