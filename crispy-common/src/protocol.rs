// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Wire framing for the firmware update engine (C4).
//!
//! `[ type:u8 ][ len:u8 ][ body ... ][ crc16:u16 big-endian ]`
//!
//! `len` is the total frame length including header and CRC. Multi-byte
//! fields inside the body are little-endian; the CRC-16 itself travels
//! big-endian, matching the framing as specified.

use crate::crc::crc16_ccitt;
use crate::error::ProtocolError;

pub const HEADER_LEN: usize = 2;
pub const CRC_LEN: usize = 2;
pub const DATA_PAYLOAD_LEN: usize = 128;
/// Widest frame on the wire: FWUG_DATA's header + packet number + payload + CRC.
pub const MAX_FRAME_LEN: usize = HEADER_LEN + 4 + DATA_PAYLOAD_LEN + CRC_LEN;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum MsgType {
    FwugStart = 1,
    FwugData = 2,
    FwugStatus = 3,
    FwugCancel = 4,
    ReqData = 5,
    Data = 6,
    Cmd = 7,
    OpResult = 8,
}

impl MsgType {
    pub fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            1 => MsgType::FwugStart,
            2 => MsgType::FwugData,
            3 => MsgType::FwugStatus,
            4 => MsgType::FwugCancel,
            5 => MsgType::ReqData,
            6 => MsgType::Data,
            7 => MsgType::Cmd,
            8 => MsgType::OpResult,
            _ => return None,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum OpResult {
    Ok = 0x00,
    Generic = 0xE1,
    Crc = 0xE2,
    Auth = 0xE3,
    UnknownMessage = 0xE4,
}

/// Per-message-type settings, consolidated into one authoritative table
/// (the legacy source carried two divergent copies of this).
#[derive(Clone, Copy, Debug)]
pub struct MsgSettings {
    pub msg_type: MsgType,
    pub is_encrypted: bool,
    pub response: Option<MsgType>,
}

pub const MSG_SETTINGS: [MsgSettings; 8] = [
    MsgSettings { msg_type: MsgType::FwugStart, is_encrypted: false, response: Some(MsgType::FwugStatus) },
    MsgSettings { msg_type: MsgType::FwugData, is_encrypted: false, response: Some(MsgType::FwugStatus) },
    MsgSettings { msg_type: MsgType::FwugStatus, is_encrypted: false, response: None },
    MsgSettings { msg_type: MsgType::FwugCancel, is_encrypted: false, response: Some(MsgType::FwugStatus) },
    MsgSettings { msg_type: MsgType::ReqData, is_encrypted: false, response: Some(MsgType::OpResult) },
    MsgSettings { msg_type: MsgType::Data, is_encrypted: false, response: None },
    MsgSettings { msg_type: MsgType::Cmd, is_encrypted: false, response: Some(MsgType::OpResult) },
    MsgSettings { msg_type: MsgType::OpResult, is_encrypted: false, response: None },
];

pub fn settings_for(msg_type: MsgType) -> &'static MsgSettings {
    &MSG_SETTINGS[msg_type as usize - 1]
}

/// A decoded, CRC-validated frame. Body bytes are borrowed from the caller's
/// receive buffer.
#[derive(Debug)]
pub struct Frame<'a> {
    pub msg_type: MsgType,
    pub body: &'a [u8],
}

/// Validates and decodes one complete frame out of `raw`.
pub fn decode(raw: &[u8]) -> Result<Frame<'_>, ProtocolError> {
    if raw.len() < HEADER_LEN + CRC_LEN {
        return Err(ProtocolError::MalformedLength);
    }
    let msg_type = MsgType::from_u8(raw[0]).ok_or(ProtocolError::UnknownMessageType)?;
    let len = raw[1] as usize;
    if len < HEADER_LEN + CRC_LEN || len > raw.len() {
        return Err(ProtocolError::MalformedLength);
    }
    let frame = &raw[..len];
    let body = &frame[HEADER_LEN..len - CRC_LEN];
    let crc_computed = crc16_ccitt(&frame[..len - CRC_LEN]);
    let crc_received = u16::from_be_bytes([frame[len - 2], frame[len - 1]]);
    if crc_computed != crc_received {
        return Err(ProtocolError::CrcMismatch);
    }
    Ok(Frame { msg_type, body })
}

/// Encodes a frame into `out`, returning the number of bytes written.
pub fn encode(out: &mut [u8], msg_type: MsgType, body: &[u8]) -> usize {
    let len = HEADER_LEN + body.len() + CRC_LEN;
    out[0] = msg_type as u8;
    out[1] = len as u8;
    out[HEADER_LEN..HEADER_LEN + body.len()].copy_from_slice(body);
    let crc = crc16_ccitt(&out[..len - CRC_LEN]);
    out[len - 2..len].copy_from_slice(&crc.to_be_bytes());
    len
}

/// Body of FWUG_DATA: `packet_number:u32 LE`, `payload[128]`.
pub struct FwugDataBody {
    pub packet_number: u32,
    pub payload: [u8; DATA_PAYLOAD_LEN],
}

impl FwugDataBody {
    pub const LEN: usize = 4 + DATA_PAYLOAD_LEN;

    pub fn parse(body: &[u8]) -> Result<Self, ProtocolError> {
        if body.len() != Self::LEN {
            return Err(ProtocolError::MalformedLength);
        }
        let packet_number = u32::from_le_bytes(body[0..4].try_into().unwrap());
        let mut payload = [0u8; DATA_PAYLOAD_LEN];
        payload.copy_from_slice(&body[4..]);
        Ok(Self { packet_number, payload })
    }

    pub fn write(&self, out: &mut [u8]) {
        out[0..4].copy_from_slice(&self.packet_number.to_le_bytes());
        out[4..].copy_from_slice(&self.payload);
    }
}

/// Body of FWUG_STATUS: `op_result:u8`, `is_active:u8`, `packets_received:u16 LE`.
pub struct FwugStatusBody {
    pub op_result: OpResult,
    pub is_active: bool,
    pub packets_received: u16,
}

impl FwugStatusBody {
    pub const LEN: usize = 4;

    pub fn write(&self, out: &mut [u8]) {
        out[0] = self.op_result as u8;
        out[1] = self.is_active as u8;
        out[2..4].copy_from_slice(&self.packets_received.to_le_bytes());
    }
}

/// Body of OP_RESULT: `op_result:u8`.
pub struct OpResultBody {
    pub op_result: OpResult,
}

impl OpResultBody {
    pub const LEN: usize = 1;

    pub fn write(&self, out: &mut [u8]) {
        out[0] = self.op_result as u8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_fwug_cancel() {
        let mut buf = [0u8; MAX_FRAME_LEN];
        let n = encode(&mut buf, MsgType::FwugCancel, &[]);
        let frame = decode(&buf[..n]).unwrap();
        assert_eq!(frame.msg_type, MsgType::FwugCancel);
        assert!(frame.body.is_empty());
    }

    #[test]
    fn round_trip_fwug_data() {
        let body = FwugDataBody { packet_number: 7, payload: [0xAAu8; DATA_PAYLOAD_LEN] };
        let mut body_buf = [0u8; FwugDataBody::LEN];
        body.write(&mut body_buf);

        let mut buf = [0u8; MAX_FRAME_LEN];
        let n = encode(&mut buf, MsgType::FwugData, &body_buf);
        let frame = decode(&buf[..n]).unwrap();
        assert_eq!(frame.msg_type, MsgType::FwugData);
        let parsed = FwugDataBody::parse(frame.body).unwrap();
        assert_eq!(parsed.packet_number, 7);
        assert_eq!(parsed.payload, [0xAAu8; DATA_PAYLOAD_LEN]);
    }

    #[test]
    fn bit_flip_in_crc_is_rejected() {
        let mut buf = [0u8; MAX_FRAME_LEN];
        let n = encode(&mut buf, MsgType::FwugCancel, &[]);
        buf[n - 1] ^= 0x01;
        assert!(matches!(decode(&buf[..n]), Err(ProtocolError::CrcMismatch)));
    }

    #[test]
    fn unknown_type_is_rejected() {
        let mut buf = [0u8; MAX_FRAME_LEN];
        let n = encode(&mut buf, MsgType::FwugCancel, &[]);
        buf[0] = 0x09;
        assert!(matches!(decode(&buf[..n]), Err(ProtocolError::UnknownMessageType)));
    }

    #[test]
    fn fwug_start_elicits_fwug_status() {
        assert_eq!(settings_for(MsgType::FwugStart).response, Some(MsgType::FwugStatus));
    }
}
