// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Error taxonomy shared across the bootloader core: hardware, integrity,
//! authenticity and protocol failures are distinct kinds, never a single
//! catch-all, so callers can apply the right recovery policy.

use core::fmt;

/// Errors from the flash sector driver (C1) and the slot/header layer (C2).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlashError {
    /// Erase/program target lies outside the known sector table.
    BadRange,
    /// Hardware reported a sector error during erase.
    EraseFailed,
    /// A byte-program step failed partway through.
    ProgramFailed,
    /// Primary and backup slot sizes differ; promotion cannot proceed.
    SizeMismatch,
}

impl fmt::Display for FlashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FlashError::BadRange => "address range outside known sectors",
            FlashError::EraseFailed => "flash erase reported a sector error",
            FlashError::ProgramFailed => "flash program failed",
            FlashError::SizeMismatch => "primary/backup slot size mismatch",
        })
    }
}

#[cfg(feature = "std")]
impl std::error::Error for FlashError {}

/// Errors from the integrity & authenticity layer (C3). Gates are evaluated
/// in order (CRC, hash, signature); a later gate is never reached once an
/// earlier one returns its error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthError {
    CrcMismatch,
    HashMismatch,
    SignatureInvalid,
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AuthError::CrcMismatch => "image CRC-32 mismatch",
            AuthError::HashMismatch => "image SHA-256 mismatch",
            AuthError::SignatureInvalid => "ECDSA-P256 signature invalid",
        })
    }
}

#[cfg(feature = "std")]
impl std::error::Error for AuthError {}

/// Errors surfaced by the firmware update engine's (C4) wire layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProtocolError {
    UnknownMessageType,
    MalformedLength,
    CrcMismatch,
    OutOfSequence,
    SessionInactive,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProtocolError::UnknownMessageType => "unknown message type",
            ProtocolError::MalformedLength => "malformed frame length",
            ProtocolError::CrcMismatch => "frame CRC-16 mismatch",
            ProtocolError::OutOfSequence => "packet out of sequence",
            ProtocolError::SessionInactive => "no update session is active",
        })
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ProtocolError {}
