// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Integrity & authenticity layer (C3): CRC-32 over the image payload,
//! SHA-256 over the same region, ECDSA-P256 verification of the signature
//! against the embedded public key. Gates run in that order; a later gate
//! never runs once an earlier one has failed.

use crate::config::{FlashLayout, Slot};
use crate::error::{AuthError, FlashError};
use crate::flash::FlashDriver;
use crate::header::{ImageHeader, SlotManager};
use p256::ecdsa::signature::Verifier;
use p256::ecdsa::{Signature, VerifyingKey};
use sha2::{Digest, Sha256};

/// Uncompressed SEC1 public key point, x||y (64 bytes), embedded by the
/// deployment at build time.
pub type PublicKeyBytes = [u8; 64];

const CHUNK: usize = 256;

/// Streams the payload of `slot` through SHA-256.
pub fn sha256_of_payload<D: FlashDriver>(
    flash: &mut D,
    layout: &FlashLayout,
    slot: Slot,
) -> Result<[u8; 32], FlashError> {
    let (start, end) = layout.slot_bounds(slot);
    let payload_end = end - layout.header_size;
    let mut hasher = Sha256::new();
    let mut addr = start;
    let mut buf = [0u8; CHUNK];
    while addr < payload_end {
        let n = core::cmp::min(CHUNK as u32, payload_end - addr) as usize;
        flash.read(&mut buf[..n], addr)?;
        hasher.update(&buf[..n]);
        addr += n as u32;
    }
    Ok(hasher.finalize().into())
}

fn sec1_uncompressed(xy: &PublicKeyBytes) -> [u8; 65] {
    let mut out = [0u8; 65];
    out[0] = 0x04;
    out[1..].copy_from_slice(xy);
    out
}

/// `verify_slot`: CRC, then SHA-256, then ECDSA-P256, in that order.
pub fn verify_slot<D: FlashDriver>(
    mgr: &mut SlotManager<'_, D>,
    slot: Slot,
    pubkey: &PublicKeyBytes,
) -> Result<ImageHeader, AuthError> {
    let header = mgr.read_header(slot).map_err(|_| AuthError::CrcMismatch)?;

    let crc = mgr.compute_payload_crc32(slot).map_err(|_| AuthError::CrcMismatch)?;
    if crc != header.crc32 {
        return Err(AuthError::CrcMismatch);
    }

    let sha = sha256_of_payload(&mut *mgr.flash, mgr.layout, slot).map_err(|_| AuthError::HashMismatch)?;
    if sha != header.sha256 {
        return Err(AuthError::HashMismatch);
    }

    let verifying_key =
        VerifyingKey::from_sec1_bytes(&sec1_uncompressed(pubkey)).map_err(|_| AuthError::SignatureInvalid)?;
    let signature =
        Signature::try_from(header.signature.as_slice()).map_err(|_| AuthError::SignatureInvalid)?;
    verifying_key
        .verify(&header.sha256, &signature)
        .map_err(|_| AuthError::SignatureInvalid)?;

    Ok(header)
}
