// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Command implementations for bootloader operations.

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use p256::ecdsa::signature::Signer;
use p256::ecdsa::{Signature, SigningKey};
use sha2::{Digest, Sha256};

use crispy_common::crc::crc32_ieee;
use crispy_common::header::{ImageHeader, HEADER_LEN};
use crispy_common::protocol::{FwugDataBody, MsgType, OpResult, DATA_PAYLOAD_LEN};

use crate::transport::Transport;

fn load_signing_key(path: &Path) -> Result<SigningKey> {
    let raw = fs::read(path).with_context(|| format!("Failed to read signing key {}", path.display()))?;
    if raw.len() != 32 {
        bail!("Signing key must be exactly 32 bytes, got {}", raw.len());
    }
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&raw);
    SigningKey::from_bytes(&bytes.into()).context("Invalid signing key")
}

/// Builds the full slot image: the firmware padded (with 0xFF, matching an
/// erased flash sector) up to `payload_size`, followed by the signed trailer
/// header. `payload_size` must match the device's backup slot capacity minus
/// its header size, a deployment constant shared by the firmware build and
/// this tool.
fn package_image(firmware: &[u8], payload_size: usize, version: u32, key: &SigningKey) -> Result<Vec<u8>> {
    if firmware.len() > payload_size {
        bail!(
            "Firmware is {} bytes, exceeds the {} byte payload capacity",
            firmware.len(),
            payload_size
        );
    }

    let mut payload = vec![0xFFu8; payload_size];
    payload[..firmware.len()].copy_from_slice(firmware);

    let crc32 = crc32_ieee(&payload);
    let sha256: [u8; 32] = Sha256::digest(&payload).into();
    let signature: Signature = key.sign(&sha256);
    let mut sig_bytes = [0u8; 64];
    sig_bytes.copy_from_slice(&signature.to_bytes());

    let header = ImageHeader { version, crc32, sha256, signature: sig_bytes };

    let mut image = payload;
    image.extend_from_slice(&header.to_bytes());
    Ok(image)
}

fn parse_status(body: &[u8]) -> Result<(OpResult, bool, u16)> {
    if body.len() != 4 {
        bail!("Malformed FWUG_STATUS body ({} bytes)", body.len());
    }
    let op_result = op_result_from_byte(body[0])?;
    let is_active = body[1] != 0;
    let packets_received = u16::from_le_bytes([body[2], body[3]]);
    Ok((op_result, is_active, packets_received))
}

fn op_result_from_byte(b: u8) -> Result<OpResult> {
    Ok(match b {
        0x00 => OpResult::Ok,
        0xE1 => OpResult::Generic,
        0xE2 => OpResult::Crc,
        0xE3 => OpResult::Auth,
        0xE4 => OpResult::UnknownMessage,
        other => bail!("Unknown op_result byte 0x{:02x}", other),
    })
}

/// Upload firmware to the device's backup slot.
pub fn upload(
    transport: &mut Transport,
    file: &Path,
    key: &Path,
    version: u32,
    payload_size: usize,
) -> Result<()> {
    let firmware = fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let signing_key = load_signing_key(key)?;

    println!(
        "Firmware: {} ({} bytes, version {})",
        file.display(),
        firmware.len(),
        version
    );

    let image = package_image(&firmware, payload_size, version, &signing_key)?;
    println!(
        "Packaged image: {} bytes payload + {} byte header",
        payload_size, HEADER_LEN
    );
    println!();

    print!("Starting update (erasing backup slot)... ");
    std::io::stdout().flush()?;

    let (msg_type, body) = transport.send_recv_timeout(MsgType::FwugStart, &[], 60_000)?;
    if msg_type != MsgType::FwugStatus {
        bail!("Unexpected response to FWUG_START: {:?}", msg_type);
    }
    let (result, ..) = parse_status(&body)?;
    if result != OpResult::Ok {
        bail!("FWUG_START failed: {:?}", result);
    }
    println!("OK");

    let pb = ProgressBar::new(image.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
            )?
            .progress_chars("#>-"),
    );

    for (packet_number, chunk) in image.chunks(DATA_PAYLOAD_LEN).enumerate() {
        let mut payload = [0u8; DATA_PAYLOAD_LEN];
        payload[..chunk.len()].copy_from_slice(chunk);
        // Final chunk shorter than DATA_PAYLOAD_LEN is padded with 0xFF,
        // consistent with the erased-sector padding used to build the image.
        payload[chunk.len()..].fill(0xFF);

        let body = FwugDataBody { packet_number: packet_number as u32, payload };
        let mut body_buf = [0u8; FwugDataBody::LEN];
        body.write(&mut body_buf);

        let (msg_type, resp_body) = transport.send_recv(MsgType::FwugData, &body_buf)?;
        if msg_type != MsgType::FwugStatus {
            pb.abandon();
            bail!("Unexpected response at packet {}: {:?}", packet_number, msg_type);
        }
        let (result, is_active, packets_received) = parse_status(&resp_body)?;
        if result != OpResult::Ok {
            pb.abandon();
            bail!(
                "FWUG_DATA failed at packet {} (received {} so far, active={}): {:?}",
                packet_number,
                packets_received,
                is_active,
                result
            );
        }

        pb.set_position(((packet_number + 1) * DATA_PAYLOAD_LEN).min(image.len()) as u64);
    }

    pb.finish_with_message("Upload complete");
    println!();
    println!("Firmware staged in the backup slot.");
    println!("The device promotes it automatically on its next boot if its version is newer.");

    Ok(())
}

/// Cancel an in-progress upload session.
pub fn cancel(transport: &mut Transport) -> Result<()> {
    print!("Cancelling update session... ");
    std::io::stdout().flush()?;

    let (msg_type, body) = transport.send_recv(MsgType::FwugCancel, &[])?;
    if msg_type != MsgType::FwugStatus {
        bail!("Unexpected response to FWUG_CANCEL: {:?}", msg_type);
    }
    let (result, ..) = parse_status(&body)?;
    match result {
        OpResult::Ok => println!("OK"),
        other => bail!("FWUG_CANCEL failed: {:?}", other),
    }

    Ok(())
}
