// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Firmware upload tool for crispy-bootloader via USB CDC.
//!
//! Usage:
//!   crispy-upload --port /dev/ttyACM0 upload firmware.bin --key signing.key --version 2 --payload-size 131000
//!   crispy-upload --port /dev/ttyACM0 cancel

mod cli;
mod commands;
mod transport;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let args = cli::Cli::parse();
    cli::run(args)
}
