// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Command-line interface definitions.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands;
use crate::transport::Transport;

/// Command-line arguments.
#[derive(Parser)]
#[command(name = "crispy-upload")]
#[command(about = "Firmware upload tool for crispy-bootloader")]
pub struct Cli {
    /// Serial port (e.g., /dev/ttyACM0)
    #[arg(short, long)]
    pub port: String,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Commands {
    /// Sign and stream firmware into the device's backup slot
    Upload {
        /// Firmware binary file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Path to the raw 32-byte ECDSA-P256 signing key
        #[arg(short, long)]
        key: PathBuf,

        /// Firmware version number, compared against the primary slot's on
        /// next boot
        #[arg(short, long, default_value = "1")]
        version: u32,

        /// Backup slot payload capacity in bytes (slot size minus header),
        /// a deployment constant shared with the device's linker script
        #[arg(long)]
        payload_size: usize,
    },

    /// Cancel an in-progress update session
    Cancel,
}

/// Execute the parsed CLI command.
pub fn run(cli: Cli) -> Result<()> {
    let mut transport = Transport::new(&cli.port)?;

    match cli.command {
        Commands::Upload { file, key, version, payload_size } => {
            commands::upload(&mut transport, &file, &key, version, payload_size)
        }
        Commands::Cancel => commands::cancel(&mut transport),
    }
}
