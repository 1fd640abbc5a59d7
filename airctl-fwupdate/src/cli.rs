// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Command-line interface definitions.

use anyhow::Result;
use clap::Parser;

use airctl_common::firmware::{UpgradeOptions, DEFAULT_UPDATE_ENDPOINT};
use airctl_common::{SshShell, DEFAULT_USERNAME};

use crate::commands;
use crate::source::HttpFirmwareSource;

/// Command-line arguments.
#[derive(Parser)]
#[command(name = "airctl-fwupdate")]
#[command(about = "Update a device to the latest vendor firmware")]
pub struct Cli {
    /// Device address
    #[arg(long)]
    pub addr: String,

    /// ssh login on the device
    #[arg(short, long, default_value = DEFAULT_USERNAME)]
    pub user: String,

    /// Vendor update-check endpoint
    #[arg(long, env = "AIRCTL_UPDATE_ENDPOINT", default_value = DEFAULT_UPDATE_ENDPOINT)]
    pub endpoint: String,

    /// Only report whether an update is available
    #[arg(long)]
    pub check: bool,
}

/// Execute the parsed CLI command.
pub fn run(cli: Cli) -> Result<()> {
    let shell = SshShell::new().with_user(cli.user);
    let source = HttpFirmwareSource::new(cli.endpoint)?;
    let options = UpgradeOptions {
        check_only: cli.check,
    };

    commands::upgrade(&shell, &source, &cli.addr, options)
}
