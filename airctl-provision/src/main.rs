// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Factory provisioning tool for airMAX devices.
//!
//! Waits for a device on its target address or the factory default, writes
//! our settings into its configuration, reboots it and checks the result.
//! Needs `ssh`, `sshpass` and `ping` on the PATH.
//!
//! Usage:
//!   airctl-provision --name roof-north --ip 10.0.0.5
//!   airctl-provision --name roof-north --ip 10.0.0.5 --dry-run

mod cli;
mod commands;

use std::process;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    airctl_common::logging::init();

    // Usage errors exit 1 like every other failure; help and version still exit 0
    let args = match cli::Cli::try_parse() {
        Ok(args) => args,
        Err(e) if e.use_stderr() => {
            let _ = e.print();
            process::exit(1);
        }
        Err(e) => e.exit(),
    };
    cli::run(args)
}
