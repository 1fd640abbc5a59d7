// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Firmware update tool for airMAX devices.
//!
//! Usage:
//!   airctl-fwupdate --addr 10.0.0.5
//!   airctl-fwupdate --addr 10.0.0.5 --check

mod cli;
mod commands;
mod source;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    airctl_common::logging::init();
    let args = cli::Cli::parse();
    cli::run(args)
}
