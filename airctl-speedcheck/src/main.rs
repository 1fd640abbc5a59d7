// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Link statistics and speed test collector.
//!
//! Usage:
//!   airctl-speedcheck --ap ap.lan --station cpe.lan
//!   airctl-speedcheck --ap ap.lan --station cpe.lan --speed-test false

mod cli;
mod commands;
mod influx;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    airctl_common::logging::init();
    let args = cli::Cli::parse();
    cli::run(args)
}
