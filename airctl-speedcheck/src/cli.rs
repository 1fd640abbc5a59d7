// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Command-line interface definitions.

use std::time::Duration;

use anyhow::Result;
use clap::{ArgAction, Parser};

use airctl_common::stats::{CollectOptions, SpeedTestOptions};
use airctl_common::SshShell;

use crate::commands;
use crate::influx::InfluxWriter;

/// Command-line arguments.
#[derive(Parser)]
#[command(name = "airctl-speedcheck")]
#[command(about = "Collect link statistics and speed test results into InfluxDB")]
pub struct Cli {
    /// Address of the local (access point) end of the link
    #[arg(long)]
    pub ap: String,

    /// Address of the remote (station) end of the link
    #[arg(long)]
    pub station: String,

    /// Station address as seen from the access point (default: --station)
    #[arg(long)]
    pub station_ip: Option<String>,

    /// Collect link statistics
    #[arg(long, action = ArgAction::Set, default_value_t = true)]
    pub collect_stats: bool,

    /// Run a link speed test
    #[arg(long, action = ArgAction::Set, default_value_t = true)]
    pub speed_test: bool,

    /// Base URL of InfluxDB
    #[arg(long, default_value = "http://localhost:8086")]
    pub influx_url: String,

    /// InfluxDB database name
    #[arg(long, default_value = "mydb")]
    pub influx_db: String,

    /// ssh login on both ends (default: from ssh config)
    #[arg(short, long)]
    pub user: Option<String>,

    /// Seconds to wait for the speed test server to start
    #[arg(long, default_value = "3")]
    pub settle_secs: u64,
}

impl Cli {
    fn collect_options(&self) -> CollectOptions {
        CollectOptions {
            access_point: self.ap.clone(),
            station: self.station.clone(),
            station_ip: self
                .station_ip
                .clone()
                .unwrap_or_else(|| self.station.clone()),
            collect_stats: self.collect_stats,
            speed_test: self.speed_test,
            speed: SpeedTestOptions {
                server_settle: Duration::from_secs(self.settle_secs),
            },
        }
    }
}

/// Execute the parsed CLI command.
pub fn run(cli: Cli) -> Result<()> {
    let options = cli.collect_options();
    let mut shell = SshShell::new();
    if let Some(user) = cli.user {
        shell = shell.with_user(user);
    }
    let sink = InfluxWriter::new(&cli.influx_url, cli.influx_db)?;

    commands::collect(&shell, &sink, &options)
}
