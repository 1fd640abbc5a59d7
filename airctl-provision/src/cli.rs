// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Command-line interface definitions.

use std::fs;
use std::net::Ipv4Addr;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::debug;

use airctl_common::provision::{
    ProvisionProfile, ProvisionSettings, DEFAULT_KEY_COMMENT, DEFAULT_SSID,
};
use airctl_common::{
    Credential, PingProber, SshShell, DEFAULT_PASSWORD, DEFAULT_USERNAME, FACTORY_ADDRESS,
};

use crate::commands;

/// Command-line arguments.
#[derive(Parser)]
#[command(name = "airctl-provision")]
#[command(about = "Provision a factory-fresh device with our settings")]
pub struct Cli {
    /// Device name
    #[arg(long)]
    pub name: String,

    /// Device IP address to configure
    #[arg(long)]
    pub ip: Ipv4Addr,

    /// Show what would change without writing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Login on the device
    #[arg(long, default_value = DEFAULT_USERNAME)]
    pub user: String,

    /// Password on the device
    #[arg(long, env = "AIRCTL_PASSWORD", default_value = DEFAULT_PASSWORD, hide_env_values = true)]
    pub password: String,

    /// Address of a device straight from the factory
    #[arg(long, default_value = FACTORY_ADDRESS)]
    pub default_address: String,

    /// Wireless network to join
    #[arg(long, default_value = DEFAULT_SSID)]
    pub ssid: String,

    /// Comment stored with the authorized key
    #[arg(long, default_value = DEFAULT_KEY_COMMENT)]
    pub key_comment: String,

    /// OpenSSH public key file to authorize instead of the built-in key
    #[arg(long, value_name = "FILE")]
    pub key_file: Option<PathBuf>,
}

impl Cli {
    fn profile(&self) -> Result<ProvisionProfile> {
        let mut profile = ProvisionProfile::new(&self.name, self.ip.to_string());
        profile.ssid = self.ssid.clone();
        profile.key_comment = self.key_comment.clone();

        if let Some(path) = &self.key_file {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let (key_type, key_value) = parse_public_key(&text)
                .with_context(|| format!("{} is not an OpenSSH public key", path.display()))?;
            profile.key_type = key_type;
            profile.key_value = key_value;
        }

        Ok(profile)
    }
}

/// Split `ssh-rsa AAAA... comment` into type and base64 value.
fn parse_public_key(text: &str) -> Result<(String, String)> {
    let mut fields = text.split_whitespace();
    match (fields.next(), fields.next()) {
        (Some(key_type), Some(value)) => Ok((key_type.to_string(), value.to_string())),
        _ => bail!("expected \"<type> <key> [comment]\""),
    }
}

/// Execute the parsed CLI command.
pub fn run(cli: Cli) -> Result<()> {
    let profile = cli.profile()?;
    debug!(name = %profile.name, address = %profile.address, dry_run = cli.dry_run, "profile ready");
    let shell = SshShell::new()
        .with_user(cli.user.clone())
        .with_credential(Credential::Password(cli.password.clone()));
    let settings = ProvisionSettings {
        factory_address: cli.default_address.clone(),
        ..ProvisionSettings::default()
    };

    if cli.dry_run {
        commands::dry_run(&shell, &PingProber, settings, &profile)
    } else {
        commands::provision(&shell, &PingProber, settings, &profile)
    }
}
