// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Command implementations for firmware updates.

use anyhow::{Context, Result};

use airctl_common::firmware::{self, FirmwareSource, UpgradeOptions, UpgradeOutcome};
use airctl_common::RemoteShell;

/// Bring the device at `addr` to the latest firmware and report what happened.
pub fn upgrade<S, F>(shell: &S, source: &F, addr: &str, options: UpgradeOptions) -> Result<()>
where
    S: RemoteShell + ?Sized,
    F: FirmwareSource + ?Sized,
{
    let outcome = firmware::upgrade_firmware(shell, source, addr, options)
        .with_context(|| format!("Firmware update of {addr} failed"))?;

    match outcome {
        UpgradeOutcome::UpToDate { version } => {
            println!("{addr}: firmware {version} is up to date");
        }
        UpgradeOutcome::Available(status) => {
            println!("{addr}: update available");
            println!("  Version:  {}", status.version);
            println!("  Date:     {}", status.date);
            println!("  Security: {}", status.security);
            println!("  URL:      {}", status.url);
        }
        UpgradeOutcome::Applied { from, to } => {
            println!("{addr}: updated {from} -> {to}");
            println!("The device reboots into the new firmware on its own.");
        }
    }

    Ok(())
}
