// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Command implementations for provisioning.

use anyhow::{Context, Result};

use airctl_common::provision::{
    ProvisionError, ProvisionProfile, ProvisionSettings, Provisioner,
};
use airctl_common::{Prober, RemoteShell};

/// Provision the device and verify the result.
pub fn provision<S, P>(
    shell: &S,
    prober: &P,
    settings: ProvisionSettings,
    profile: &ProvisionProfile,
) -> Result<()>
where
    S: RemoteShell + ?Sized,
    P: Prober + ?Sized,
{
    let mut provisioner = Provisioner::new(shell, prober, settings);

    match provisioner.provision(profile) {
        Ok(report) => {
            println!(
                "{} provisioned at {} ({} settings verified)",
                profile.name,
                report.address,
                report.config.len()
            );
            Ok(())
        }
        Err(ProvisionError::ConfigNotApplied { changes }) => {
            println!("Configuration differs from what was written:");
            for change in &changes {
                println!("  {change}");
            }
            Err(ProvisionError::ConfigNotApplied { changes })
                .context("new configuration was not applied")
        }
        Err(e) => Err(e).with_context(|| {
            format!(
                "Provisioning {} stopped while {}",
                profile.name,
                provisioner.state()
            )
        }),
    }
}

/// Show what provisioning would change on the device.
pub fn dry_run<S, P>(
    shell: &S,
    prober: &P,
    settings: ProvisionSettings,
    profile: &ProvisionProfile,
) -> Result<()>
where
    S: RemoteShell + ?Sized,
    P: Prober + ?Sized,
{
    let mut provisioner = Provisioner::new(shell, prober, settings);
    let changes = provisioner
        .dry_run(profile)
        .context("Failed to read device configuration")?;

    if changes.is_empty() {
        println!("{}: already provisioned, nothing to change", profile.name);
        return Ok(());
    }

    println!("{}: {} settings would change", profile.name, changes.len());
    for change in &changes {
        println!(
            "  {}: {} -> {}",
            change.key,
            change.actual.as_deref().unwrap_or("<unset>"),
            change.expected.as_deref().unwrap_or("<unset>")
        );
    }
    Ok(())
}
