// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Factory provisioning.
//!
//! Factory-fresh devices answer on [`FACTORY_ADDRESS`] with the default
//! login. The provisioner finds the device (at its target address or the
//! factory one), rewrites its configuration with our settings, commits it
//! to flash and reboots, then reconnects at the new address and checks that
//! the configuration stuck. Reprovisioning an already configured device is
//! safe and resets any drift.
//!
//! ```text
//! Searching -> Authenticating -> Configured -> Rebooting -> Reconnecting -> Verified
//!                                                                       \-> Diverged
//! ```

use std::fmt;
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use crate::config::{ConfigChange, ConfigError, DeviceConfig};
use crate::remote::{Prober, RemoteError, RemoteShell};
use crate::retry::RetryPolicy;
use crate::FACTORY_ADDRESS;

// --- Device paths and commands ---

pub const CONFIG_PATH: &str = "/tmp/system.cfg";

/// Replace the running config, commit it to flash and reboot, all in one
/// remote invocation.
pub const WRITE_AND_REBOOT: &str = "cat > /tmp/system.cfg && cfgmtd -w -p /etc/ && reboot";

/// Time given to the reboot before polling for the device again.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(3);

// --- Configuration keys we manage ---

pub const KEY_HOST_NAME: &str = "resolv.host.1.name";
pub const KEY_HOST_STATUS: &str = "resolv.host.1.status";
pub const KEY_SSID: &str = "wireless.1.ssid";
pub const KEY_AUTH_KEY_COMMENT: &str = "sshd.auth.key.1.comment";
pub const KEY_AUTH_KEY_VALUE: &str = "sshd.auth.key.1.value";
pub const KEY_AUTH_KEY_TYPE: &str = "sshd.auth.key.1.type";
pub const KEY_AUTH_KEY_STATUS: &str = "sshd.auth.key.1.status";
pub const KEY_ADDRESS: &str = "netconf.3.ip";

pub const DEFAULT_SSID: &str = "LoBuPaNet";
pub const DEFAULT_KEY_COMMENT: &str = "root@lobupanet";
pub const DEFAULT_KEY_TYPE: &str = "ssh-rsa";
pub const DEFAULT_AUTHORIZED_KEY: &str = "AAAAB3NzaC1yc2EAAAADAQABAAABAQDHKdGw4zj5AJlRkDipXfae31aeEmxixIyzaVZShuS7LzM72rTshPlSym3poIGEjtSZEyEziURvaKMNKIWWEhiZBE2hPmHMuZ7Kle8r7mAn1TquxJALgNj7/yVAE27DJ+y3VF9kmiqsfjXtpCBYTYC83onVxLq1iGmeqCZCw5L4g0pQLOQPmUgV0qkDoR7VzGJfZ/vsWvZwtnNV4r6FMpVbtgJA3PrWaAUZmf3zHqq2oobgo2MbKehBs4L8SBltqLnL7am5v8CS3mgOw+LZKXgR7yNsF2mfkA1GgwYeh4V4NjOvhyfZ4RqVfAfjxxcfWhpDcLwwgyJ3uVuwCjoneRRH";

const ENABLED: &str = "enabled";

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("no response from {addresses} after {attempts} attempts")]
    Unreachable { addresses: String, attempts: u32 },

    #[error("ssh to {address} not available after {attempts} attempts")]
    AuthFailed { address: String, attempts: u32 },

    #[error("{context}: {source}")]
    Remote {
        context: &'static str,
        #[source]
        source: RemoteError,
    },

    #[error("cannot parse device configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("merged configuration has no netconf.3.ip")]
    MissingAddress,

    #[error("new configuration was not applied ({} keys differ)", .changes.len())]
    ConfigNotApplied { changes: Vec<ConfigChange> },
}

/// Where a provisioning run currently is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProvisionState {
    Searching,
    Authenticating,
    Configured,
    Rebooting,
    Reconnecting,
    Verified,
    Diverged,
}

impl ProvisionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ProvisionState::Verified | ProvisionState::Diverged)
    }
}

impl fmt::Display for ProvisionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProvisionState::Searching => "searching",
            ProvisionState::Authenticating => "authenticating",
            ProvisionState::Configured => "configured",
            ProvisionState::Rebooting => "rebooting",
            ProvisionState::Reconnecting => "reconnecting",
            ProvisionState::Verified => "verified",
            ProvisionState::Diverged => "diverged",
        };
        f.write_str(name)
    }
}

/// What a device should look like once provisioned.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProvisionProfile {
    pub name: String,
    pub address: String,
    pub ssid: String,
    pub key_comment: String,
    pub key_type: String,
    pub key_value: String,
}

impl ProvisionProfile {
    /// Profile with the site defaults for everything but name and address.
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            ssid: DEFAULT_SSID.to_string(),
            key_comment: DEFAULT_KEY_COMMENT.to_string(),
            key_type: DEFAULT_KEY_TYPE.to_string(),
            key_value: DEFAULT_AUTHORIZED_KEY.to_string(),
        }
    }

    /// The keys this profile forces on the device.
    pub fn overrides(&self) -> DeviceConfig {
        DeviceConfig::from_iter([
            (KEY_HOST_NAME, self.name.as_str()),
            (KEY_HOST_STATUS, ENABLED),
            (KEY_SSID, self.ssid.as_str()),
            (KEY_AUTH_KEY_COMMENT, self.key_comment.as_str()),
            (KEY_AUTH_KEY_VALUE, self.key_value.as_str()),
            (KEY_AUTH_KEY_TYPE, self.key_type.as_str()),
            (KEY_AUTH_KEY_STATUS, ENABLED),
            (KEY_ADDRESS, self.address.as_str()),
        ])
    }
}

/// Knobs that used to be hard-coded.
#[derive(Clone, Debug)]
pub struct ProvisionSettings {
    pub factory_address: String,
    pub search: RetryPolicy,
    pub auth: RetryPolicy,
    pub settle_delay: Duration,
}

impl Default for ProvisionSettings {
    fn default() -> Self {
        Self {
            factory_address: FACTORY_ADDRESS.to_string(),
            search: RetryPolicy::default(),
            auth: RetryPolicy::default(),
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProvisionReport {
    /// Address the device answers on after provisioning.
    pub address: String,
    /// Configuration written to and read back from the device.
    pub config: DeviceConfig,
}

/// Drives one device through provisioning.
pub struct Provisioner<'a, S: ?Sized, P: ?Sized> {
    shell: &'a S,
    prober: &'a P,
    settings: ProvisionSettings,
    state: ProvisionState,
}

impl<'a, S, P> Provisioner<'a, S, P>
where
    S: RemoteShell + ?Sized,
    P: Prober + ?Sized,
{
    pub fn new(shell: &'a S, prober: &'a P, settings: ProvisionSettings) -> Self {
        Self {
            shell,
            prober,
            settings,
            state: ProvisionState::Searching,
        }
    }

    pub fn state(&self) -> ProvisionState {
        self.state
    }

    fn enter(&mut self, next: ProvisionState) {
        info!(from = %self.state, to = %next, "provisioning state");
        self.state = next;
    }

    /// Poll `candidates` in order until one answers; return the first that
    /// does.
    fn find(&self, candidates: &[&str]) -> Result<String, ProvisionError> {
        self.settings
            .search
            .run(|_| {
                candidates
                    .iter()
                    .find(|address| self.prober.probe(address))
                    .map(|address| address.to_string())
            })
            .map_err(|e| ProvisionError::Unreachable {
                addresses: candidates.join(", "),
                attempts: e.attempts,
            })
    }

    /// Poll until a login on `address` succeeds.
    fn login(&self, address: &str) -> Result<(), ProvisionError> {
        self.settings
            .auth
            .run(|_| self.shell.output(address, &["true"]).ok())
            .map(|_| info!("found device on {address} (ssh)"))
            .map_err(|e| ProvisionError::AuthFailed {
                address: address.to_string(),
                attempts: e.attempts,
            })
    }

    /// Find the device at `target` or the factory address.
    pub fn search(&mut self, target: &str) -> Result<String, ProvisionError> {
        self.enter(ProvisionState::Searching);
        let factory = self.settings.factory_address.clone();
        let candidates: Vec<&str> = if target == factory {
            vec![target]
        } else {
            vec![target, factory.as_str()]
        };
        let address = self.find(&candidates)?;
        info!("found device on {address} (icmp)");
        Ok(address)
    }

    pub fn authenticate(&mut self, address: &str) -> Result<(), ProvisionError> {
        self.enter(ProvisionState::Authenticating);
        self.login(address)
    }

    /// Read and parse the running configuration.
    pub fn read_config(&self, address: &str) -> Result<DeviceConfig, ProvisionError> {
        let raw = self
            .shell
            .output(address, &["cat", CONFIG_PATH])
            .map_err(|source| ProvisionError::Remote {
                context: "get current config",
                source,
            })?;
        Ok(DeviceConfig::parse(&raw)?)
    }

    /// Write `config`, commit it and reboot.
    pub fn write_and_reboot(
        &mut self,
        address: &str,
        config: &DeviceConfig,
    ) -> Result<(), ProvisionError> {
        info!("copying new configuration to device");
        self.shell
            .run_with_input(
                address,
                &["/bin/sh", "-c", WRITE_AND_REBOOT],
                &config.format(),
            )
            .map_err(|source| ProvisionError::Remote {
                context: "write new config",
                source,
            })?;
        self.enter(ProvisionState::Configured);
        self.enter(ProvisionState::Rebooting);
        if !self.settings.settle_delay.is_zero() {
            thread::sleep(self.settings.settle_delay);
        }
        Ok(())
    }

    /// Wait for the rebooted device to come back on `address`.
    pub fn reconnect(&mut self, address: &str) -> Result<(), ProvisionError> {
        self.enter(ProvisionState::Reconnecting);
        info!("waiting for device to come online at {address}");
        self.find(&[address])?;
        info!("found device on {address} (icmp)");
        self.login(address)
    }

    /// Compare the device's configuration with what was written.
    pub fn verify(&mut self, address: &str, written: &DeviceConfig) -> Result<(), ProvisionError> {
        let actual = self.read_config(address)?;
        let changes = written.diff(&actual);
        if changes.is_empty() {
            self.enter(ProvisionState::Verified);
            info!("new configuration applied successfully");
            return Ok(());
        }

        for change in &changes {
            warn!("{change}");
        }
        self.enter(ProvisionState::Diverged);
        Err(ProvisionError::ConfigNotApplied { changes })
    }

    /// Run the whole sequence for `profile`.
    pub fn provision(
        &mut self,
        profile: &ProvisionProfile,
    ) -> Result<ProvisionReport, ProvisionError> {
        let address = self.search(&profile.address)?;
        self.authenticate(&address)?;

        let current = self.read_config(&address)?;
        let config = current.merge(&profile.overrides());
        self.write_and_reboot(&address, &config)?;

        let address = config
            .get(KEY_ADDRESS)
            .ok_or(ProvisionError::MissingAddress)?
            .to_string();
        self.reconnect(&address)?;
        self.verify(&address, &config)?;

        Ok(ProvisionReport { address, config })
    }

    /// Everything up to the write, returning what would change.
    pub fn dry_run(
        &mut self,
        profile: &ProvisionProfile,
    ) -> Result<Vec<ConfigChange>, ProvisionError> {
        let address = self.search(&profile.address)?;
        self.authenticate(&address)?;

        let current = self.read_config(&address)?;
        let merged = current.merge(&profile.overrides());
        Ok(merged.diff(&current))
    }
}
