// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Common types and operations for the airctl device tools.
//!
//! Everything that talks to a device goes through two seams so it can be
//! exercised without hardware:
//! - [`RemoteShell`]: run a command on a host over ssh
//! - [`Prober`]: check whether a host answers at all
//!
//! The HTTP collaborators (vendor update service, metrics store) are
//! likewise traits ([`firmware::FirmwareSource`], [`stats::MetricsSink`])
//! implemented by the binaries.

pub mod config;
pub mod firmware;
pub mod logging;
pub mod provision;
pub mod remote;
pub mod retry;
pub mod stats;

// Re-export commonly used types
pub use config::{ConfigChange, ConfigError, DeviceConfig};
pub use remote::{Credential, PingProber, Prober, RemoteError, RemoteShell, SshShell};
pub use retry::{RetryExhausted, RetryPolicy};

// --- Device defaults ---

/// Login shipped on factory-fresh devices.
pub const DEFAULT_USERNAME: &str = "ubnt";
pub const DEFAULT_PASSWORD: &str = "ubnt";

/// Address a device answers on straight out of the box.
pub const FACTORY_ADDRESS: &str = "192.168.1.20";
