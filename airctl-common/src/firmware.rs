// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Firmware update pipeline.
//!
//! Read the installed version and board id from the device, ask the vendor
//! whether a newer image exists, download and md5-verify it, copy it to the
//! device and run the device's own updater. Every step depends on the one
//! before it and nothing is retried.

use std::error::Error as StdError;

use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::remote::{RemoteError, RemoteShell};

// --- Device paths and commands ---

pub const VERSION_PATH: &str = "/usr/lib/version";
pub const BOARD_INFO_PATH: &str = "/etc/board.inc";
pub const STAGING_PATH: &str = "/tmp/fwupdate.bin";
pub const APPLY_COMMAND: [&str; 2] = ["/sbin/fwupdate", "-m"];

/// Vendor update-check service.
pub const DEFAULT_UPDATE_ENDPOINT: &str = "http://www.ubnt.com/update/check.php";

const BOARD_ID_PREFIX: &str = "$board_id=";

type BoxError = Box<dyn StdError + Send + Sync>;

#[derive(Debug, Error)]
pub enum FirmwareError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("update check failed: {0}")]
    Check(#[source] BoxError),

    #[error("download of {url} failed: {source}")]
    Download {
        url: String,
        #[source]
        source: BoxError,
    },

    #[error("{url}: {source}")]
    ChecksumMismatch {
        url: String,
        #[source]
        source: ChecksumMismatch,
    },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("checksum mismatch, expected {expected} got {actual}")]
pub struct ChecksumMismatch {
    pub expected: String,
    pub actual: String,
}

/// Answer from the vendor update-check service.
///
/// Every field is a string on the wire, `update` included.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct UpdateStatus {
    pub url: String,
    pub checksum: String,
    pub update: String,
    pub version: String,
    pub date: String,
    pub security: String,
}

impl UpdateStatus {
    /// Only the literal string `"false"` means there is nothing to do.
    pub fn is_update_available(&self) -> bool {
        self.update != "false"
    }
}

/// Where update information and images come from.
pub trait FirmwareSource {
    type Error: Into<BoxError>;

    /// Ask whether `version` is the latest for `board_id`.
    fn check(&self, board_id: &str, version: &str) -> Result<UpdateStatus, Self::Error>;

    /// Fetch the image at `url`.
    fn download(&self, url: &str) -> Result<Vec<u8>, Self::Error>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct UpgradeOptions {
    /// Stop after the update check.
    pub check_only: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpgradeOutcome {
    UpToDate { version: String },
    /// An update exists but was not installed (check-only run).
    Available(UpdateStatus),
    Applied { from: String, to: String },
}

/// Installed firmware version string.
pub fn read_remote_version<S>(shell: &S, host: &str) -> Result<String, RemoteError>
where
    S: RemoteShell + ?Sized,
{
    let output = shell.output(host, &["cat", VERSION_PATH])?;
    Ok(String::from_utf8_lossy(&output).trim().to_string())
}

/// Board id from the device's board description file.
///
/// See [`parse_board_id`] for what happens when the file has no id.
pub fn read_board_id<S>(shell: &S, host: &str) -> Result<String, RemoteError>
where
    S: RemoteShell + ?Sized,
{
    let output = shell.output(host, &["cat", BOARD_INFO_PATH])?;
    Ok(parse_board_id(&String::from_utf8_lossy(&output)))
}

/// Extract the value of a `$board_id="0xNNNN";` line.
///
/// The last such line wins. Without one the result is an empty string, not
/// an error, and the empty id is sent to the vendor as-is. That fallback is
/// a known defect kept for compatibility.
pub fn parse_board_id(board_info: &str) -> String {
    board_info
        .lines()
        .filter_map(|line| line.strip_prefix(BOARD_ID_PREFIX))
        .last()
        .map(|value| value.trim_matches(|c| c == '"' || c == ';').to_string())
        .unwrap_or_default()
}

/// Lowercase hex md5 of `data`.
pub fn md5_hex(data: &[u8]) -> String {
    format!("{:x}", md5::compute(data))
}

/// Compare the md5 of `data` against `expected`. Case-sensitive; the vendor
/// publishes lowercase digests.
pub fn verify_checksum(data: &[u8], expected: &str) -> Result<(), ChecksumMismatch> {
    let actual = md5_hex(data);
    if actual == expected {
        Ok(())
    } else {
        Err(ChecksumMismatch {
            expected: expected.to_string(),
            actual,
        })
    }
}

/// Download the image at `url` and check it against `expected_md5`.
pub fn download_and_verify<F>(
    source: &F,
    url: &str,
    expected_md5: &str,
) -> Result<Vec<u8>, FirmwareError>
where
    F: FirmwareSource + ?Sized,
{
    let image = source
        .download(url)
        .map_err(|e| FirmwareError::Download {
            url: url.to_string(),
            source: e.into(),
        })?;
    verify_checksum(&image, expected_md5).map_err(|source| FirmwareError::ChecksumMismatch {
        url: url.to_string(),
        source,
    })?;
    Ok(image)
}

/// Copy `image` to the staging path on the device.
pub fn upload_firmware<S>(shell: &S, host: &str, image: &[u8]) -> Result<(), RemoteError>
where
    S: RemoteShell + ?Sized,
{
    let redirect = format!(">{STAGING_PATH}");
    shell.run_with_input(host, &["cat", &redirect], image)
}

/// Run the device's updater on the staged image. The device handles
/// flashing and rollback from here on.
pub fn apply_update<S>(shell: &S, host: &str) -> Result<(), RemoteError>
where
    S: RemoteShell + ?Sized,
{
    // Empty stdin; the updater's progress output goes straight to ours
    shell.run_with_input(host, &APPLY_COMMAND, &[])
}

/// Bring `host` to the latest vendor firmware.
pub fn upgrade_firmware<S, F>(
    shell: &S,
    source: &F,
    host: &str,
    options: UpgradeOptions,
) -> Result<UpgradeOutcome, FirmwareError>
where
    S: RemoteShell + ?Sized,
    F: FirmwareSource + ?Sized,
{
    info!("getting current firmware version");
    let version = read_remote_version(shell, host)?;
    info!("current firmware is {version:?}");

    info!("getting device id");
    let board_id = read_board_id(shell, host)?;
    if board_id.is_empty() {
        warn!("no board id in {BOARD_INFO_PATH}, checking with an empty id");
    }
    info!("device id is {board_id:?}");

    info!("checking if version {version} is the latest for device {board_id}");
    let status = source
        .check(&board_id, &version)
        .map_err(|e| FirmwareError::Check(e.into()))?;
    if !status.is_update_available() {
        info!("firmware is up to date");
        return Ok(UpgradeOutcome::UpToDate { version });
    }
    if options.check_only {
        info!("version {} is available", status.version);
        return Ok(UpgradeOutcome::Available(status));
    }

    info!(
        "fetching the firmware from {} (md5 {})",
        status.url, status.checksum
    );
    let image = download_and_verify(source, &status.url, &status.checksum)?;

    info!("copying the update to the device");
    upload_firmware(shell, host, &image)?;

    info!("applying the update");
    apply_update(shell, host)?;

    Ok(UpgradeOutcome::Applied {
        from: version,
        to: status.version,
    })
}
