// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! HTTP access to the vendor update service.

use std::io::Read;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::blocking::Client;
use tracing::debug;

use airctl_common::firmware::{FirmwareSource, UpdateStatus};

/// [`FirmwareSource`] talking to the vendor over HTTP.
pub struct HttpFirmwareSource {
    client: Client,
    endpoint: String,
}

impl HttpFirmwareSource {
    pub fn new(endpoint: String) -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, endpoint })
    }

    fn progress_bar(len: Option<u64>) -> Result<ProgressBar> {
        let pb = match len {
            Some(len) => {
                let pb = ProgressBar::new(len);
                pb.set_style(
                    ProgressStyle::default_bar()
                        .template(
                            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
                        )?
                        .progress_chars("#>-"),
                );
                pb
            }
            None => {
                let pb = ProgressBar::new_spinner();
                pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {bytes}")?);
                pb
            }
        };
        Ok(pb)
    }
}

impl FirmwareSource for HttpFirmwareSource {
    type Error = anyhow::Error;

    fn check(&self, board_id: &str, version: &str) -> Result<UpdateStatus> {
        debug!(endpoint = %self.endpoint, board_id, version, "update check");
        let status = self
            .client
            .get(&self.endpoint)
            .query(&[("sysid", board_id), ("fwver", version)])
            .send()
            .with_context(|| format!("Request to {} failed", self.endpoint))?
            .error_for_status()?
            .json::<UpdateStatus>()
            .context("Failed to decode update status")?;
        Ok(status)
    }

    fn download(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .with_context(|| format!("Request to {url} failed"))?
            .error_for_status()?;

        let pb = Self::progress_bar(response.content_length())?;
        let mut image = Vec::with_capacity(response.content_length().unwrap_or(0) as usize);
        let read = pb.wrap_read(response).read_to_end(&mut image);
        match read {
            Ok(_) => pb.finish_and_clear(),
            Err(_) => pb.abandon(),
        }
        read.with_context(|| format!("Failed to read {url}"))?;

        debug!(bytes = image.len(), "firmware downloaded");
        Ok(image)
    }
}
