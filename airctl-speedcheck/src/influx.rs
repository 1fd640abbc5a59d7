// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! InfluxDB line protocol writer.

use anyhow::{bail, Context, Result};
use reqwest::blocking::Client;
use tracing::debug;

use airctl_common::stats::MetricsSink;

/// Posts batches to the InfluxDB 1.x `/write` endpoint.
pub struct InfluxWriter {
    client: Client,
    url: String,
    db: String,
}

impl InfluxWriter {
    pub fn new(base_url: &str, db: String) -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            url: format!("{}/write", base_url.trim_end_matches('/')),
            db,
        })
    }
}

impl MetricsSink for InfluxWriter {
    type Error = anyhow::Error;

    fn write(&self, body: &str) -> Result<()> {
        debug!(url = %self.url, db = %self.db, bytes = body.len(), "influx write");
        let response = self
            .client
            .post(&self.url)
            .query(&[("db", self.db.as_str())])
            .body(body.to_owned())
            .send()
            .with_context(|| format!("Request to {} failed", self.url))?;

        let status = response.status();
        if status.as_u16() >= 400 {
            bail!("influx: {status}");
        }
        Ok(())
    }
}
