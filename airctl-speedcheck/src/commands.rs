// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Command implementations for statistics collection.

use anyhow::{Context, Result};

use airctl_common::stats::{self, CollectOptions, MetricsSink};
use airctl_common::RemoteShell;

/// Collect the enabled measurements and push them to the metrics store.
pub fn collect<S, M>(shell: &S, sink: &M, options: &CollectOptions) -> Result<()>
where
    S: RemoteShell + ?Sized,
    M: MetricsSink + ?Sized,
{
    let batch = stats::collect(shell, sink, options)
        .with_context(|| format!("Collecting from {} failed", options.access_point))?;

    println!(
        "Wrote {} measurements for {} -> {}",
        batch.len(),
        options.access_point,
        options.station
    );
    Ok(())
}
