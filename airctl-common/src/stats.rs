// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Link statistics and speed tests, emitted as InfluxDB line protocol.

use std::error::Error as StdError;
use std::fmt;
use std::io::{self, BufReader, Read};
use std::sync::LazyLock;
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use regex::bytes::Regex;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::remote::{ProcessGuard, RemoteError, RemoteShell};

// --- Device commands ---

/// Prints one JSON record per associated station.
pub const STATION_LIST_COMMAND: [&str; 1] = ["wstalist"];

/// Speed test listener; exits on its own after 90 seconds.
pub const SPEED_SERVER_COMMAND: [&str; 4] = ["ubntbox", "speedsrv", "-t", "90"];

/// Time given to the listener to start before the client connects.
pub const DEFAULT_SERVER_SETTLE: Duration = Duration::from_secs(3);

static SPEEDTEST_RESULT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"RX: ([0-9.]+) Mbps\nTX: ([0-9.]+) Mbps\n").expect("speedtest pattern is valid")
});

type BoxError = Box<dyn StdError + Send + Sync>;

#[derive(Debug, Error)]
pub enum StatsError {
    #[error("{context}: {source}")]
    Remote {
        context: &'static str,
        #[source]
        source: RemoteError,
    },

    #[error("cannot parse wstalist output: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("wstalist reader thread panicked")]
    Reader,

    #[error("cannot parse speedtest output: {0:?}")]
    Parse(String),

    #[error("metrics write failed: {0}")]
    Sink(#[source] BoxError),
}

/// One associated station as reported by `wstalist`.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct StationInfo {
    pub mac: String,
    pub name: String,
    #[serde(rename = "lastip")]
    pub last_ip: String,
    #[serde(rename = "associd")]
    pub assoc_id: i64,
    #[serde(rename = "aprepeater")]
    pub ap_repeater: i64,
    pub tx: f64,
    pub rx: f64,
    pub signal: i64,
    pub ccq: i64,
    pub idle: i64,
    pub uptime: i64,
    pub ack: i64,
    pub distance: i64,
    #[serde(rename = "txpower")]
    pub tx_power: i64,
    #[serde(rename = "noisefloor")]
    pub noise_floor: i64,
    pub airmax: AirMaxInfo,
    pub stats: StationStats,
    /// Rate labels, parallel to `signals`.
    #[serde(rename = "raters")]
    pub rates: Vec<String>,
    pub signals: Vec<i64>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AirMaxInfo {
    pub priority: i64,
    pub quality: i64,
    pub beam: i64,
    pub signal: i64,
    pub capacity: i64,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StationStats {
    pub rx_data: i64,
    pub rx_bytes: i64,
    pub rx_pps: i64,
    pub tx_data: i64,
    pub tx_bytes: i64,
    pub tx_pps: i64,
}

/// Throughput in both directions, in bytes per second as `speedtest`
/// reports it (Mbps scaled by 10^6).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpeedTestResult {
    pub rx_rate: f64,
    pub tx_rate: f64,
}

/// List the stations associated with `access_point`.
///
/// The JSON is decoded on a separate thread while `wstalist` runs, so a
/// large listing cannot fill the pipe and stall the command.
pub fn fetch_station_info<S>(
    shell: &S,
    access_point: &str,
) -> Result<Vec<StationInfo>, StatsError>
where
    S: RemoteShell + ?Sized,
{
    let mut stream = shell
        .stream(access_point, &STATION_LIST_COMMAND)
        .map_err(|source| StatsError::Remote {
            context: "wstalist",
            source,
        })?;
    let stdout = stream
        .take_stdout()
        .unwrap_or_else(|| Box::new(io::empty()) as Box<dyn Read + Send>);

    let decoder = thread::spawn(move || {
        serde_json::from_reader::<_, Vec<StationInfo>>(BufReader::new(stdout))
    });

    let exited = stream.wait();
    let decoded = decoder.join().map_err(|_| StatsError::Reader)?;

    exited.map_err(|source| StatsError::Remote {
        context: "wstalist",
        source,
    })?;
    let stations = decoded?;
    debug!(count = stations.len(), "stations listed");
    Ok(stations)
}

/// Pull the RX and TX rates out of `ubntbox speedtest` output.
///
/// The output must contain the `RX: <n> Mbps` / `TX: <n> Mbps` pair exactly
/// once.
pub fn parse_speedtest_output(output: &[u8]) -> Result<SpeedTestResult, StatsError> {
    let fail = || StatsError::Parse(String::from_utf8_lossy(output).into_owned());

    let mut matches = SPEEDTEST_RESULT.captures_iter(output);
    let captures = matches.next().ok_or_else(fail)?;
    if matches.next().is_some() {
        return Err(fail());
    }

    let rate = |index: usize| -> Result<f64, StatsError> {
        let text = std::str::from_utf8(&captures[index]).map_err(|_| fail())?;
        let mbps: f64 = text.parse().map_err(|_| fail())?;
        Ok(mbps * 1000.0 * 1000.0)
    };

    Ok(SpeedTestResult {
        rx_rate: rate(1)?,
        tx_rate: rate(2)?,
    })
}

#[derive(Clone, Copy, Debug)]
pub struct SpeedTestOptions {
    /// Delay between starting the listener and running the client.
    pub server_settle: Duration,
}

impl Default for SpeedTestOptions {
    fn default() -> Self {
        Self {
            server_settle: DEFAULT_SERVER_SETTLE,
        }
    }
}

/// Measure the link between `access_point` and `station`.
///
/// The listener runs on the station and is killed when this returns,
/// whatever the outcome. `station_ip` is the station's address as seen from
/// the access point.
pub fn run_speed_test<S>(
    shell: &S,
    access_point: &str,
    station: &str,
    station_ip: &str,
    options: SpeedTestOptions,
) -> Result<SpeedTestResult, StatsError>
where
    S: RemoteShell + ?Sized,
{
    let _server = shell
        .spawn(station, &SPEED_SERVER_COMMAND)
        .map(ProcessGuard::new)
        .map_err(|source| StatsError::Remote {
            context: "speedsrv",
            source,
        })?;

    // No readiness signal from speedsrv, so give it a moment
    if !options.server_settle.is_zero() {
        thread::sleep(options.server_settle);
    }

    info!("running speed test {access_point} -> {station_ip}");
    let output = shell
        .combined_output(
            access_point,
            &["ubntbox", "speedtest", "-d", "both", "-q", station_ip],
        )
        .map_err(|source| StatsError::Remote {
            context: "speedtest",
            source,
        })?;

    parse_speedtest_output(&output)
}

/// A line protocol field value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FieldValue {
    Float(f64),
    Integer(i64),
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Float(v) => write!(f, "{v:.6}"),
            FieldValue::Integer(v) => write!(f, "{v}"),
        }
    }
}

fn escape_measurement(name: &str) -> String {
    name.replace(',', "\\,").replace(' ', "\\ ")
}

fn escape_tag(value: &str) -> String {
    value
        .replace(',', "\\,")
        .replace('=', "\\=")
        .replace(' ', "\\ ")
}

/// Batch of line protocol records sharing one timestamp.
#[derive(Clone, Debug)]
pub struct LineProtocol {
    timestamp: i64,
    buf: String,
    lines: usize,
}

impl LineProtocol {
    /// `timestamp` is in nanoseconds since the epoch.
    pub fn new(timestamp: i64) -> Self {
        Self {
            timestamp,
            buf: String::new(),
            lines: 0,
        }
    }

    pub fn now() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as i64)
            .unwrap_or_default();
        Self::new(nanos)
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Append `measurement,tag=value,... value=<value> <timestamp>`.
    pub fn push(
        &mut self,
        measurement: &str,
        tags: &[(&str, &str)],
        value: impl Into<FieldValue>,
    ) {
        self.buf.push_str(&escape_measurement(measurement));
        for (key, tag) in tags {
            self.buf.push(',');
            self.buf.push_str(&escape_tag(key));
            self.buf.push('=');
            self.buf.push_str(&escape_tag(tag));
        }
        self.buf.push_str(&format!(" value={} {}\n", value.into(), self.timestamp));
        self.lines += 1;
    }

    /// All radio metrics for one station.
    pub fn push_station(&mut self, access_point: &str, station: &StationInfo) {
        let tags = [("ap", access_point), ("station", station.name.as_str())];

        self.push("TX", &tags, station.tx);
        self.push("RX", &tags, station.rx);
        self.push("Signal", &tags, station.signal);
        self.push("CCQ", &tags, station.ccq);
        self.push("Distance", &tags, station.distance);
        self.push("TxPower", &tags, station.tx_power);
        self.push("NoiseFloor", &tags, station.noise_floor);
        self.push("AirMaxPriority", &tags, station.airmax.priority);
        self.push("AirMaxQuality", &tags, station.airmax.quality);
        self.push("AirMaxBeam", &tags, station.airmax.beam);
        self.push("AirMaxSignal", &tags, station.airmax.signal);
        self.push("AirMaxCapacity", &tags, station.airmax.capacity);

        // Arrays should be the same length; extra entries on either side are dropped
        for (rate, signal) in station.rates.iter().zip(&station.signals) {
            self.push(&format!("Signal{rate}"), &tags, *signal);
        }
    }

    pub fn push_speed_test(
        &mut self,
        access_point: &str,
        station: &str,
        result: &SpeedTestResult,
    ) {
        let tags = [("ap", access_point), ("station", station)];
        self.push("RxSpeedTest", &tags, result.rx_rate);
        self.push("TxSpeedTest", &tags, result.tx_rate);
    }

    pub fn len(&self) -> usize {
        self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines == 0
    }

    pub fn as_str(&self) -> &str {
        &self.buf
    }
}

/// Destination for a batch of line protocol.
pub trait MetricsSink {
    type Error: Into<BoxError>;

    fn write(&self, body: &str) -> Result<(), Self::Error>;
}

/// What one collector run does.
#[derive(Clone, Debug)]
pub struct CollectOptions {
    pub access_point: String,
    pub station: String,
    /// Station address as the access point sees it.
    pub station_ip: String,
    pub collect_stats: bool,
    pub speed_test: bool,
    pub speed: SpeedTestOptions,
}

/// Gather the enabled measurements and write them to `sink` in one batch.
pub fn collect<S, M>(
    shell: &S,
    sink: &M,
    options: &CollectOptions,
) -> Result<LineProtocol, StatsError>
where
    S: RemoteShell + ?Sized,
    M: MetricsSink + ?Sized,
{
    let mut batch = LineProtocol::now();

    if options.collect_stats {
        let stations = fetch_station_info(shell, &options.access_point)?;
        for station in &stations {
            batch.push_station(&options.access_point, station);
        }
    }

    if options.speed_test {
        let result = run_speed_test(
            shell,
            &options.access_point,
            &options.station,
            &options.station_ip,
            options.speed,
        )?;
        batch.push_speed_test(&options.access_point, &options.station, &result);
    }

    info!(records = batch.len(), "writing measurements");
    sink.write(batch.as_str())
        .map_err(|e| StatsError::Sink(e.into()))?;
    Ok(batch)
}
