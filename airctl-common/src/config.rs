// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Flat `key=value` device configuration.
//!
//! The device keeps its settings in `/tmp/system.cfg`, one `key=value` pair
//! per line. There is no nesting, quoting or escaping; the value is whatever
//! follows the first `=`. Blank lines are ignored.
//!
//! Keys are ASCII in practice and must be UTF-8. Values are kept as raw
//! bytes, so a Latin-1 SSID survives a read-merge-write cycle unchanged.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("line {line}: key is not valid UTF-8")]
    KeyNotUtf8 { line: usize },

    #[error("line {line}: expected key=value, got {text:?}")]
    MissingSeparator { line: usize, text: String },
}

/// A complete device configuration snapshot.
///
/// Equality is map equality: same key set, same values. Formatting emits
/// entries in key order, but nothing should depend on that.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeviceConfig {
    entries: BTreeMap<String, Vec<u8>>,
}

impl DeviceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the on-device file format.
    pub fn parse(buf: &[u8]) -> Result<Self, ConfigError> {
        let mut entries = BTreeMap::new();

        for (index, line) in buf.split(|&b| b == b'\n').enumerate() {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            let number = index + 1;
            let separator = line.iter().position(|&b| b == b'=').ok_or_else(|| {
                ConfigError::MissingSeparator {
                    line: number,
                    text: String::from_utf8_lossy(line).into_owned(),
                }
            })?;
            let key = std::str::from_utf8(&line[..separator])
                .map_err(|_| ConfigError::KeyNotUtf8 { line: number })?;
            entries.insert(key.to_string(), line[separator + 1..].to_vec());
        }

        Ok(Self { entries })
    }

    /// Render as the on-device file format, one `key=value\n` per entry.
    ///
    /// Values are written verbatim; a value containing a newline produces a
    /// file that will not parse back to the same map.
    pub fn format(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for (key, value) in self.iter() {
            out.extend_from_slice(key.as_bytes());
            out.push(b'=');
            out.extend_from_slice(value);
            out.push(b'\n');
        }
        out
    }

    /// Value of `key` as text. `None` when unset or not UTF-8; see
    /// [`get_bytes`](Self::get_bytes) for the raw value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.get_bytes(key)
            .and_then(|value| std::str::from_utf8(value).ok())
    }

    pub fn get_bytes(&self, key: &str) -> Option<&[u8]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    /// Set a key, returning the previous value if there was one.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> Option<Vec<u8>> {
        self.entries.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Vec<u8>> {
        self.entries.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.entries
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Apply `overrides` on top of this configuration.
    ///
    /// Every key in `overrides` takes the override value, keys it does not
    /// mention keep their current value, and keys missing here are created.
    pub fn merge(&self, overrides: &DeviceConfig) -> DeviceConfig {
        let mut merged = self.clone();
        for (key, value) in overrides.iter() {
            merged.set(key, value);
        }
        merged
    }

    /// List every key on which `actual` differs from `self`.
    ///
    /// Keys present on only one side are reported with `None` on the other.
    /// An empty result means the two configurations are equal. Values are
    /// compared as bytes and reported as (lossy) text.
    pub fn diff(&self, actual: &DeviceConfig) -> Vec<ConfigChange> {
        let mut changes = Vec::new();

        for (key, expected) in self.iter() {
            let found = actual.get_bytes(key);
            if found != Some(expected) {
                changes.push(ConfigChange {
                    key: key.to_string(),
                    expected: Some(lossy(expected)),
                    actual: found.map(lossy),
                });
            }
        }
        for (key, value) in actual.iter() {
            if !self.contains_key(key) {
                changes.push(ConfigChange {
                    key: key.to_string(),
                    expected: None,
                    actual: Some(lossy(value)),
                });
            }
        }

        changes.sort_by(|a, b| a.key.cmp(&b.key));
        changes
    }
}

fn lossy(value: &[u8]) -> String {
    String::from_utf8_lossy(value).into_owned()
}

impl<K: Into<String>, V: Into<Vec<u8>>> FromIterator<(K, V)> for DeviceConfig {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// One key on which two configurations disagree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfigChange {
    pub key: String,
    pub expected: Option<String>,
    pub actual: Option<String>,
}

impl fmt::Display for ConfigChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |v: &Option<String>| v.clone().unwrap_or_else(|| "<unset>".to_string());
        write!(
            f,
            "{} is {} expected {}",
            self.key,
            show(&self.actual),
            show(&self.expected)
        )
    }
}
