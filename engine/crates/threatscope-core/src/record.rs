//! Vulnerability records - one detected finding on one host

use crate::severity::{Severity, Status};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum description length in characters
pub const DESCRIPTION_LIMIT: usize = 800;
/// Maximum solution length in characters
pub const SOLUTION_LIMIT: usize = 400;
/// Maximum reference length in characters
pub const REFERENCE_LIMIT: usize = 200;

/// A vulnerability finding attached to a host.
///
/// Serialized field names (`ip`, `portState`, `cvss`, `cve`, `evidence`, ...)
/// are the persisted store format consumed by the dashboard and report layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VulnerabilityRecord {
    /// Opaque identifier, unique within the owning host
    pub id: String,

    /// Address the finding was reported against
    #[serde(rename = "ip", default)]
    pub host_address: String,

    /// Port number, or `host` / `general` for non-port findings
    #[serde(default)]
    pub port: String,
    #[serde(default)]
    pub protocol: String,
    #[serde(default)]
    pub port_state: String,

    /// Service descriptor (name, product, version)
    #[serde(default)]
    pub service: String,

    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub severity: Severity,

    /// Score, optionally followed by the vector in parentheses
    #[serde(default)]
    pub cvss: String,

    /// Comma-joined CVE identifiers
    #[serde(default)]
    pub cve: String,

    /// Tag of the dialect that produced the record
    #[serde(default)]
    pub scanner: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub solution: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reference: String,

    #[serde(default)]
    pub status: Status,

    /// Opaque evidence references, in attachment order
    #[serde(default)]
    pub evidence: Vec<String>,
}

impl VulnerabilityRecord {
    /// Deduplication key for "same finding"
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::new(&self.name, &self.port, &self.protocol)
    }

    /// CVE identifiers as a list
    pub fn cve_ids(&self) -> Vec<&str> {
        self.cve
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .collect()
    }
}

/// Coarse `(name, port, protocol)` identity of a finding.
///
/// Formed as `lower(name) | port | protocol`; rescans of the same target
/// produce the same fingerprint even when descriptions change.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn new(name: &str, port: &str, protocol: &str) -> Self {
        Self(format!("{}|{}|{}", name.to_lowercase(), port, protocol))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Truncate to at most `limit` characters without splitting a code point
pub fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
