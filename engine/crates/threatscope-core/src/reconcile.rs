//! Import reconciler: merges a full store snapshot into the running store

use crate::error::{Error, Result};
use crate::factory::generate_record_id;
use crate::host::{HostEntry, Store};
use crate::record::{Fingerprint, VulnerabilityRecord};
use crate::severity::{Severity, Status};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info};

/// Scanner list given to adopted hosts whose snapshot entry names none
pub const SNAPSHOT_SCANNER: &str = "JSON";

/// A record as found in a snapshot. Only `name` is mandatory.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "ip", default)]
    pub host_address: String,
    #[serde(default)]
    pub port: String,
    #[serde(default)]
    pub protocol: String,
    #[serde(default)]
    pub port_state: String,
    #[serde(default)]
    pub service: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub cvss: String,
    #[serde(default)]
    pub cve: String,
    #[serde(default)]
    pub scanner: String,
    #[serde(default)]
    pub solution: String,
    #[serde(default)]
    pub reference: String,
    #[serde(default)]
    pub status: Option<Status>,
    #[serde(default)]
    pub evidence: Vec<String>,
}

impl SnapshotRecord {
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::new(&self.name, &self.port, &self.protocol)
    }

    /// Identifier, if the snapshot carried a usable one
    pub fn known_id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }

    pub fn status(&self) -> Status {
        self.status.unwrap_or_default()
    }

    fn into_record(self) -> VulnerabilityRecord {
        let id = match self.id {
            Some(id) if !id.is_empty() => id,
            _ => generate_record_id(),
        };
        VulnerabilityRecord {
            id,
            host_address: self.host_address,
            port: self.port,
            protocol: self.protocol,
            port_state: self.port_state,
            service: self.service,
            name: self.name,
            description: self.description,
            severity: self.severity,
            cvss: self.cvss,
            cve: self.cve,
            scanner: self.scanner,
            solution: self.solution,
            reference: self.reference,
            status: self.status.unwrap_or_default(),
            evidence: self.evidence,
        }
    }
}

/// A host as found in a snapshot
#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotHost {
    #[serde(default)]
    pub organization: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub scanner: Option<String>,
    #[serde(rename = "scanDate", default)]
    pub scan_date: String,
    #[serde(default)]
    pub vulns: Vec<SnapshotRecord>,
}

/// A validated, store-shaped snapshot (e.g. a previous export).
///
/// All structural validation happens in [`Snapshot::from_json`] /
/// [`Snapshot::from_value`]; reconciling a `Snapshot` cannot fail, so a bad
/// snapshot never leaves the store half-merged.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    hosts: BTreeMap<String, SnapshotHost>,
}

impl Snapshot {
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| Error::InvalidSnapshot(format!("not valid JSON: {e}")))?;
        Self::from_value(value)
    }

    /// Accepts the bare store object or one wrapped as `{"ips": {...}}`
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(mut root) = value else {
            return Err(Error::InvalidSnapshot(
                "top level must be an object keyed by host address".into(),
            ));
        };

        let wrapped = matches!(
            root.get("ips"),
            Some(Value::Object(inner)) if !inner.contains_key("vulns")
        );
        if wrapped {
            if let Some(Value::Object(inner)) = root.remove("ips") {
                root = inner;
            }
        }

        let mut hosts = BTreeMap::new();
        for (address, entry) in root {
            if address.trim().is_empty() {
                return Err(Error::InvalidSnapshot("empty host address".into()));
            }
            let host: SnapshotHost = serde_json::from_value(entry)
                .map_err(|e| Error::InvalidSnapshot(format!("host {address}: {e}")))?;
            hosts.insert(address, host);
        }

        Ok(Self { hosts })
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

/// Counters describing one reconciliation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportOutcome {
    pub hosts_created: usize,
    pub hosts_updated: usize,
    pub records_added: usize,
    pub records_matched: usize,
    pub statuses_updated: usize,
    pub scanners_added: usize,
}

impl Store {
    /// Parse and reconcile a snapshot in one step. Invalid snapshots fail
    /// before the store is touched.
    pub fn import_json(&mut self, json: &str) -> Result<ImportOutcome> {
        let snapshot = Snapshot::from_json(json)?;
        Ok(self.import_snapshot(snapshot))
    }

    /// Reconcile a snapshot into the store.
    ///
    /// Incoming records match existing ones by id first, then by
    /// fingerprint. A matched record only takes the incoming status when that
    /// status is not `pending`, so imports never regress local progress.
    /// Unmatched records are appended. Unknown hosts are adopted whole,
    /// deduplicated by fingerprint.
    pub fn import_snapshot(&mut self, snapshot: Snapshot) -> ImportOutcome {
        let mut outcome = ImportOutcome::default();

        for (address, incoming) in snapshot.hosts {
            match self.host_mut(&address) {
                Ok(host) => {
                    reconcile_host(host, incoming, &mut outcome);
                    outcome.hosts_updated += 1;
                }
                Err(_) => {
                    let host = adopt_host(&address, incoming, &mut outcome);
                    self.insert_host(host);
                    outcome.hosts_created += 1;
                }
            }
        }

        info!(
            created = outcome.hosts_created,
            updated = outcome.hosts_updated,
            added = outcome.records_added,
            statuses = outcome.statuses_updated,
            "Snapshot imported"
        );
        outcome
    }
}

fn reconcile_host(host: &mut HostEntry, incoming: SnapshotHost, outcome: &mut ImportOutcome) {
    let mut ids = host.record_ids();
    let mut keys = host.fingerprints();

    for record in incoming.vulns {
        let key = record.fingerprint();
        let id_known = record.known_id().is_some_and(|id| ids.contains(id));

        if !id_known && !keys.contains(&key) {
            let record = record.into_record();
            ids.insert(record.id.clone());
            keys.insert(key);
            host.records.push(record);
            outcome.records_added += 1;
            continue;
        }

        outcome.records_matched += 1;
        let status = record.status();
        if status.is_pending() {
            continue;
        }

        let by_id = record
            .known_id()
            .and_then(|id| host.records.iter().position(|r| r.id == id));
        let position = by_id.or_else(|| host.records.iter().position(|r| r.fingerprint() == key));

        if let Some(existing) = position.map(|i| &mut host.records[i]) {
            if existing.status != status {
                debug!(
                    record = %existing.id,
                    from = %existing.status,
                    to = %status,
                    "Status taken from snapshot"
                );
                existing.status = status;
                outcome.statuses_updated += 1;
            }
        }
    }

    for scanner in incoming
        .scanner
        .as_deref()
        .unwrap_or_default()
        .split(',')
    {
        if host.add_scanner(scanner) {
            outcome.scanners_added += 1;
        }
    }
}

fn adopt_host(address: &str, incoming: SnapshotHost, outcome: &mut ImportOutcome) -> HostEntry {
    let scanner = incoming
        .scanner
        .unwrap_or_else(|| SNAPSHOT_SCANNER.to_string());
    let mut host = HostEntry::new(address, scanner, incoming.scan_date);
    host.organization = incoming.organization;
    host.description = incoming.description;

    let mut keys = HashSet::new();
    let mut ids = HashSet::new();
    for record in incoming.vulns {
        if !keys.insert(record.fingerprint()) {
            continue;
        }
        let mut record = record.into_record();
        if !ids.insert(record.id.clone()) {
            record.id = generate_record_id();
            ids.insert(record.id.clone());
        }
        host.records.push(record);
        outcome.records_added += 1;
    }
    host
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::{RawFinding, RecordFactory};
    use crate::merge::ScanBatch;

    fn populated_store() -> Store {
        let mut store = Store::new();
        let records = vec![
            RecordFactory::build(RawFinding {
                host_address: "10.0.0.1".into(),
                port: "22".into(),
                protocol: "tcp".into(),
                name: "ssh-hostkey".into(),
                severity: Severity::Info,
                scanner: "nmap".into(),
                ..Default::default()
            }),
            RecordFactory::build(RawFinding {
                host_address: "10.0.0.1".into(),
                port: "443".into(),
                protocol: "tcp".into(),
                name: "ssl-heartbleed".into(),
                severity: Severity::High,
                cve: "CVE-2014-0160".into(),
                scanner: "nmap".into(),
                ..Default::default()
            }),
        ];
        store.merge_scan(ScanBatch::new(
            Some("10.0.0.1".into()),
            "01/01/2024, 10:00:00",
            "Nmap",
            records,
        ));
        store.set_host_details("10.0.0.1", "Acme", "dmz").unwrap();
        store
    }

    #[test]
    fn test_round_trip_into_empty_store() {
        let store = populated_store();
        let json = store.to_json_pretty().unwrap();

        let mut fresh = Store::new();
        fresh.import_json(&json).unwrap();
        assert_eq!(fresh, store);
    }

    #[test]
    fn test_round_trip_into_same_store_is_noop() {
        let mut store = populated_store();
        let before = store.clone();
        let outcome = store.import_json(&before.to_json().unwrap()).unwrap();

        assert_eq!(outcome.records_added, 0);
        assert_eq!(outcome.records_matched, 2);
        assert_eq!(store, before);
    }

    #[test]
    fn test_non_pending_status_overwrites() {
        let mut store = populated_store();
        let id = store.get("10.0.0.1").unwrap().records()[1].id.clone();
        let json = format!(
            r#"{{"10.0.0.1": {{"scanner": "Nessus", "vulns": [
                {{"id": "{id}", "name": "ssl-heartbleed", "port": "443", "protocol": "tcp", "status": "exploited"}}
            ]}}}}"#
        );
        let outcome = store.import_json(&json).unwrap();

        assert_eq!(outcome.statuses_updated, 1);
        assert_eq!(outcome.scanners_added, 1);
        let host = store.get("10.0.0.1").unwrap();
        assert_eq!(host.record(&id).unwrap().status, Status::Exploited);
        assert_eq!(host.scanner_list, "Nmap, Nessus");
    }

    #[test]
    fn test_pending_never_regresses() {
        let mut store = populated_store();
        let id = store.get("10.0.0.1").unwrap().records()[0].id.clone();
        store.set_status("10.0.0.1", &id, Status::Exploited).unwrap();

        let json = format!(
            r#"{{"10.0.0.1": {{"vulns": [
                {{"id": "{id}", "name": "ssh-hostkey", "port": "22", "protocol": "tcp", "status": "pending"}},
                {{"name": "SSH-HOSTKEY", "port": "22", "protocol": "tcp"}}
            ]}}}}"#
        );
        store.import_json(&json).unwrap();

        let record = store.get("10.0.0.1").unwrap().record(&id).unwrap().clone();
        assert_eq!(record.status, Status::Exploited);
        assert_eq!(store.get("10.0.0.1").unwrap().records().len(), 2);
    }

    #[test]
    fn test_fingerprint_match_without_id() {
        let mut store = populated_store();
        let json = r#"{"ips": {"10.0.0.1": {"vulns": [
            {"name": "SSL-Heartbleed", "port": "443", "protocol": "tcp", "status": "patched"},
            {"name": "smb-vuln-ms17-010", "port": "445", "protocol": "tcp", "severity": "critical"}
        ]}}}"#;
        let outcome = store.import_json(json).unwrap();

        assert_eq!(outcome.records_added, 1);
        assert_eq!(outcome.statuses_updated, 1);
        let host = store.get("10.0.0.1").unwrap();
        assert_eq!(host.records().len(), 3);
        assert_eq!(host.records()[1].status, Status::Patched);
        let added = &host.records()[2];
        assert!(!added.id.is_empty());
        assert_eq!(added.severity, Severity::Critical);
        assert_eq!(added.status, Status::Pending);
    }

    #[test]
    fn test_adopted_host_dedup_and_defaults() {
        let mut store = Store::new();
        let json = r#"{"172.16.0.9": {"organization": "Globex", "vulns": [
            {"id": "aaa", "name": "Weak TLS", "port": "443", "protocol": "tcp"},
            {"id": "bbb", "name": "weak tls", "port": "443", "protocol": "tcp"},
            {"id": "aaa", "name": "Open SMB", "port": "445", "protocol": "tcp", "evidence": ["e1"]}
        ]}}"#;
        let outcome = store.import_json(json).unwrap();

        assert_eq!(outcome.hosts_created, 1);
        assert_eq!(outcome.records_added, 2);
        let host = store.get("172.16.0.9").unwrap();
        assert_eq!(host.scanner_list, SNAPSHOT_SCANNER);
        assert_eq!(host.organization, "Globex");
        assert_eq!(host.records()[0].id, "aaa");
        assert_ne!(host.records()[1].id, "aaa");
        assert_eq!(host.records()[1].evidence, vec!["e1".to_string()]);
    }

    #[test]
    fn test_invalid_snapshot_is_atomic() {
        let mut store = populated_store();
        let before = store.clone();

        // First host is fine, second is structurally broken
        let json = r#"{
            "10.0.0.1": {"vulns": [{"name": "new finding", "port": "8080", "protocol": "tcp"}]},
            "10.0.0.2": {"vulns": "not a list"}
        }"#;
        assert!(matches!(
            store.import_json(json),
            Err(Error::InvalidSnapshot(_))
        ));
        assert_eq!(store, before);

        assert!(store.import_json("[1, 2, 3]").is_err());
        assert!(store.import_json("{not json").is_err());
        assert!(store
            .import_json(r#"{"10.0.0.1": {"vulns": [{"port": "1"}]}}"#)
            .is_err());
        assert!(store
            .import_json(r#"{"10.0.0.1": {"vulns": [{"name": "x", "severity": "urgent"}]}}"#)
            .is_err());
        assert_eq!(store, before);
    }
}
