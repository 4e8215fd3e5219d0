//! Host entries and the per-host store

use crate::error::{Error, Result};
use crate::record::{Fingerprint, VulnerabilityRecord};
use crate::severity::Status;
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Scanner list value for hosts created by hand
pub const MANUAL_SCANNER: &str = "Manual";

/// One scanned target and its findings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostEntry {
    /// Store key
    #[serde(rename = "ip")]
    pub address: String,

    #[serde(default)]
    pub organization: String,

    /// Free-form operator notes
    #[serde(default)]
    pub description: String,

    /// Comma-joined, deduplicated names of every contributing scanner
    #[serde(rename = "scanner", default)]
    pub scanner_list: String,

    /// Display timestamp of the most recent scan
    #[serde(rename = "scanDate", default)]
    pub last_scan: String,

    #[serde(rename = "vulns", default)]
    pub(crate) records: Vec<VulnerabilityRecord>,
}

impl HostEntry {
    pub fn new(
        address: impl Into<String>,
        scanner_list: impl Into<String>,
        last_scan: impl Into<String>,
    ) -> Self {
        Self {
            address: address.into(),
            organization: String::new(),
            description: String::new(),
            scanner_list: scanner_list.into(),
            last_scan: last_scan.into(),
            records: Vec::new(),
        }
    }

    pub fn records(&self) -> &[VulnerabilityRecord] {
        &self.records
    }

    pub fn record(&self, id: &str) -> Option<&VulnerabilityRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub(crate) fn record_mut(&mut self, id: &str) -> Result<&mut VulnerabilityRecord> {
        let address = &self.address;
        self.records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| Error::RecordNotFound {
                address: address.clone(),
                record_id: id.to_string(),
            })
    }

    pub fn fingerprints(&self) -> HashSet<Fingerprint> {
        self.records.iter().map(VulnerabilityRecord::fingerprint).collect()
    }

    pub fn record_ids(&self) -> HashSet<String> {
        self.records.iter().map(|r| r.id.clone()).collect()
    }

    /// Individual scanner names from the display list
    pub fn scanners(&self) -> Vec<&str> {
        self.scanner_list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Append a scanner name if absent. Existing entries keep their order.
    pub fn add_scanner(&mut self, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() || self.scanners().contains(&name) {
            return false;
        }
        if self.scanner_list.trim().is_empty() {
            self.scanner_list = name.to_string();
        } else {
            self.scanner_list.push_str(", ");
            self.scanner_list.push_str(name);
        }
        true
    }
}

/// Mapping from host address to [`HostEntry`]; the unit of persistence.
///
/// Record lists are only ever extended by [`Store::merge_scan`] and
/// [`Store::import_snapshot`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Store {
    hosts: BTreeMap<String, HostEntry>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    pub fn contains(&self, address: &str) -> bool {
        self.hosts.contains_key(address)
    }

    pub fn get(&self, address: &str) -> Option<&HostEntry> {
        self.hosts.get(address)
    }

    pub fn hosts(&self) -> impl Iterator<Item = &HostEntry> {
        self.hosts.values()
    }

    pub fn addresses(&self) -> impl Iterator<Item = &str> {
        self.hosts.keys().map(String::as_str)
    }

    /// Total records across all hosts
    pub fn record_count(&self) -> usize {
        self.hosts.values().map(|h| h.records.len()).sum()
    }

    /// Distinct non-empty organizations, sorted
    pub fn organizations(&self) -> Vec<&str> {
        let mut orgs: Vec<&str> = self
            .hosts
            .values()
            .map(|h| h.organization.as_str())
            .filter(|o| !o.is_empty())
            .collect();
        orgs.sort_unstable();
        orgs.dedup();
        orgs
    }

    pub(crate) fn host_mut(&mut self, address: &str) -> Result<&mut HostEntry> {
        self.hosts.get_mut(address).ok_or_else(|| Error::HostNotFound {
            address: address.to_string(),
        })
    }

    pub(crate) fn insert_host(&mut self, host: HostEntry) {
        self.hosts.insert(host.address.clone(), host);
    }

    /// Register a host by hand
    pub fn add_host(
        &mut self,
        address: &str,
        organization: &str,
        description: &str,
    ) -> Result<&HostEntry> {
        let address = address.trim();
        if address.is_empty() {
            return Err(Error::Other("host address must not be empty".into()));
        }
        if self.contains(address) {
            return Err(Error::HostExists {
                address: address.to_string(),
            });
        }

        let mut host = HostEntry::new(
            address,
            MANUAL_SCANNER,
            Local::now().format("%d/%m/%Y, %H:%M:%S").to_string(),
        );
        host.organization = organization.trim().to_string();
        host.description = description.trim().to_string();

        info!(address, "Added host manually");
        self.insert_host(host);
        Ok(&self.hosts[address])
    }

    /// Drop a host and all of its records
    pub fn remove_host(&mut self, address: &str) -> Result<HostEntry> {
        let host = self.hosts.remove(address).ok_or_else(|| Error::HostNotFound {
            address: address.to_string(),
        })?;
        info!(address, records = host.records.len(), "Removed host");
        Ok(host)
    }

    pub fn set_host_details(
        &mut self,
        address: &str,
        organization: &str,
        description: &str,
    ) -> Result<()> {
        let host = self.host_mut(address)?;
        host.organization = organization.trim().to_string();
        host.description = description.trim().to_string();
        Ok(())
    }

    /// Record a user decision about a finding
    pub fn set_status(&mut self, address: &str, record_id: &str, status: Status) -> Result<Status> {
        let record = self.host_mut(address)?.record_mut(record_id)?;
        let previous = std::mem::replace(&mut record.status, status);
        debug!(address, record_id, %previous, %status, "Status changed");
        Ok(previous)
    }

    /// Append an opaque evidence reference to a record
    pub fn attach_evidence(
        &mut self,
        address: &str,
        record_id: &str,
        reference: impl Into<String>,
    ) -> Result<usize> {
        let record = self.host_mut(address)?.record_mut(record_id)?;
        record.evidence.push(reference.into());
        Ok(record.evidence.len())
    }

    /// Remove an evidence reference by position, returning it so the caller
    /// can release the underlying bytes
    pub fn detach_evidence(
        &mut self,
        address: &str,
        record_id: &str,
        index: usize,
    ) -> Result<String> {
        let record = self.host_mut(address)?.record_mut(record_id)?;
        if index >= record.evidence.len() {
            return Err(Error::EvidenceNotFound {
                record_id: record_id.to_string(),
                index,
            });
        }
        Ok(record.evidence.remove(index))
    }

    /// Single-host store, for per-host export
    pub fn export_host(&self, address: &str) -> Result<Store> {
        let host = self.get(address).ok_or_else(|| Error::HostNotFound {
            address: address.to_string(),
        })?;
        let mut subset = Store::new();
        subset.insert_host(host.clone());
        Ok(subset)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load a persisted store, rejecting duplicate record ids within a host
    pub fn from_json(json: &str) -> Result<Self> {
        let store: Store = serde_json::from_str(json)?;
        store.validate()?;
        Ok(store)
    }

    /// Load a store file; a missing file is an empty store
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No store file, starting empty");
            return Ok(Store::new());
        }
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Write the store, replacing the previous file only once the new
    /// contents are fully written
    pub fn save(&self, path: &Path, pretty: bool) -> Result<()> {
        let json = if pretty {
            self.to_json_pretty()?
        } else {
            self.to_json()?
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, json)?;
        fs::rename(&staging, path)?;
        debug!(path = %path.display(), hosts = self.len(), "Saved store");
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        for (key, host) in &self.hosts {
            if host.address != *key {
                return Err(Error::InvalidSnapshot(format!(
                    "host key {key} does not match ip {}",
                    host.address
                )));
            }
            let mut seen = HashSet::new();
            for record in &host.records {
                if !seen.insert(record.id.as_str()) {
                    return Err(Error::InvalidSnapshot(format!(
                        "duplicate record id {} on host {key}",
                        record.id
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::{RawFinding, RecordFactory};

    fn store_with_record() -> (Store, String) {
        let mut store = Store::new();
        store.add_host("10.0.0.5", "Acme", "edge router").unwrap();
        let record = RecordFactory::build(RawFinding {
            host_address: "10.0.0.5".into(),
            port: "22".into(),
            protocol: "tcp".into(),
            name: "ssh-hostkey".into(),
            ..Default::default()
        });
        let id = record.id.clone();
        store.host_mut("10.0.0.5").unwrap().records.push(record);
        (store, id)
    }

    #[test]
    fn test_add_scanner_dedup() {
        let mut host = HostEntry::new("10.0.0.1", "Nmap", "");
        assert!(host.add_scanner("OWASP ZAP"));
        assert!(!host.add_scanner("Nmap"));
        assert!(!host.add_scanner(" OWASP ZAP "));
        assert_eq!(host.scanner_list, "Nmap, OWASP ZAP");
        assert_eq!(host.scanners(), vec!["Nmap", "OWASP ZAP"]);
    }

    #[test]
    fn test_add_host_rejects_duplicate() {
        let mut store = Store::new();
        store.add_host("10.0.0.1", "", "").unwrap();
        assert_eq!(store.get("10.0.0.1").unwrap().scanner_list, MANUAL_SCANNER);
        assert!(matches!(
            store.add_host("10.0.0.1", "", ""),
            Err(Error::HostExists { .. })
        ));
        assert!(store.add_host("  ", "", "").is_err());
    }

    #[test]
    fn test_set_status_and_evidence() {
        let (mut store, id) = store_with_record();
        let previous = store.set_status("10.0.0.5", &id, Status::Exploited).unwrap();
        assert_eq!(previous, Status::Pending);

        assert_eq!(store.attach_evidence("10.0.0.5", &id, "shot-1.png").unwrap(), 1);
        assert_eq!(store.attach_evidence("10.0.0.5", &id, "shot-2.png").unwrap(), 2);
        assert_eq!(store.detach_evidence("10.0.0.5", &id, 0).unwrap(), "shot-1.png");
        assert!(store.detach_evidence("10.0.0.5", &id, 5).is_err());

        let record = store.get("10.0.0.5").unwrap().record(&id).unwrap();
        assert_eq!(record.status, Status::Exploited);
        assert_eq!(record.evidence, vec!["shot-2.png".to_string()]);

        assert!(matches!(
            store.set_status("10.0.0.5", "missing", Status::Patched),
            Err(Error::RecordNotFound { .. })
        ));
        assert!(matches!(
            store.set_status("10.9.9.9", &id, Status::Patched),
            Err(Error::HostNotFound { .. })
        ));
    }

    #[test]
    fn test_json_round_trip() {
        let (store, _) = store_with_record();
        let json = store.to_json_pretty().unwrap();
        let back = Store::from_json(&json).unwrap();
        assert_eq!(store, back);

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["10.0.0.5"]["organization"], "Acme");
        assert_eq!(value["10.0.0.5"]["scanner"], "Manual");
        assert!(value["10.0.0.5"]["vulns"].is_array());
    }

    #[test]
    fn test_from_json_rejects_duplicate_ids() {
        let json = r#"{"10.0.0.1": {"ip": "10.0.0.1", "vulns": [
            {"id": "a", "name": "one"}, {"id": "a", "name": "two"}
        ]}}"#;
        assert!(matches!(
            Store::from_json(json),
            Err(Error::InvalidSnapshot(_))
        ));
    }

    #[test]
    fn test_from_json_rejects_key_ip_mismatch() {
        let json = r#"{"10.0.0.1": {"ip": "10.0.0.2", "vulns": []}}"#;
        assert!(matches!(
            Store::from_json(json),
            Err(Error::InvalidSnapshot(_))
        ));
    }

    #[test]
    fn test_export_host_and_organizations() {
        let (mut store, _) = store_with_record();
        store.add_host("10.0.0.6", "Acme", "").unwrap();
        store.add_host("10.0.0.7", "Globex", "").unwrap();
        assert_eq!(store.organizations(), vec!["Acme", "Globex"]);

        let subset = store.export_host("10.0.0.5").unwrap();
        assert_eq!(subset.len(), 1);
        assert_eq!(subset.record_count(), 1);
        assert!(store.export_host("1.1.1.1").is_err());

        store.remove_host("10.0.0.6").unwrap();
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");
        assert!(Store::load(&path).unwrap().is_empty());

        let (store, _) = store_with_record();
        store.save(&path, true).unwrap();
        assert_eq!(Store::load(&path).unwrap(), store);
        assert!(!path.with_extension("json.tmp").exists());
    }
}
