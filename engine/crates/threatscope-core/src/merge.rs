//! Host merge engine: folds a freshly extracted record batch into the store

use crate::host::{HostEntry, Store};
use crate::record::{Fingerprint, VulnerabilityRecord};
use chrono::Utc;
use std::collections::HashSet;
use tracing::{debug, info};

/// Host hint extractors emit when no address could be resolved
pub const UNKNOWN_HOST: &str = "unknown";

/// Records produced by one extractor invocation, ready to merge
#[derive(Debug, Clone)]
pub struct ScanBatch {
    /// Address the batch belongs to; `None`, empty or `unknown` is unresolved
    pub host_address: Option<String>,
    /// Display timestamp of the scan
    pub scan_timestamp: String,
    /// Scanner display name (`Nmap`, `OWASP ZAP`, ...)
    pub scanner: String,
    pub records: Vec<VulnerabilityRecord>,
}

impl ScanBatch {
    pub fn new(
        host_address: Option<String>,
        scan_timestamp: impl Into<String>,
        scanner: impl Into<String>,
        records: Vec<VulnerabilityRecord>,
    ) -> Self {
        Self {
            host_address,
            scan_timestamp: scan_timestamp.into(),
            scanner: scanner.into(),
            records,
        }
    }

    /// The host address, unless it is missing or the `unknown` placeholder
    pub fn resolved_address(&self) -> Option<&str> {
        self.host_address
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty() && !a.eq_ignore_ascii_case(UNKNOWN_HOST))
    }
}

/// What a merge did to the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Key of the host the batch landed on
    pub host_key: String,
    /// A new host entry was created
    pub created: bool,
    /// The key is a synthetic placeholder
    pub synthetic: bool,
    /// Records appended
    pub added: usize,
    /// Records dropped as fingerprint duplicates
    pub discarded: usize,
}

/// Keep the first record of each fingerprint. `seen` may be pre-seeded with
/// fingerprints already on record.
fn dedup_by_fingerprint(
    records: Vec<VulnerabilityRecord>,
    seen: &mut HashSet<Fingerprint>,
) -> (Vec<VulnerabilityRecord>, usize) {
    let total = records.len();
    let kept: Vec<_> = records
        .into_iter()
        .filter(|r| {
            let fresh = seen.insert(r.fingerprint());
            if !fresh {
                debug!(fingerprint = %r.fingerprint(), "Discarding duplicate finding");
            }
            fresh
        })
        .collect();
    let discarded = total - kept.len();
    (kept, discarded)
}

impl Store {
    /// Merge a fresh scan into the store.
    ///
    /// - unresolved address: a new synthetic host `<scanner>-<millis>` is
    ///   created and never merged into an existing one
    /// - unknown address: a new host holding the batch deduplicated by
    ///   fingerprint, first occurrence wins
    /// - known address: only records with unseen fingerprints are appended;
    ///   an existing record always wins over an incoming duplicate, so user
    ///   status and evidence survive rescans
    ///
    /// New hosts, synthetic or not, hold fingerprint-unique records, the same
    /// rule snapshot import applies when adopting a host. Merging the same
    /// batch twice never grows the host on the second pass.
    pub fn merge_scan(&mut self, batch: ScanBatch) -> MergeOutcome {
        let resolved = batch.resolved_address().map(str::to_string);

        if let Some(address) = &resolved {
            if let Ok(host) = self.host_mut(address) {
                let mut seen = host.fingerprints();
                let (fresh, discarded) = dedup_by_fingerprint(batch.records, &mut seen);
                let added = fresh.len();
                host.records.extend(fresh);
                host.add_scanner(&batch.scanner);
                if !batch.scan_timestamp.is_empty() {
                    host.last_scan = batch.scan_timestamp;
                }

                info!(host = %address, added, discarded, "Merged scan into existing host");
                return MergeOutcome {
                    host_key: address.clone(),
                    created: false,
                    synthetic: false,
                    added,
                    discarded,
                };
            }
        }

        let synthetic = resolved.is_none();
        let key = match resolved {
            Some(address) => address,
            None => self.synthetic_key(&batch.scanner),
        };
        let (unique, discarded) = dedup_by_fingerprint(batch.records, &mut HashSet::new());
        let added = unique.len();
        let mut host = HostEntry::new(key.clone(), batch.scanner, batch.scan_timestamp);
        host.records = unique;
        self.insert_host(host);

        if synthetic {
            info!(
                host = %key,
                added,
                discarded,
                "No host address in document, created synthetic host"
            );
        } else {
            info!(host = %key, added, discarded, "Created host from scan");
        }
        MergeOutcome {
            host_key: key,
            created: true,
            synthetic,
            added,
            discarded,
        }
    }

    /// `<scanner>-<unix millis>`, suffixed if that key is already taken
    fn synthetic_key(&self, scanner: &str) -> String {
        let base = format!("{}-{}", scanner, Utc::now().timestamp_millis());
        if !self.contains(&base) {
            return base;
        }
        (2..)
            .map(|n| format!("{base}-{n}"))
            .find(|candidate| !self.contains(candidate))
            .unwrap_or(base)
    }
}
