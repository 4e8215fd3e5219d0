//! Record factory: turns extracted field sets into lifecycle-ready records

use crate::record::{
    truncate_chars, VulnerabilityRecord, DESCRIPTION_LIMIT, REFERENCE_LIMIT, SOLUTION_LIMIT,
};
use crate::severity::{Severity, Status};
use uuid::Uuid;

/// Length of generated record identifiers (lowercase hex characters).
///
/// 12 hex characters carry 48 random bits. For a host holding `n` records the
/// birthday bound puts the collision probability near `n^2 / 2^49`: about
/// 1.8e-7 at 10 000 records, 1.8e-5 at 100 000. Session-scale stores stay far
/// below that.
pub const RECORD_ID_LEN: usize = 12;

/// Generate a fresh record identifier.
///
/// Context free: no counter or global sequence, only random bits from a v4 UUID.
pub fn generate_record_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(RECORD_ID_LEN);
    id
}

/// Field set produced by an extractor, before identity and lifecycle fields
/// are assigned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawFinding {
    pub host_address: String,
    pub port: String,
    pub protocol: String,
    pub port_state: String,
    pub service: String,
    pub name: String,
    pub description: String,
    pub severity: Severity,
    pub cvss: String,
    pub cve: String,
    pub scanner: String,
    pub solution: String,
    pub reference: String,
}

/// Wraps raw findings into [`VulnerabilityRecord`]s
pub struct RecordFactory;

impl RecordFactory {
    /// Assign a fresh id, `pending` status and an empty evidence list.
    ///
    /// Text fields are capped at their length limits. Two calls with the same
    /// input differ only in `id`.
    pub fn build(raw: RawFinding) -> VulnerabilityRecord {
        VulnerabilityRecord {
            id: generate_record_id(),
            host_address: raw.host_address,
            port: raw.port,
            protocol: raw.protocol,
            port_state: raw.port_state,
            service: raw.service,
            name: raw.name,
            description: truncate_chars(&raw.description, DESCRIPTION_LIMIT),
            severity: raw.severity,
            cvss: raw.cvss,
            cve: raw.cve,
            scanner: raw.scanner,
            solution: truncate_chars(&raw.solution, SOLUTION_LIMIT),
            reference: truncate_chars(&raw.reference, REFERENCE_LIMIT),
            status: Status::Pending,
            evidence: Vec::new(),
        }
    }

    pub fn build_all(raws: Vec<RawFinding>) -> Vec<VulnerabilityRecord> {
        raws.into_iter().map(Self::build).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn raw() -> RawFinding {
        RawFinding {
            host_address: "192.168.1.10".into(),
            port: "443".into(),
            protocol: "tcp".into(),
            name: "TLS 1.0 Enabled".into(),
            description: "x".repeat(2000),
            solution: "y".repeat(1000),
            reference: "z".repeat(500),
            severity: Severity::Medium,
            scanner: "nessus".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_build_sets_lifecycle_defaults() {
        let record = RecordFactory::build(raw());
        assert_eq!(record.status, Status::Pending);
        assert!(record.evidence.is_empty());
        assert_eq!(record.id.len(), RECORD_ID_LEN);
        assert_eq!(record.description.chars().count(), DESCRIPTION_LIMIT);
        assert_eq!(record.solution.chars().count(), SOLUTION_LIMIT);
        assert_eq!(record.reference.chars().count(), REFERENCE_LIMIT);
    }

    #[test]
    fn test_build_only_id_differs() {
        let mut a = RecordFactory::build(raw());
        let b = RecordFactory::build(raw());
        assert_ne!(a.id, b.id);
        a.id = b.id.clone();
        assert_eq!(a, b);
    }

    #[test]
    fn test_record_id_collision_budget() {
        // 20 000 ids: expected collision probability ~7e-7
        let ids: HashSet<String> = (0..20_000).map(|_| generate_record_id()).collect();
        assert_eq!(ids.len(), 20_000);
        assert!(ids
            .iter()
            .all(|id| id.chars().all(|c| c.is_ascii_hexdigit())));
    }
}
