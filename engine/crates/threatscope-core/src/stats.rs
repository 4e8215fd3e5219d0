//! Severity and status tallies for hosts and the whole store

use crate::host::{HostEntry, Store};
use crate::record::VulnerabilityRecord;
use crate::severity::{Severity, Status};
use serde::Serialize;

/// Record count per severity tier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeverityCounts {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub info: usize,
}

impl SeverityCounts {
    pub fn add(&mut self, severity: Severity) {
        match severity {
            Severity::Critical => self.critical += 1,
            Severity::High => self.high += 1,
            Severity::Medium => self.medium += 1,
            Severity::Low => self.low += 1,
            Severity::Info => self.info += 1,
        }
    }

    pub fn get(&self, severity: Severity) -> usize {
        match severity {
            Severity::Critical => self.critical,
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
            Severity::Info => self.info,
        }
    }

    pub fn total(&self) -> usize {
        self.critical + self.high + self.medium + self.low + self.info
    }
}

/// Record count per lifecycle status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub exploited: usize,
    pub patched: usize,
    pub false_positive: usize,
}

impl StatusCounts {
    pub fn add(&mut self, status: Status) {
        match status {
            Status::Pending => self.pending += 1,
            Status::Exploited => self.exploited += 1,
            Status::Patched => self.patched += 1,
            Status::FalsePositive => self.false_positive += 1,
        }
    }

    pub fn get(&self, status: Status) -> usize {
        match status {
            Status::Pending => self.pending,
            Status::Exploited => self.exploited,
            Status::Patched => self.patched,
            Status::FalsePositive => self.false_positive,
        }
    }
}

/// Aggregate view over one host or a set of hosts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub hosts: usize,
    pub records: usize,
    pub severity: SeverityCounts,
    pub status: StatusCounts,
}

impl Summary {
    fn add_records<'a>(&mut self, records: impl IntoIterator<Item = &'a VulnerabilityRecord>) {
        for record in records {
            self.records += 1;
            self.severity.add(record.severity);
            self.status.add(record.status);
        }
    }

    pub fn of_host(host: &HostEntry) -> Self {
        let mut summary = Summary {
            hosts: 1,
            ..Default::default()
        };
        summary.add_records(host.records());
        summary
    }

    /// Summary over every host, or only hosts of `organization`
    pub fn of_store(store: &Store, organization: Option<&str>) -> Self {
        let mut summary = Summary::default();
        for host in store
            .hosts()
            .filter(|h| organization.map_or(true, |org| h.organization == org))
        {
            summary.hosts += 1;
            summary.add_records(host.records());
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::{RawFinding, RecordFactory};
    use crate::merge::ScanBatch;

    fn store() -> Store {
        let mut store = Store::new();
        for (address, org, severities) in [
            ("10.0.0.1", "Acme", vec![Severity::Critical, Severity::Low]),
            ("10.0.0.2", "Globex", vec![Severity::High]),
        ] {
            let records = severities
                .into_iter()
                .enumerate()
                .map(|(i, severity)| {
                    RecordFactory::build(RawFinding {
                        name: format!("finding-{i}"),
                        port: "80".into(),
                        severity,
                        ..Default::default()
                    })
                })
                .collect();
            store.merge_scan(ScanBatch::new(Some(address.into()), "", "Nmap", records));
            store.set_host_details(address, org, "").unwrap();
        }
        store
    }

    #[test]
    fn test_store_summary() {
        let mut store = store();
        let id = store.get("10.0.0.1").unwrap().records()[0].id.clone();
        store.set_status("10.0.0.1", &id, Status::Patched).unwrap();

        let summary = Summary::of_store(&store, None);
        assert_eq!(summary.hosts, 2);
        assert_eq!(summary.records, 3);
        assert_eq!(summary.severity.critical, 1);
        assert_eq!(summary.severity.total(), 3);
        assert_eq!(summary.status.patched, 1);
        assert_eq!(summary.status.get(Status::Pending), 2);
    }

    #[test]
    fn test_organization_filter() {
        let store = store();
        let acme = Summary::of_store(&store, Some("Acme"));
        assert_eq!(acme.hosts, 1);
        assert_eq!(acme.records, 2);
        assert_eq!(acme.severity.get(Severity::High), 0);

        let host = Summary::of_host(store.get("10.0.0.2").unwrap());
        assert_eq!(host.severity.high, 1);
    }
}
