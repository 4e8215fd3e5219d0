//! Record queries over a host's findings

use crate::record::VulnerabilityRecord;
use crate::severity::{Severity, Status};
use std::cmp::Reverse;

/// Filter for a host's records. Unset criteria match everything.
#[derive(Debug, Clone, Default)]
pub struct RecordQuery {
    pub severity: Option<Severity>,
    pub status: Option<Status>,
    pub scanner: Option<String>,
    /// Case-insensitive substring over name, CVEs, port and description
    pub search: Option<String>,
}

impl RecordQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }

    pub fn scanner(mut self, scanner: impl Into<String>) -> Self {
        self.scanner = Some(scanner.into());
        self
    }

    pub fn search(mut self, text: impl Into<String>) -> Self {
        self.search = Some(text.into().to_lowercase());
        self
    }

    pub fn matches(&self, record: &VulnerabilityRecord) -> bool {
        if self.severity.is_some_and(|s| s != record.severity) {
            return false;
        }
        if self.status.is_some_and(|s| s != record.status) {
            return false;
        }
        if let Some(ref scanner) = self.scanner {
            if !record.scanner.eq_ignore_ascii_case(scanner) {
                return false;
            }
        }
        if let Some(ref needle) = self.search {
            let haystack = format!(
                "{} {} {} {}",
                record.name, record.cve, record.port, record.description
            )
            .to_lowercase();
            if !haystack.contains(needle.to_lowercase().as_str()) {
                return false;
            }
        }
        true
    }

    /// Matching records, most severe first; ties keep store order
    pub fn apply<'a>(&self, records: &'a [VulnerabilityRecord]) -> Vec<&'a VulnerabilityRecord> {
        let mut hits: Vec<_> = records.iter().filter(|r| self.matches(r)).collect();
        hits.sort_by_key(|r| Reverse(r.severity));
        hits
    }
}
