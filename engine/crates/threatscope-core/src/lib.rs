//! ThreatScope Core - canonical record model and store operations
//!
//! This crate holds the types every other ThreatScope crate speaks:
//! - `Severity` / `Status`: the canonical tiers and lifecycle states
//! - `VulnerabilityRecord`, `HostEntry`, `Store`: the per-host record store
//! - `RecordFactory`: identity and lifecycle defaults for extracted findings
//! - `Store::merge_scan`: fingerprint-deduplicating merge of fresh scans
//! - `Store::import_snapshot`: reconciliation of exported store snapshots

pub mod error;
pub mod factory;
pub mod host;
pub mod merge;
pub mod query;
pub mod reconcile;
pub mod record;
pub mod severity;
pub mod stats;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use factory::{generate_record_id, RawFinding, RecordFactory};
pub use host::{HostEntry, Store};
pub use merge::{MergeOutcome, ScanBatch};
pub use query::RecordQuery;
pub use reconcile::{ImportOutcome, Snapshot};
pub use record::{truncate_chars, Fingerprint, VulnerabilityRecord};
pub use severity::{parse_score, Severity, Status};
pub use stats::{SeverityCounts, StatusCounts, Summary};
