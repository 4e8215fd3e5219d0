//! ThreatScope Ingest - scanner export ingestion
//!
//! This crate turns raw scanner exports into canonical records:
//! - Nmap XML, OWASP ZAP, Burp Suite, OpenVAS and Nessus reports
//! - Any other XML through a best-effort generic extractor
//!
//! Documents are processed strictly in submission order against one
//! [`Store`], so deduplication observes every earlier document.
//!
//! # Example
//!
//! ```no_run
//! use threatscope_core::Store;
//! use threatscope_ingest::{DocumentOutcome, Ingester};
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut store = Store::new();
//!     let ingester = Ingester::default();
//!
//!     for outcome in ingester.ingest_files(&mut store, &["scan.xml", "zap.xml"]).await {
//!         if let DocumentOutcome::Failed { source, error } = outcome {
//!             eprintln!("{source}: {error}");
//!         }
//!     }
//!     println!("{} hosts", store.len());
//! }
//! ```

pub mod dialect;
pub mod document;
pub mod formats;
pub mod normalize;

pub use dialect::Dialect;
pub use document::Document;
pub use formats::Extraction;

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;
use threatscope_core::{
    Error, MergeOutcome, RecordFactory, Result, ScanBatch, Severity, Store, VulnerabilityRecord,
};
use tracing::{debug, info, warn};

/// Result of parsing one document
#[derive(Debug, Clone)]
pub struct IngestResult {
    pub dialect: Dialect,
    /// Address the records are filed under; `None` means unresolved
    pub host_hint: Option<String>,
    pub scan_timestamp: String,
    /// Scanner display name for the host's scanner list
    pub scanner: String,
    pub records: Vec<VulnerabilityRecord>,
    pub stats: IngestStats,
}

impl IngestResult {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Hand the records to the merge engine
    pub fn into_batch(self) -> ScanBatch {
        ScanBatch::new(self.host_hint, self.scan_timestamp, self.scanner, self.records)
    }
}

/// Per-document statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    /// Findings the extractor produced
    pub records_extracted: usize,
    /// Items the dialect skipped as noise
    pub records_suppressed: usize,
    /// Findings dropped by the minimum severity filter
    pub records_filtered: usize,
    /// Parse and extraction time in milliseconds
    pub duration_ms: u64,
}

/// Parse one document: detect its dialect, extract and build records
pub fn parse_document(text: &str) -> Result<IngestResult> {
    let start = Instant::now();
    let doc = Document::parse(text)?;
    let dialect = Dialect::detect(&doc);
    debug!(%dialect, "Detected dialect");

    let extraction = formats::extract(dialect, &doc);
    let records = RecordFactory::build_all(extraction.findings);

    let stats = IngestStats {
        records_extracted: records.len(),
        records_suppressed: extraction.suppressed,
        records_filtered: 0,
        duration_ms: start.elapsed().as_millis() as u64,
    };

    Ok(IngestResult {
        dialect,
        host_hint: extraction.host_hint,
        scan_timestamp: extraction.scan_timestamp,
        scanner: dialect.scanner_name().to_string(),
        records,
        stats,
    })
}

/// Ingest configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Minimum severity to import
    pub min_severity: Option<Severity>,
}

/// What happened to one submitted document
#[derive(Debug)]
pub enum DocumentOutcome {
    /// Records were merged into the store
    Merged {
        source: String,
        dialect: Dialect,
        outcome: MergeOutcome,
    },
    /// The document parsed but yielded no records; the store is untouched
    Empty { source: String, dialect: Dialect },
    /// The document could not be read or parsed; the store is untouched
    Failed { source: String, error: Error },
}

impl DocumentOutcome {
    pub fn source(&self) -> &str {
        match self {
            DocumentOutcome::Merged { source, .. }
            | DocumentOutcome::Empty { source, .. }
            | DocumentOutcome::Failed { source, .. } => source,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, DocumentOutcome::Failed { .. })
    }
}

/// Batch ingestion driver
#[derive(Debug, Clone, Default)]
pub struct Ingester {
    config: IngestConfig,
}

impl Ingester {
    pub fn new(config: IngestConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Parse a document and apply the severity filter
    pub fn parse(&self, text: &str) -> Result<IngestResult> {
        let mut result = parse_document(text)?;
        if let Some(min) = self.config.min_severity {
            let before = result.records.len();
            result.records.retain(|r| r.severity >= min);
            result.stats.records_filtered = before - result.records.len();
        }
        Ok(result)
    }

    /// Parse one document and merge it into `store`
    pub fn ingest_document(&self, store: &mut Store, source: &str, text: &str) -> DocumentOutcome {
        let result = match self.parse(text) {
            Ok(result) => result,
            Err(error) => {
                warn!(source, code = error.code(), %error, "Document rejected");
                return DocumentOutcome::Failed {
                    source: source.to_string(),
                    error,
                };
            }
        };

        let dialect = result.dialect;
        if result.is_empty() {
            info!(source, %dialect, "No findings in document");
            return DocumentOutcome::Empty {
                source: source.to_string(),
                dialect,
            };
        }

        info!(
            source,
            %dialect,
            records = result.records.len(),
            suppressed = result.stats.records_suppressed,
            filtered = result.stats.records_filtered,
            "Parsed document"
        );
        let outcome = store.merge_scan(result.into_batch());
        DocumentOutcome::Merged {
            source: source.to_string(),
            dialect,
            outcome,
        }
    }

    /// Ingest named documents in submission order, one outcome each.
    ///
    /// A failing document never affects the others.
    pub fn ingest_documents<S, T>(
        &self,
        store: &mut Store,
        documents: impl IntoIterator<Item = (S, T)>,
    ) -> Vec<DocumentOutcome>
    where
        S: AsRef<str>,
        T: AsRef<str>,
    {
        documents
            .into_iter()
            .map(|(source, text)| self.ingest_document(store, source.as_ref(), text.as_ref()))
            .collect()
    }

    /// Read files, then ingest them in the order given. Unreadable files
    /// become `Failed` outcomes.
    pub async fn ingest_files<P: AsRef<Path>>(
        &self,
        store: &mut Store,
        paths: &[P],
    ) -> Vec<DocumentOutcome> {
        let mut outcomes = Vec::with_capacity(paths.len());
        for path in paths {
            let path = path.as_ref();
            let source = path.display().to_string();
            info!("Reading scanner export: {}", source);

            let outcome = match tokio::fs::read_to_string(path).await {
                Ok(text) => self.ingest_document(store, &source, &text),
                Err(e) => {
                    warn!(source = %source, "Cannot read file: {}", e);
                    DocumentOutcome::Failed {
                        source,
                        error: Error::Io(e),
                    }
                }
            };
            outcomes.push(outcome);
        }
        outcomes
    }
}
