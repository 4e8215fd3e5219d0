//! Per-dialect extractors
//!
//! Every extractor is a pure function from a parsed [`Document`] to an
//! [`Extraction`]; [`extract`] is the only dispatcher.

pub mod burp;
pub mod generic;
pub mod nessus;
pub mod nmap;
pub mod openvas;
pub mod zap;

use crate::dialect::Dialect;
use crate::document::Document;
use threatscope_core::RawFinding;

/// Raw output of one extractor run over one document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    /// Address all findings of the document are filed under, if one was found
    pub host_hint: Option<String>,
    /// Display timestamp of the scan
    pub scan_timestamp: String,
    pub findings: Vec<RawFinding>,
    /// Items the dialect treats as noise and skipped
    pub suppressed: usize,
}

impl Extraction {
    /// Record `address` as the host hint unless one is already set
    pub(crate) fn hint_host(&mut self, address: &str) {
        let address = address.trim();
        if self.host_hint.is_none() && !address.is_empty() && address != "unknown" {
            self.host_hint = Some(address.to_string());
        }
    }
}

/// Run the extractor for `dialect`
pub fn extract(dialect: Dialect, doc: &Document) -> Extraction {
    match dialect {
        Dialect::Nmap => nmap::extract(doc),
        Dialect::Zap => zap::extract(doc),
        Dialect::Burp => burp::extract(doc),
        Dialect::OpenVas => openvas::extract(doc),
        Dialect::Nessus => nessus::extract(doc),
        Dialect::Generic => generic::extract(doc),
    }
}
