//! Scanner dialect detection

use crate::document::Document;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Source format of a scanner export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Nmap,
    Zap,
    Burp,
    OpenVas,
    Nessus,
    Generic,
}

impl Dialect {
    pub const ALL: [Dialect; 6] = [
        Dialect::Nmap,
        Dialect::Zap,
        Dialect::Burp,
        Dialect::OpenVas,
        Dialect::Nessus,
        Dialect::Generic,
    ];

    /// Tag stored in each record's `scanner` field
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Nmap => "nmap",
            Dialect::Zap => "zap",
            Dialect::Burp => "burp",
            Dialect::OpenVas => "openvas",
            Dialect::Nessus => "nessus",
            Dialect::Generic => "generic",
        }
    }

    /// Name recorded in a host's scanner list
    pub fn scanner_name(&self) -> &'static str {
        match self {
            Dialect::Nmap => "Nmap",
            Dialect::Zap => "OWASP ZAP",
            Dialect::Burp => "BurpSuite",
            Dialect::OpenVas => "OpenVAS",
            Dialect::Nessus => "Nessus",
            Dialect::Generic => "XML Generic",
        }
    }

    /// Classify a document by structure alone. Markers are checked in a
    /// fixed order and the first match wins.
    pub fn detect(doc: &Document) -> Self {
        let root = doc.root();
        let tag = root.name().to_lowercase();

        if tag == "nmaprun" {
            Dialect::Nmap
        } else if tag.contains("zap")
            || root.has_descendant("OWASPZAPReport")
            || root.has_descendant("alertitem")
        {
            Dialect::Zap
        } else if tag == "issues" || root.has_descendant("issues") {
            Dialect::Burp
        } else if tag == "report"
            && (root.has_descendant("results") || root.has_descendant("result"))
        {
            Dialect::OpenVas
        } else if root.has_descendant("NessusClientData_v2") || root.has_descendant("ReportHost") {
            Dialect::Nessus
        } else {
            Dialect::Generic
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
