//! Burp Suite issue export extractor

use super::Extraction;
use crate::document::{Document, Element};
use crate::normalize::{cve_list, cvss_display, first_ipv4, now_display, positive_score, strip_html};
use regex::Regex;
use std::sync::LazyLock;
use threatscope_core::{RawFinding, Severity};

const SCANNER: &str = "burp";

const DEFAULT_PORT: &str = "80";

static HOST_PORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":(\d+)$").expect("valid host port pattern"));

static VECTOR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)CVSS:[A-Z0-9:/.]+").expect("valid vector pattern"));

/// `issue` elements and `item` elements directly inside `issues`, in
/// document order
fn issue_elements(root: &Element) -> Vec<&Element> {
    let items = root.find_all_under("issues", "item");
    root.descendants()
        .into_iter()
        .filter(|e| e.name() == "issue" || items.iter().any(|item| std::ptr::eq(*item, *e)))
        .collect()
}

/// Address from the `ip` attribute, else the first IPv4 in the host text,
/// else the host text itself
fn issue_host(host: Option<&Element>) -> String {
    let Some(host) = host else {
        return String::new();
    };
    if let Some(ip) = host.attr_nonempty("ip") {
        return ip.to_string();
    }
    let text = host.text();
    first_ipv4(&text).unwrap_or(text.trim()).to_string()
}

fn issue_finding(issue: &Element) -> RawFinding {
    let host = issue.find("host");
    let host_text = host.map(Element::text).unwrap_or_default();
    let port = HOST_PORT
        .captures(host_text.trim())
        .map_or_else(|| DEFAULT_PORT.to_string(), |c| c[1].to_string());

    let score = issue
        .find_text_of(&["cvss", "cvssScore"])
        .and_then(|t| positive_score(&t));
    let vector_source = issue
        .find_text_of(&["vulnerabilityClassifications", "cvssVector"])
        .unwrap_or_default();
    let vector = VECTOR_PATTERN
        .find(&vector_source)
        .map(|m| m.as_str())
        .unwrap_or_default();

    // A numeric score outranks the textual severity
    let severity = match score {
        Some((value, _)) => Severity::from_cvss(value),
        None => Severity::from_text(&issue.find_text("severity").unwrap_or_default()),
    };

    RawFinding {
        host_address: issue_host(host),
        port,
        protocol: "http".to_string(),
        port_state: "open".to_string(),
        service: "web".to_string(),
        name: issue
            .find_text_of(&["name", "issuename", "type"])
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "BurpSuite Finding".to_string()),
        description: strip_html(
            &issue
                .find_text_of(&["issueDetail", "detail", "issuedetail"])
                .unwrap_or_default(),
        ),
        severity,
        cvss: cvss_display(score.map(|s| s.1).as_deref().unwrap_or_default(), vector),
        cve: cve_list(
            &issue
                .find_text_of(&["references", "vuln_ref"])
                .unwrap_or_default(),
        ),
        scanner: SCANNER.to_string(),
        solution: strip_html(
            &issue
                .find_text_of(&["remediationDetail", "remediation"])
                .unwrap_or_default(),
        ),
        reference: issue
            .find_text_of(&["path", "location", "url"])
            .unwrap_or_default(),
        ..Default::default()
    }
}

/// One finding per issue
pub fn extract(doc: &Document) -> Extraction {
    let mut extraction = Extraction {
        scan_timestamp: now_display(),
        ..Default::default()
    };

    for issue in issue_elements(doc.root()) {
        let finding = issue_finding(issue);
        extraction.hint_host(&finding.host_address);
        extraction.findings.push(finding);
    }

    extraction
}
