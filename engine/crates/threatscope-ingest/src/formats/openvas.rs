//! OpenVAS / Greenbone XML report extractor

use super::Extraction;
use crate::document::{Document, Element};
use crate::normalize::{
    cvss_display, first_line, harvest_cves, non_empty, now_display, positive_score,
};
use regex::Regex;
use std::sync::LazyLock;
use threatscope_core::{RawFinding, Severity};

const SCANNER: &str = "openvas";

static PORT_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)").expect("valid port pattern"));

fn trimmed_text(result: &Element, name: &str) -> String {
    result
        .find_text(name)
        .map(|t| t.trim().to_string())
        .unwrap_or_default()
}

/// `nvt/refs/ref[type=cve]` identifiers followed by `cve` element contents
fn result_cves(result: &Element) -> String {
    let mut cves = Vec::new();
    for refs in result.find_all_under("nvt", "refs") {
        for reference in refs.find_all("ref") {
            if reference.attr("type") == Some("cve") {
                let id = reference
                    .attr_nonempty("id")
                    .map(str::to_string)
                    .unwrap_or_else(|| reference.text());
                cves.extend(harvest_cves(&id));
            }
        }
    }
    for cve in result.find_all("cve") {
        cves.extend(harvest_cves(&cve.text()));
    }
    cves.join(", ")
}

fn result_finding(result: &Element, host: &str) -> RawFinding {
    let port_text = result.find_text("port").unwrap_or_default();
    let port = PORT_NUMBER
        .captures(&port_text)
        .map_or_else(|| "general".to_string(), |c| c[1].to_string());
    let protocol = if port_text.to_lowercase().contains("udp") {
        "udp"
    } else {
        "tcp"
    };

    let score = result
        .find_text_of(&["severity", "cvss_base"])
        .and_then(|t| positive_score(&t));
    let vector = trimmed_text(result, "cvss_base_vector");
    let severity = match score {
        Some((value, _)) => Severity::from_cvss(value),
        None => {
            let threat = result
                .find_text("threat")
                .or_else(|| result.find_under("nvt", "risk_factor").map(Element::text))
                .unwrap_or_default();
            Severity::from_text(&threat)
        }
    };

    RawFinding {
        host_address: host.to_string(),
        port,
        protocol: protocol.to_string(),
        port_state: "open".to_string(),
        service: result
            .find_under("nvt", "family")
            .map(Element::text)
            .unwrap_or_default(),
        name: non_empty(result.find_text("name")).unwrap_or_else(|| "OpenVAS Finding".to_string()),
        description: trimmed_text(result, "description"),
        severity,
        cvss: cvss_display(score.map(|s| s.1).as_deref().unwrap_or_default(), &vector),
        cve: result_cves(result),
        scanner: SCANNER.to_string(),
        solution: trimmed_text(result, "solution"),
        reference: result
            .find("nvt")
            .and_then(|nvt| nvt.attr("oid"))
            .unwrap_or_default()
            .to_string(),
    }
}

/// One finding per result
pub fn extract(doc: &Document) -> Extraction {
    let root = doc.root();
    let mut extraction = Extraction {
        scan_timestamp: non_empty(root.find_text_of(&["creation_time", "scan_start"]))
            .unwrap_or_else(now_display),
        ..Default::default()
    };

    for result in root.find_all("result") {
        let host_text = result.find_text("host").unwrap_or_default();
        let host = first_line(&host_text);
        extraction.hint_host(host);
        extraction.findings.push(result_finding(result, host));
    }

    extraction
}
