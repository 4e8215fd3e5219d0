//! OWASP ZAP XML report extractor

use super::Extraction;
use crate::document::{Document, Element};
use crate::normalize::{harvest_cves, now_display, strip_html};
use regex::Regex;
use std::sync::LazyLock;
use threatscope_core::{parse_score, RawFinding, Severity};

const SCANNER: &str = "zap";

/// Port assumed when an alert's URI carries none
const DEFAULT_PORT: &str = "80";

static URI_PORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":(\d+)/").expect("valid URI port pattern"));

/// Risk code 0-3, upgraded to critical when the risk description says so
fn alert_severity(alert: &Element) -> Severity {
    let riskdesc = alert.find_text("riskdesc").unwrap_or_default();
    if riskdesc.to_lowercase().contains("critical") {
        return Severity::Critical;
    }
    let riskcode = alert
        .find_text("riskcode")
        .and_then(|t| parse_score(&t))
        .map_or(0, |v| v.trunc() as i64);
    match riskcode {
        3 => Severity::High,
        2 => Severity::Medium,
        1 => Severity::Low,
        _ => Severity::Info,
    }
}

fn alert_finding(host: &str, alert: &Element) -> RawFinding {
    let description = strip_html(&alert.find_text("desc").unwrap_or_default());
    let reference = strip_html(&alert.find_text("reference").unwrap_or_default());
    let uri = alert.find_text("uri").unwrap_or_default();
    let port = URI_PORT
        .captures(&uri)
        .map_or_else(|| DEFAULT_PORT.to_string(), |c| c[1].to_string());

    let mut cves = harvest_cves(&description);
    cves.extend(harvest_cves(&reference));

    RawFinding {
        host_address: host.to_string(),
        port,
        protocol: "http".to_string(),
        port_state: "open".to_string(),
        service: "web".to_string(),
        name: alert
            .find_text("name")
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "ZAP Finding".to_string()),
        severity: alert_severity(alert),
        cve: cves.join(", "),
        scanner: SCANNER.to_string(),
        solution: strip_html(&alert.find_text("solution").unwrap_or_default()),
        description,
        reference,
        ..Default::default()
    }
}

/// One finding per alert item per site
pub fn extract(doc: &Document) -> Extraction {
    let root = doc.root();
    let mut extraction = Extraction {
        scan_timestamp: root
            .attr_nonempty("generated")
            .map_or_else(now_display, str::to_string),
        ..Default::default()
    };

    for site in root.find_all("site") {
        let host = site
            .attr_nonempty("host")
            .or_else(|| site.attr_nonempty("name"))
            .unwrap_or("unknown");
        extraction.hint_host(host);

        for alert in site.find_all("alertitem") {
            extraction.findings.push(alert_finding(host, alert));
        }
    }

    extraction
}
