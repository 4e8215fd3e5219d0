//! Best-effort extractor for unrecognized XML schemas

use super::Extraction;
use crate::document::{Document, Element};
use crate::normalize::{
    cve_list, cvss_display, first_ipv4, non_empty, now_display, positive_score, strip_html,
};
use threatscope_core::{truncate_chars, RawFinding, Severity};

const SCANNER: &str = "generic";

/// Element names that look like a finding, most specific first
const CANDIDATE_TAGS: [&str; 7] = [
    "vulnerability",
    "vuln",
    "finding",
    "issue",
    "alert",
    "risk",
    "result",
];

const NAME_LIMIT: usize = 100;

/// Length of the element text used when no description field exists
const TEXT_DESCRIPTION_LIMIT: usize = 400;

/// Elements of the first candidate tag present (the root included), else the
/// root's direct children
fn finding_elements(root: &Element) -> Vec<&Element> {
    for tag in CANDIDATE_TAGS {
        let mut found = Vec::new();
        if root.name() == tag {
            found.push(root);
        }
        found.extend(root.find_all(tag));
        if !found.is_empty() {
            return found;
        }
    }
    root.children().collect()
}

fn element_finding(element: &Element, address: &str) -> RawFinding {
    let name = non_empty(element.find_text_of(&["name", "title"]))
        .or_else(|| element.attr_nonempty("name").map(str::to_string))
        .unwrap_or_else(|| element.name().to_string());

    let description = non_empty(element.find_text_of(&["description", "desc"]))
        .unwrap_or_else(|| truncate_chars(&element.text(), TEXT_DESCRIPTION_LIMIT));

    let score = element
        .find_text_of(&["cvss", "cvss_base"])
        .and_then(|t| positive_score(&t));
    let vector = element
        .find_text_of(&["cvss_vector", "vector"])
        .unwrap_or_default();
    let severity = match score {
        Some((value, _)) => Severity::from_cvss(value),
        None => Severity::from_text(
            &element
                .find_text_of(&["severity", "risk", "level"])
                .unwrap_or_default(),
        ),
    };

    RawFinding {
        host_address: address.to_string(),
        port: non_empty(element.find_text("port")).unwrap_or_else(|| "unknown".to_string()),
        protocol: "tcp".to_string(),
        port_state: "open".to_string(),
        name: truncate_chars(name.trim(), NAME_LIMIT),
        // CVEs come from the description only
        cve: cve_list(&description),
        description: strip_html(&description),
        severity,
        cvss: cvss_display(score.map(|s| s.1).as_deref().unwrap_or_default(), &vector),
        scanner: SCANNER.to_string(),
        solution: element
            .find_text_of(&["solution", "recommendation"])
            .unwrap_or_default(),
        ..Default::default()
    }
}

/// One finding per candidate element; the host is the first IPv4 address
/// anywhere in the document text
pub fn extract(doc: &Document) -> Extraction {
    let root = doc.root();
    let root_text = root.text();
    let address = first_ipv4(&root_text).unwrap_or("unknown");

    let mut extraction = Extraction {
        scan_timestamp: now_display(),
        ..Default::default()
    };
    extraction.hint_host(address);
    extraction.findings = finding_elements(root)
        .into_iter()
        .map(|element| element_finding(element, address))
        .collect();
    extraction
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_tags() {
        let xml = r#"<audit>
  <target>192.168.7.7</target>
  <finding name="Weak TLS">
    <severity>Moderate</severity>
    <port>443</port>
    <cvss>0</cvss>
    <recommendation>Disable TLS 1.0</recommendation>
  </finding>
  <finding>
    <title>Outdated jQuery</title>
    <cvss>6.1</cvss>
    <vector>AV:N/AC:L</vector>
    <description>&lt;b&gt;jQuery&lt;/b&gt; 1.8 (CVE-2020-11022)</description>
  </finding>
</audit>"#;
        let extraction = extract(&Document::parse(xml).unwrap());
        assert_eq!(extraction.host_hint.as_deref(), Some("192.168.7.7"));
        assert_eq!(extraction.findings.len(), 2);

        let tls = &extraction.findings[0];
        assert_eq!(tls.name, "Weak TLS");
        assert_eq!(tls.severity, Severity::Medium);
        assert_eq!(tls.port, "443");
        assert_eq!(tls.cvss, "");
        assert_eq!(tls.solution, "Disable TLS 1.0");

        let jquery = &extraction.findings[1];
        assert_eq!(jquery.name, "Outdated jQuery");
        assert_eq!(jquery.severity, Severity::Medium);
        assert_eq!(jquery.cvss, "6.1 (AV:N/AC:L)");
        assert_eq!(jquery.description, "jQuery 1.8 (CVE-2020-11022)");
        assert_eq!(jquery.cve, "CVE-2020-11022");
        assert_eq!(jquery.port, "unknown");
    }

    #[test]
    fn test_root_children_fallback() {
        let xml = r#"<inventory>
  <entry><name>Telnet enabled</name><description>Cleartext login CVE-1999-0619 on switch</description></entry>
  <note>plain text with no address</note>
</inventory>"#;
        let extraction = extract(&Document::parse(xml).unwrap());
        assert!(extraction.host_hint.is_none());
        assert_eq!(extraction.findings.len(), 2);
        assert_eq!(extraction.findings[0].cve, "CVE-1999-0619");
        assert_eq!(extraction.findings[0].host_address, "unknown");

        let note = &extraction.findings[1];
        assert_eq!(note.name, "note");
        assert_eq!(note.description, "plain text with no address");
        assert_eq!(note.severity, Severity::Info);
    }

    #[test]
    fn test_long_names_are_capped() {
        let xml = format!("<list><vuln><name>{}</name></vuln></list>", "n".repeat(300));
        let extraction = extract(&Document::parse(&xml).unwrap());
        assert_eq!(extraction.findings[0].name.chars().count(), NAME_LIMIT);
    }
}
