//! Nessus file format extractor (.nessus XML, NessusClientData_v2)

use super::Extraction;
use crate::document::{Document, Element};
use crate::normalize::{cvss_display, first_line, harvest_cves, non_empty, now_display};
use threatscope_core::{parse_score, RawFinding, Severity};
use tracing::debug;

const SCANNER: &str = "nessus";

/// Value of `HostProperties/tag[name=<name>]`
fn host_property(host: &Element, name: &str) -> Option<String> {
    let properties = host.find("HostProperties")?;
    let tag = properties
        .find_all("tag")
        .into_iter()
        .find(|t| t.attr("name") == Some(name))?;
    non_empty(Some(tag.text()))
}

fn text_of(item: &Element, name: &str) -> Option<String> {
    non_empty(item.find_text(name))
}

fn item_finding(address: &str, item: &Element, level: i64) -> RawFinding {
    // CVSS v3 is preferred over v2 for both score and vector
    let score = text_of(item, "cvss3_base_score")
        .or_else(|| text_of(item, "cvss_base_score"))
        .unwrap_or_default();
    let vector = text_of(item, "cvss3_vector")
        .or_else(|| text_of(item, "cvss_vector"))
        .unwrap_or_default();
    let cves: Vec<String> = item
        .find_all("cve")
        .iter()
        .flat_map(|c| harvest_cves(&c.text()))
        .collect();

    RawFinding {
        host_address: address.to_string(),
        port: item.attr_nonempty("port").unwrap_or("0").to_string(),
        protocol: item.attr_nonempty("protocol").unwrap_or("tcp").to_string(),
        port_state: "open".to_string(),
        service: item.attr("svc_name").unwrap_or_default().to_string(),
        name: item
            .attr_nonempty("pluginName")
            .unwrap_or("Nessus Finding")
            .to_string(),
        description: text_of(item, "description").unwrap_or_default(),
        severity: Severity::from_level(level),
        cvss: cvss_display(&score, &vector),
        cve: cves.join(", "),
        scanner: SCANNER.to_string(),
        solution: text_of(item, "solution").unwrap_or_default(),
        reference: item
            .find_text("see_also")
            .map(|s| first_line(&s).to_string())
            .unwrap_or_default(),
    }
}

/// One finding per report item per report host, using the 0-4 severity
/// scale of the file. Informational items bound to port 0 are dropped.
pub fn extract(doc: &Document) -> Extraction {
    let mut extraction = Extraction::default();

    for host in doc.root().find_all("ReportHost") {
        let address = host_property(host, "host-ip")
            .or_else(|| host.attr_nonempty("name").map(str::to_string))
            .unwrap_or_else(|| "unknown".to_string());
        extraction.hint_host(&address);
        if extraction.scan_timestamp.is_empty() {
            if let Some(started) = host_property(host, "HOST_START") {
                extraction.scan_timestamp = started;
            }
        }

        for item in host.find_all("ReportItem") {
            let level = item
                .attr("severity")
                .and_then(parse_score)
                .map_or(0, |v| v.trunc() as i64);
            if level == 0 && item.attr("port") == Some("0") {
                debug!(plugin = ?item.attr("pluginID"), "Skipping informational port 0 item");
                extraction.suppressed += 1;
                continue;
            }
            extraction.findings.push(item_finding(&address, item, level));
        }
    }

    if extraction.scan_timestamp.is_empty() {
        extraction.scan_timestamp = now_display();
    }
    extraction
}

#[cfg(test)]
mod tests {
    use super::*;

    const FILE: &str = r#"<?xml version="1.0" ?>
<NessusClientData_v2>
  <Report name="weekly">
    <ReportHost name="db01.corp">
      <HostProperties>
        <tag name="HOST_START">Mon Mar  4 10:00:00 2024</tag>
        <tag name="host-ip">172.16.0.20</tag>
      </HostProperties>
      <ReportItem port="0" svc_name="general" protocol="tcp" severity="0" pluginID="19506" pluginName="Nessus Scan Information">
        <description>Scan info</description>
      </ReportItem>
      <ReportItem port="3306" svc_name="mysql" protocol="tcp" severity="3" pluginID="1" pluginName="MySQL Unpatched">
        <description> Outdated server. </description>
        <solution>Upgrade.</solution>
        <cvss_base_score>6.8</cvss_base_score>
        <cvss_vector>CVSS2#AV:N/AC:M/Au:N/C:P/I:P/A:P</cvss_vector>
        <cvss3_base_score>8.1</cvss3_base_score>
        <cvss3_vector>CVSS:3.0/AV:N/AC:H/PR:N/UI:N/S:U/C:H/I:H/A:H</cvss3_vector>
        <cve>CVE-2020-1111</cve>
        <cve>CVE-2020-2222</cve>
        <see_also>https://vendor.example/advisory
https://nvd.nist.gov/x</see_also>
      </ReportItem>
      <ReportItem port="443" protocol="tcp" severity="0" pluginID="2" pluginName="TLS Version Detection"/>
    </ReportHost>
  </Report>
</NessusClientData_v2>"#;

    #[test]
    fn test_extract_nessus() {
        let extraction = extract(&Document::parse(FILE).unwrap());
        assert_eq!(extraction.host_hint.as_deref(), Some("172.16.0.20"));
        assert_eq!(extraction.scan_timestamp, "Mon Mar  4 10:00:00 2024");
        assert_eq!(extraction.suppressed, 1);
        assert_eq!(extraction.findings.len(), 2);

        let mysql = &extraction.findings[0];
        // The file's own scale wins over the 8.1 CVSS score
        assert_eq!(mysql.severity, Severity::High);
        assert_eq!(mysql.cvss, "8.1 (CVSS:3.0/AV:N/AC:H/PR:N/UI:N/S:U/C:H/I:H/A:H)");
        assert_eq!(mysql.cve, "CVE-2020-1111, CVE-2020-2222");
        assert_eq!(mysql.description, "Outdated server.");
        assert_eq!(mysql.reference, "https://vendor.example/advisory");
        assert_eq!(mysql.service, "mysql");

        let tls = &extraction.findings[1];
        assert_eq!(tls.severity, Severity::Info);
        assert_eq!(tls.port, "443");
    }

    #[test]
    fn test_host_name_fallback() {
        let xml = r#"<NessusClientData_v2><Report><ReportHost name="10.9.9.9">
<ReportItem port="22" severity="4" pluginName="Backdoor"/></ReportHost></Report></NessusClientData_v2>"#;
        let extraction = extract(&Document::parse(xml).unwrap());
        assert_eq!(extraction.host_hint.as_deref(), Some("10.9.9.9"));
        assert_eq!(extraction.findings[0].severity, Severity::Critical);
        assert!(!extraction.scan_timestamp.is_empty());
    }
}
