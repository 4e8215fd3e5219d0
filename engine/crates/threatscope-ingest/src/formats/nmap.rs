//! Nmap XML (`-oX`) extractor

use super::Extraction;
use crate::document::{Document, Element};
use crate::normalize::{cve_list, cvss_display, unix_display};
use regex::Regex;
use std::sync::LazyLock;
use threatscope_core::{RawFinding, Severity};
use tracing::debug;

const SCANNER: &str = "nmap";

/// Script output this short or shorter is noise
const MIN_SCRIPT_OUTPUT: usize = 5;

static SCORE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:cvss|score)[:\s]+([0-9]+\.?[0-9]*)").expect("valid score pattern")
});

static VECTOR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)vector[:\s]+([A-Z0-9:/.]+)").expect("valid vector pattern")
});

/// Port context shared by every finding on one port
struct PortContext<'a> {
    address: &'a str,
    port: &'a str,
    protocol: &'a str,
    state: &'a str,
    service: String,
}

/// Score and vector quoted in free-form script output
fn scan_output(output: &str) -> (Option<String>, String) {
    let score = SCORE_PATTERN
        .captures(output)
        .map(|c| c[1].to_string());
    let vector = VECTOR_PATTERN
        .captures(output)
        .map(|c| c[1].to_string())
        .unwrap_or_default();
    (score, vector)
}

fn host_address(host: &Element) -> &str {
    host.find_all("address")
        .into_iter()
        .find(|a| matches!(a.attr("addrtype"), Some("ipv4") | Some("ipv6")))
        .and_then(|a| a.attr("addr"))
        .unwrap_or("unknown")
}

fn service_descriptor(port: &Element) -> String {
    let Some(service) = port.find("service") else {
        return String::new();
    };
    ["name", "product", "version"]
        .iter()
        .filter_map(|key| service.attr_nonempty(key))
        .collect::<Vec<_>>()
        .join(" ")
}

fn script_finding(ctx: &PortContext<'_>, script: &Element, output: &str) -> RawFinding {
    let (score, vector) = scan_output(output);
    let severity = match score {
        Some(ref s) => Severity::from_score(s),
        None if output.to_lowercase().contains("vuln") => Severity::Medium,
        None => Severity::Info,
    };
    let name = script
        .attr_nonempty("id")
        .map(str::to_string)
        .or_else(|| (!ctx.service.is_empty()).then(|| ctx.service.clone()))
        .unwrap_or_else(|| format!("Port {}", ctx.port));

    RawFinding {
        host_address: ctx.address.to_string(),
        port: ctx.port.to_string(),
        protocol: ctx.protocol.to_string(),
        port_state: ctx.state.to_string(),
        service: ctx.service.clone(),
        name,
        description: output.to_string(),
        severity,
        cvss: cvss_display(score.as_deref().unwrap_or_default(), &vector),
        cve: cve_list(output),
        scanner: SCANNER.to_string(),
        ..Default::default()
    }
}

fn open_port_finding(ctx: &PortContext<'_>) -> RawFinding {
    RawFinding {
        host_address: ctx.address.to_string(),
        port: ctx.port.to_string(),
        protocol: ctx.protocol.to_string(),
        port_state: ctx.state.to_string(),
        service: ctx.service.clone(),
        name: format!("Open port: {}/{} {}", ctx.port, ctx.protocol, ctx.service)
            .trim()
            .to_string(),
        description: format!(
            "Port {}/{} open. Service: {}",
            ctx.port, ctx.protocol, ctx.service
        )
        .trim()
        .to_string(),
        severity: Severity::Info,
        scanner: SCANNER.to_string(),
        ..Default::default()
    }
}

fn host_script_finding(address: &str, script: &Element, output: &str) -> RawFinding {
    let (score, vector) = scan_output(output);
    RawFinding {
        host_address: address.to_string(),
        port: "host".to_string(),
        name: script.attr_nonempty("id").unwrap_or("host-script").to_string(),
        description: output.to_string(),
        severity: score.as_deref().map_or(Severity::Info, Severity::from_score),
        cvss: cvss_display(score.as_deref().unwrap_or_default(), &vector),
        cve: cve_list(output),
        scanner: SCANNER.to_string(),
        ..Default::default()
    }
}

fn is_noise(output: &str) -> bool {
    output.chars().count() <= MIN_SCRIPT_OUTPUT
}

/// One finding per script output on a port, or one `info` finding per open
/// port without scripts; host scripts become findings on port `host`.
pub fn extract(doc: &Document) -> Extraction {
    let root = doc.root();
    let mut extraction = Extraction {
        scan_timestamp: root
            .attr("start")
            .and_then(unix_display)
            .unwrap_or_default(),
        ..Default::default()
    };

    if let Some(address) = root
        .find_all("host")
        .iter()
        .flat_map(|h| h.find_all("address"))
        .find(|a| a.attr("addrtype") == Some("ipv4"))
        .and_then(|a| a.attr("addr"))
    {
        extraction.hint_host(address);
    }

    for host in root.find_all("host") {
        let address = host_address(host);

        for port in host.find_all("port") {
            let ctx = PortContext {
                address,
                port: port.attr("portid").unwrap_or_default(),
                protocol: port.attr_nonempty("protocol").unwrap_or("tcp"),
                state: port
                    .find("state")
                    .and_then(|s| s.attr("state"))
                    .unwrap_or_default(),
                service: service_descriptor(port),
            };

            let scripts = port.find_all("script");
            if scripts.is_empty() {
                if ctx.state == "open" {
                    extraction.findings.push(open_port_finding(&ctx));
                }
                continue;
            }
            for script in scripts {
                let output = script.attr("output").unwrap_or_default();
                if is_noise(output) {
                    debug!(
                        port = ctx.port,
                        script = ?script.attr("id"),
                        "Skipping empty script output"
                    );
                    extraction.suppressed += 1;
                    continue;
                }
                extraction.findings.push(script_finding(&ctx, script, output));
            }
        }

        for script in host.find_all_under("hostscript", "script") {
            let output = script.attr("output").unwrap_or_default();
            if is_noise(output) {
                extraction.suppressed += 1;
                continue;
            }
            extraction
                .findings
                .push(host_script_finding(address, script, output));
        }
    }

    extraction
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCAN: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<nmaprun scanner="nmap" start="1700000000" version="7.94">
  <host>
    <status state="up"/>
    <address addr="10.0.0.5" addrtype="ipv4"/>
    <address addr="00:11:22:33:44:55" addrtype="mac"/>
    <ports>
      <port protocol="tcp" portid="22">
        <state state="open"/>
        <service name="ssh" product="OpenSSH" version="8.2p1"/>
      </port>
      <port protocol="tcp" portid="443">
        <state state="open"/>
        <service name="https"/>
        <script id="ssl-heartbleed" output="VULNERABLE: CVE-2014-0160 cvss: 7.5 vector: AV:N/AC:L/Au:N/C:P/I:N/A:N"/>
        <script id="ssl-date" output="ok"/>
      </port>
      <port protocol="udp" portid="161">
        <state state="open|filtered"/>
      </port>
      <port protocol="tcp" portid="80">
        <state state="open"/>
        <script id="http-vuln-check" output="Possible vuln in handler"/>
      </port>
    </ports>
    <hostscript>
      <script id="smb-vuln-ms17-010" output="VULNERABLE: Remote Code Execution (CVE-2017-0143) score: 9.3"/>
    </hostscript>
  </host>
</nmaprun>"#;

    #[test]
    fn test_extract_nmap() {
        let doc = Document::parse(SCAN).unwrap();
        let extraction = extract(&doc);

        assert_eq!(extraction.host_hint.as_deref(), Some("10.0.0.5"));
        assert!(!extraction.scan_timestamp.is_empty());
        assert_eq!(extraction.suppressed, 1);
        assert_eq!(extraction.findings.len(), 4);

        let open = &extraction.findings[0];
        assert_eq!(open.name, "Open port: 22/tcp ssh OpenSSH 8.2p1");
        assert_eq!(open.description, "Port 22/tcp open. Service: ssh OpenSSH 8.2p1");
        assert_eq!(open.severity, Severity::Info);
        assert_eq!(open.port_state, "open");

        let heartbleed = &extraction.findings[1];
        assert_eq!(heartbleed.name, "ssl-heartbleed");
        assert_eq!(heartbleed.severity, Severity::High);
        assert_eq!(heartbleed.cvss, "7.5 (AV:N/AC:L/Au:N/C:P/I:N/A:N)");
        assert_eq!(heartbleed.cve, "CVE-2014-0160");

        assert_eq!(extraction.findings[2].severity, Severity::Medium);

        let host_script = &extraction.findings[3];
        assert_eq!(host_script.port, "host");
        assert_eq!(host_script.protocol, "");
        assert_eq!(host_script.severity, Severity::Critical);
        assert_eq!(host_script.cve, "CVE-2017-0143");
    }

    #[test]
    fn test_host_scripts_stay_with_their_host() {
        let xml = r#"<nmaprun>
  <host><address addr="10.0.0.1" addrtype="ipv4"/>
    <hostscript><script id="smb-os-discovery" output="OS: Windows Server 2019"/></hostscript>
  </host>
  <host><address addr="10.0.0.2" addrtype="ipv4"/></host>
</nmaprun>"#;
        let extraction = extract(&Document::parse(xml).unwrap());
        assert_eq!(extraction.findings.len(), 1);
        assert_eq!(extraction.findings[0].host_address, "10.0.0.1");
    }

    #[test]
    fn test_unresolved_host() {
        let extraction = extract(&Document::parse("<nmaprun/>").unwrap());
        assert!(extraction.host_hint.is_none());
        assert!(extraction.findings.is_empty());
        assert_eq!(extraction.scan_timestamp, "");
    }
}
