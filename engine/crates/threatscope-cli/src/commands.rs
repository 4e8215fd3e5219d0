//! Command implementations. Read-only commands render to strings so the
//! output can be checked without a terminal.

use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use threatscope_common::Config;
use threatscope_core::{RecordQuery, Severity, Status, Store, Summary};
use threatscope_ingest::{DocumentOutcome, IngestConfig, Ingester};
use tracing::warn;

/// Ingest scanner exports; returns whether anything was merged
pub async fn ingest(store: &mut Store, config: &Config, files: &[PathBuf]) -> Result<bool> {
    let ingester = Ingester::new(IngestConfig {
        min_severity: config.ingest.min_severity,
    });
    let outcomes = ingester.ingest_files(store, files).await;

    let mut merged = 0;
    for outcome in &outcomes {
        println!("{}", describe_outcome(outcome));
        if matches!(outcome, DocumentOutcome::Merged { .. }) {
            merged += 1;
        }
    }

    let failed = outcomes.iter().filter(|o| o.is_failure()).count();
    if failed > 0 {
        warn!(failed, total = outcomes.len(), "Some documents were not ingested");
    }
    Ok(merged > 0)
}

pub fn describe_outcome(outcome: &DocumentOutcome) -> String {
    match outcome {
        DocumentOutcome::Merged {
            source,
            dialect,
            outcome,
        } => {
            let host = if outcome.synthetic {
                format!("{} (no address found)", outcome.host_key)
            } else {
                outcome.host_key.clone()
            };
            format!(
                "{source}: {dialect} -> {host}: {} new, {} duplicate",
                outcome.added, outcome.discarded
            )
        }
        DocumentOutcome::Empty { source, dialect } => {
            format!("{source}: {dialect} report without findings")
        }
        DocumentOutcome::Failed { source, error } => format!("{source}: failed: {error}"),
    }
}

/// Reconcile a snapshot file; the store is untouched when it is invalid
pub async fn import(store: &mut Store, snapshot: &Path) -> Result<bool> {
    let json = tokio::fs::read_to_string(snapshot)
        .await
        .with_context(|| format!("reading snapshot {}", snapshot.display()))?;
    let outcome = store
        .import_json(&json)
        .with_context(|| format!("importing {}", snapshot.display()))?;

    println!(
        "{}: {} hosts created, {} updated, {} records added, {} matched, {} statuses updated",
        snapshot.display(),
        outcome.hosts_created,
        outcome.hosts_updated,
        outcome.records_added,
        outcome.records_matched,
        outcome.statuses_updated
    );
    Ok(true)
}

pub async fn export(store: &Store, host: Option<&str>, output: Option<&Path>) -> Result<()> {
    let json = match host {
        Some(address) => store.export_host(address)?.to_json_pretty()?,
        None => store.to_json_pretty()?,
    };
    match output {
        Some(path) => {
            tokio::fs::write(path, json)
                .await
                .with_context(|| format!("writing {}", path.display()))?;
            println!("Exported to {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn severity_line(summary: &Summary) -> String {
    Severity::ALL
        .iter()
        .map(|s| format!("{s}={}", summary.severity.get(*s)))
        .collect::<Vec<_>>()
        .join(" ")
}

fn status_line(summary: &Summary) -> String {
    Status::ALL
        .iter()
        .map(|s| format!("{s}={}", summary.status.get(*s)))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn summary(store: &Store, organization: Option<&str>) -> String {
    let total = Summary::of_store(store, organization);
    let mut out = String::new();

    let _ = writeln!(out, "{} hosts, {} records", total.hosts, total.records);
    let _ = writeln!(out, "  severity: {}", severity_line(&total));
    let _ = writeln!(out, "  status:   {}", status_line(&total));

    for host in store
        .hosts()
        .filter(|h| organization.map_or(true, |org| h.organization == org))
    {
        let summary = Summary::of_host(host);
        let org = if host.organization.is_empty() {
            String::new()
        } else {
            format!(" [{}]", host.organization)
        };
        let _ = writeln!(
            out,
            "{}{} ({}; {}): {} records, {}",
            host.address,
            org,
            host.scanner_list,
            host.last_scan,
            summary.records,
            severity_line(&summary)
        );
    }
    out
}

pub fn query(
    severity: Option<Severity>,
    status: Option<Status>,
    scanner: Option<String>,
    search: Option<String>,
) -> RecordQuery {
    let mut query = RecordQuery::new();
    if let Some(severity) = severity {
        query = query.severity(severity);
    }
    if let Some(status) = status {
        query = query.status(status);
    }
    if let Some(scanner) = scanner {
        query = query.scanner(scanner);
    }
    if let Some(search) = search {
        query = query.search(search);
    }
    query
}

pub fn list(store: &Store, address: &str, query: &RecordQuery) -> Result<String> {
    let host = store
        .get(address)
        .with_context(|| format!("host {address} is not in the store"))?;

    let mut out = String::new();
    for record in query.apply(host.records()) {
        let port = if record.protocol.is_empty() {
            record.port.clone()
        } else {
            format!("{}/{}", record.port, record.protocol)
        };
        let _ = write!(
            out,
            "{}  {:<8} {:<14} {:<10} {}",
            record.id,
            record.severity.as_str(),
            record.status.as_str(),
            port,
            record.name
        );
        if !record.cvss.is_empty() {
            let _ = write!(out, "  cvss {}", record.cvss);
        }
        if !record.cve.is_empty() {
            let _ = write!(out, "  {}", record.cve);
        }
        out.push('\n');
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCAN: &str = r#"<nmaprun><host><address addr="10.0.0.3" addrtype="ipv4"/><ports>
<port protocol="tcp" portid="80"><state state="open"/><service name="http"/></port>
<port protocol="tcp" portid="445"><state state="open"/><script id="smb-vuln-ms17-010" output="VULNERABLE CVE-2017-0143 cvss: 9.3"/></port>
</ports></host></nmaprun>"#;

    fn store() -> Store {
        let mut store = Store::new();
        Ingester::default().ingest_documents(&mut store, [("scan.xml", SCAN)]);
        store.set_host_details("10.0.0.3", "Acme", "").unwrap();
        store
    }

    #[test]
    fn test_summary_output() {
        let text = summary(&store(), None);
        assert!(text.starts_with("1 hosts, 2 records"));
        assert!(text.contains("critical=1"));
        assert!(text.contains("10.0.0.3 [Acme] (Nmap;"));
        assert!(summary(&store(), Some("Globex")).starts_with("0 hosts"));
    }

    #[test]
    fn test_list_output() {
        let store = store();
        let all = list(&store, "10.0.0.3", &RecordQuery::new()).unwrap();
        let lines: Vec<_> = all.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("smb-vuln-ms17-010"));
        assert!(lines[0].contains("CVE-2017-0143"));

        let info_only = query(Some(Severity::Info), None, None, None);
        let filtered = list(&store, "10.0.0.3", &info_only).unwrap();
        assert_eq!(filtered.lines().count(), 1);
        assert!(list(&store, "10.9.9.9", &RecordQuery::new()).is_err());
    }
}
