//! ThreatScope - vulnerability scan aggregation
//!
//! Entry point for the `threatscope` binary. Every command works against one
//! JSON store file, which is rewritten after each mutating command.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use threatscope_common::{logging::LogConfig, Config};
use threatscope_core::{Severity, Status, Store};
use tracing::{debug, info};

/// ThreatScope vulnerability store
#[derive(Parser, Debug)]
#[command(name = "threatscope")]
#[command(version)]
#[command(
    about = "Aggregate scanner exports into a per-host vulnerability store",
    long_about = None
)]
struct Args {
    /// Configuration file path
    #[arg(short, long, global = true, default_value = "threatscope.toml")]
    config: PathBuf,

    /// Store file (overrides config)
    #[arg(short, long, global = true)]
    store: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log format (pretty, json, compact)
    #[arg(long, global = true)]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest scanner exports (nmap, ZAP, Burp, OpenVAS, Nessus, other XML)
    Ingest {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Reconcile a previously exported snapshot into the store
    Import { snapshot: PathBuf },

    /// Write the store, or one host, as a JSON snapshot
    Export {
        #[arg(long)]
        host: Option<String>,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Severity and status tallies
    Summary {
        #[arg(long)]
        organization: Option<String>,
    },

    /// List a host's records, most severe first
    List {
        host: String,

        #[arg(long)]
        severity: Option<Severity>,

        #[arg(long)]
        status: Option<Status>,

        #[arg(long)]
        scanner: Option<String>,

        #[arg(long)]
        search: Option<String>,
    },

    /// Set the status of a record
    Status {
        host: String,
        record_id: String,
        status: Status,
    },

    /// Register a host by hand
    AddHost {
        address: String,

        #[arg(long, default_value = "")]
        organization: String,

        #[arg(long, default_value = "")]
        description: String,
    },

    /// Remove a host and all of its records
    RemoveHost { address: String },

    /// Manage evidence references on a record
    Evidence {
        #[command(subcommand)]
        action: EvidenceAction,
    },
}

#[derive(Subcommand, Debug)]
enum EvidenceAction {
    /// Attach an evidence reference
    Attach {
        host: String,
        record_id: String,
        reference: String,
    },

    /// Detach the evidence reference at INDEX
    Detach {
        host: String,
        record_id: String,
        index: usize,
    },
}

impl Command {
    fn mutates(&self) -> bool {
        !matches!(
            self,
            Command::Export { .. } | Command::Summary { .. } | Command::List { .. }
        )
    }
}

fn load_config(args: &Args) -> Result<Config> {
    let config = if args.config.exists() {
        Config::from_file(&args.config)?
    } else {
        Config::default()
    };
    let mut config = config.merge_env();

    if let Some(ref path) = args.store {
        config.store.path = path.clone();
    }
    if let Some(ref level) = args.log_level {
        config.logging.level = level.clone();
    }
    if let Some(ref format) = args.log_format {
        config.logging.format = format.clone();
    }
    Ok(config)
}

fn save(store: &Store, path: &Path, pretty: bool) -> Result<()> {
    store.save(path, pretty)?;
    info!(
        path = %path.display(),
        hosts = store.len(),
        records = store.record_count(),
        "Store saved"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    threatscope_common::init_logging_with_config(LogConfig::from_settings(&config.logging));
    debug!("ThreatScope {}", env!("CARGO_PKG_VERSION"));

    let store_path = config.store.path.clone();
    let mut store = Store::load(&store_path)?;
    debug!(path = %store_path.display(), hosts = store.len(), "Store loaded");

    let mutates = args.command.mutates();
    let changed = match args.command {
        Command::Ingest { files } => commands::ingest(&mut store, &config, &files).await?,
        Command::Import { snapshot } => commands::import(&mut store, &snapshot).await?,
        Command::Export { host, output } => {
            commands::export(&store, host.as_deref(), output.as_deref()).await?;
            false
        }
        Command::Summary { organization } => {
            print!("{}", commands::summary(&store, organization.as_deref()));
            false
        }
        Command::List {
            host,
            severity,
            status,
            scanner,
            search,
        } => {
            let query = commands::query(severity, status, scanner, search);
            print!("{}", commands::list(&store, &host, &query)?);
            false
        }
        Command::Status {
            host,
            record_id,
            status,
        } => {
            let previous = store.set_status(&host, &record_id, status)?;
            println!("{record_id}: {previous} -> {status}");
            true
        }
        Command::AddHost {
            address,
            organization,
            description,
        } => {
            let host = store.add_host(&address, &organization, &description)?;
            println!("Added host {}", host.address);
            true
        }
        Command::RemoveHost { address } => {
            let host = store.remove_host(&address)?;
            println!("Removed host {} ({} records)", host.address, host.records().len());
            true
        }
        Command::Evidence { action } => match action {
            EvidenceAction::Attach {
                host,
                record_id,
                reference,
            } => {
                let count = store.attach_evidence(&host, &record_id, reference)?;
                println!("{record_id}: {count} evidence reference(s)");
                true
            }
            EvidenceAction::Detach {
                host,
                record_id,
                index,
            } => {
                let removed = store.detach_evidence(&host, &record_id, index)?;
                println!("Detached {removed}");
                true
            }
        },
    };

    if mutates && changed {
        save(&store, &store_path, config.store.pretty)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        let args = Args::parse_from([
            "threatscope",
            "--store",
            "s.json",
            "list",
            "10.0.0.1",
            "--severity",
            "high",
            "--status",
            "false_positive",
        ]);
        assert_eq!(args.store, Some(PathBuf::from("s.json")));
        match args.command {
            Command::List {
                host,
                severity,
                status,
                ..
            } => {
                assert_eq!(host, "10.0.0.1");
                assert_eq!(severity, Some(Severity::High));
                assert_eq!(status, Some(Status::FalsePositive));
            }
            other => panic!("unexpected command: {other:?}"),
        }

        let args = Args::parse_from(["threatscope", "evidence", "detach", "h", "r", "2"]);
        assert!(args.command.mutates());
        assert!(Args::try_parse_from(["threatscope", "ingest"]).is_err());
    }

    #[test]
    fn test_cli_overrides_config() {
        let args = Args::parse_from([
            "threatscope",
            "--config",
            "/nonexistent/threatscope.toml",
            "--store",
            "override.json",
            "--log-level",
            "debug",
            "summary",
        ]);
        let config = load_config(&args).unwrap();
        assert_eq!(config.store.path, PathBuf::from("override.json"));
        assert_eq!(config.logging.level, "debug");
        assert!(!args.command.mutates());
    }
}
