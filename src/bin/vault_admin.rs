use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use samplevault::{OrderStatus, Vault, VaultConfig};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "vault-admin")]
#[command(about = "Operator tooling for the SampleVault retention engine")]
struct Cli {
    /// Vault data directory
    #[arg(long, default_value = "vault-data")]
    data_dir: PathBuf,

    /// Override the archival threshold in days
    #[arg(long)]
    archive_after_days: Option<i64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Record counts per status
    Stats,
    /// List active records
    List {
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        search: Option<String>,
        /// List the archive set instead of the active set
        #[arg(long)]
        archived: bool,
    },
    /// Archive every dispatched record past the retention threshold
    Archive,
    /// Create a backup snapshot
    Backup {
        #[arg(long, default_value = "manual")]
        label: String,
    },
    /// List backup snapshots, oldest first
    Snapshots,
    /// Re-create records missing from the store from a snapshot
    Restore { snapshot_id: String },
    /// Delete snapshots older than the retention window
    Prune,
    /// Run a read-only integrity check
    Check,
    /// Reconstruct one record from the audit log
    Recover { id: u64 },
    /// Reconstruct every record the audit log knows but the store lost
    RecoverMissing,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mut config = VaultConfig::new(&cli.data_dir);
    if let Some(days) = cli.archive_after_days {
        config = config.archive_after_days(days);
    }
    let mut vault = Vault::open(config).context("Failed to open vault")?;

    match cli.command {
        Command::Stats => {
            let stats = vault.stats();
            println!("Active records:   {}", stats.active_total);
            println!("  Outstanding:    {}", stats.outstanding);
            println!("  In Progress:    {}", stats.in_progress);
            println!("  Dispatched:     {}", stats.dispatched);
            println!("Archived records: {}", stats.archived_total);
        }
        Command::List {
            status,
            search,
            archived,
        } => {
            if archived {
                for record in vault.list_archived(search.as_deref()) {
                    println!(
                        "#{:<6} {:<30} archived {}",
                        record.original_id,
                        record.record.customer_name,
                        record.date_archived.format("%Y-%m-%d")
                    );
                }
            } else {
                let status = status.as_deref().map(parse_status).transpose()?;
                for record in vault.list_active(status, search.as_deref()) {
                    println!(
                        "#{:<6} {:<30} {:<12} submitted {}",
                        record.id,
                        record.customer_name,
                        record.status.to_string(),
                        record.date_submitted.format("%Y-%m-%d")
                    );
                }
            }
        }
        Command::Archive => {
            let report = vault.archive_eligible().context("Archival sweep failed")?;
            println!("Archived {} record(s)", report.archived_count());
            for id in &report.archived {
                println!("  archived #{}", id);
            }
            for failure in &report.failures {
                println!("  FAILED #{}: {}", failure.record_id, failure.reason);
            }
            if !report.is_clean() {
                bail!("{} record(s) failed to archive", report.failures.len());
            }
        }
        Command::Backup { label } => {
            let name = vault
                .create_snapshot(&label)
                .context("Failed to create snapshot")?;
            println!("Created snapshot {}", name);
        }
        Command::Snapshots => {
            for name in vault.list_snapshots()? {
                println!("{}", name);
            }
        }
        Command::Restore { snapshot_id } => {
            let report = vault
                .restore_from(&snapshot_id)
                .context("Restore failed")?;
            println!(
                "Restored {} record(s) ({} active, {} archived)",
                report.restored_total(),
                report.restored_active,
                report.restored_archived
            );
            println!("Already present: {}", report.already_present);
            if !report.conflicting.is_empty() {
                println!(
                    "Conflicting (left untouched): {:?}",
                    report.conflicting
                );
            }
        }
        Command::Prune => {
            let pruned = vault.prune_snapshots()?;
            println!("Pruned {} snapshot(s)", pruned.len());
            for name in pruned {
                println!("  removed {}", name);
            }
        }
        Command::Check => {
            let report = vault.check().context("Integrity check failed")?;
            println!(
                "Active: {}  Archived: {}",
                report.active_count, report.archived_count
            );
            let issues = report.issues();
            if issues.is_empty() {
                println!("Status: healthy");
            } else {
                println!("Status: {} issue(s) found", issues.len());
                for issue in issues {
                    println!("  {}", issue);
                }
            }
        }
        Command::Recover { id } => {
            let record = vault
                .recover(id)
                .with_context(|| format!("Failed to recover record #{}", id))?;
            println!(
                "Recovered #{} ({}, {})",
                record.id, record.customer_name, record.status
            );
        }
        Command::RecoverMissing => {
            let recovered = vault.recover_missing()?;
            println!("Recovered {} record(s)", recovered.len());
            for id in recovered {
                println!("  recovered #{}", id);
            }
        }
    }

    Ok(())
}

fn parse_status(value: &str) -> Result<OrderStatus> {
    match value.to_lowercase().replace(['-', '_'], " ").as_str() {
        "outstanding" => Ok(OrderStatus::Outstanding),
        "in progress" | "inprogress" => Ok(OrderStatus::InProgress),
        "dispatched" => Ok(OrderStatus::Dispatched),
        other => bail!("Unknown status '{}'", other),
    }
}
