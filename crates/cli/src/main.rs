//! Administrative CLI for bitpres.

mod backend;

use anyhow::{Context, Result, bail};
use backend::Backend;
use bitpres_core::checksum_job::{parse_checksum_output, parse_filelist_output};
use bitpres_core::config::AppConfig;
use bitpres_core::{Admin, ReplicaStoreState, VoteOutcome};
use bitpres_legacy::FileRegistry;
use bitpres_metadata::{ConsistencyStore, IngestReport, VoteSummary};
use clap::{Parser, Subcommand};
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "bitpres")]
#[command(about = "Replica bit-preservation state administration")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "BITPRES_CONFIG",
        default_value = "config/bitpres.toml"
    )]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest the output of a filelist job (one filename per line)
    IngestFilelist {
        /// Replica the job ran on
        #[arg(long)]
        replica: String,
        /// Job output file
        file: PathBuf,
    },
    /// Ingest the output of a checksum job (`filename##checksum` per line)
    IngestChecksums {
        /// Replica the job ran on
        #[arg(long)]
        replica: String,
        /// Job output file
        file: PathBuf,
    },
    /// Print the agreed checksum of a file
    Checksum { filename: String },
    /// Show the state of a file on every replica
    Status {
        filename: String,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// List files missing on a replica
    Missing {
        #[arg(long)]
        replica: String,
    },
    /// List files whose copy on a replica lost the checksum vote
    Corrupt {
        #[arg(long)]
        replica: String,
    },
    /// Count present, missing and corrupt files on a replica
    Count {
        #[arg(long)]
        replica: String,
    },
    /// Re-run the checksum vote for one file or for all files
    Vote {
        #[arg(long)]
        file: Option<String>,
    },
    /// Find a bitarchive replica holding a good copy of a file
    RepairSource {
        filename: String,
        /// Replica known to hold a bad copy
        #[arg(long)]
        exclude: Option<String>,
    },
    /// Import a file registry into the configured relational store
    MigrateLegacy {
        /// Directory holding the registry file
        #[arg(long)]
        dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let Cli { config, command } = Cli::parse();

    // Command output goes to stdout, logs to stderr.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = load_config(&config)?;
    let backend = Backend::open(&config).await?;

    let result = run(&backend, &config, command).await;
    match &backend {
        Backend::Relational(store) => store.close().await,
        Backend::File(registry) => registry.close().await?,
    }
    result
}

fn load_config(path: &str) -> Result<AppConfig> {
    let config_path = Path::new(path);
    let mut figment = Figment::new();
    let has_config_file = config_path.exists();

    if has_config_file {
        tracing::debug!(config_path = %path, "Loading configuration from file");
        figment = figment.merge(Toml::file(config_path));
    } else {
        tracing::debug!("No config file found at {path}");
    }

    let has_env_config =
        std::env::vars().any(|(key, _)| key.starts_with("BITPRES_") && key != "BITPRES_CONFIG");
    if !has_config_file && !has_env_config {
        bail!(
            "No configuration provided.\n\n\
             Provide configuration via one of:\n  \
             1. Config file: bitpres --config /path/to/bitpres.toml <command>\n  \
             2. Environment variables: BITPRES_STORE__TYPE=sqlite BITPRES_STORE__PATH=./bitpres.db ...\n\n\
             See config/bitpres.example.toml for an example configuration."
        );
    }

    let config: AppConfig = figment
        .merge(Env::prefixed("BITPRES_").split("__"))
        .extract()
        .context("failed to load configuration")?;
    config
        .validate()
        .map_err(anyhow::Error::msg)
        .context("invalid configuration")?;
    Ok(config)
}

async fn run(backend: &Backend, config: &AppConfig, command: Commands) -> Result<()> {
    match command {
        Commands::IngestFilelist { replica, file } => {
            let store = backend.relational("ingest-filelist")?;
            let content = read_job_output(&file).await?;
            let names = parse_filelist_output(&content);
            let report = store.ingest_filelist(&replica, &names).await?;
            print_report(&replica, &report);
            Ok(())
        }
        Commands::IngestChecksums { replica, file } => {
            let store = backend.relational("ingest-checksums")?;
            let content = read_job_output(&file).await?;
            let entries = parse_checksum_output(&content)
                .with_context(|| format!("malformed checksum job output in {}", file.display()))?;
            let report = store.ingest_checksums(&replica, &entries).await?;
            print_report(&replica, &report);
            Ok(())
        }
        Commands::Checksum { filename } => {
            let checksum = match backend {
                Backend::Relational(store) => store.checksum(&filename).await?,
                Backend::File(registry) => registry.get_checksum(&filename).await?,
            };
            match checksum {
                Some(checksum) => println!("{checksum}"),
                None => bail!("no agreed checksum for '{filename}'"),
            }
            Ok(())
        }
        Commands::Status { filename, json } => match backend {
            Backend::Relational(store) => relational_status(store, &filename, json).await,
            Backend::File(registry) => registry_status(registry, &filename, json).await,
        },
        Commands::Missing { replica } => {
            let store = backend.relational("missing")?;
            for filename in store.missing_files(&replica).await? {
                println!("{filename}");
            }
            Ok(())
        }
        Commands::Corrupt { replica } => {
            let store = backend.relational("corrupt")?;
            for filename in store.corrupt_files(&replica).await? {
                println!("{filename}");
            }
            Ok(())
        }
        Commands::Count { replica } => {
            let store = backend.relational("count")?;
            println!("Replica: {replica}");
            println!("Files: {}", store.count_files(&replica).await?);
            println!("Missing: {}", store.count_missing_files(&replica).await?);
            println!("Corrupt: {}", store.count_corrupt_files(&replica).await?);
            println!(
                "Last filelist update: {}",
                format_date(store.last_filelist_update(&replica).await?)
            );
            println!(
                "Last checksum update: {}",
                format_date(store.last_checksum_update(&replica).await?)
            );
            Ok(())
        }
        Commands::Vote { file } => {
            let store = backend.relational("vote")?;
            match file {
                Some(filename) => {
                    let outcome = store.vote_file(&filename).await?;
                    println!("{filename}: {}", describe_outcome(&outcome));
                }
                None => print_summary(&store.vote_all().await?),
            }
            Ok(())
        }
        Commands::RepairSource { filename, exclude } => {
            let store = backend.relational("repair-source")?;
            match store
                .bitarchive_with_good_file(&filename, exclude.as_deref())
                .await?
            {
                Some(replica) => {
                    println!("{}", replica.id);
                    Ok(())
                }
                None => bail!("no bitarchive replica holds a good copy of '{filename}'"),
            }
        }
        Commands::MigrateLegacy { dir } => {
            let store = backend.relational("migrate-legacy")?;
            migrate_legacy(store, config, &dir).await
        }
    }
}

async fn read_job_output(file: &Path) -> Result<String> {
    tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("failed to read job output {}", file.display()))
}

async fn relational_status(store: &ConsistencyStore, filename: &str, json: bool) -> Result<()> {
    let mut infos = Vec::with_capacity(store.replicas().len());
    for replica in store.replicas() {
        infos.push(store.replica_file_info(filename, &replica.id).await?);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&infos)?);
        return Ok(());
    }

    println!("File: {filename}");
    println!(
        "{:<12} {:<22} {:<20} {:<10} CHECKSUM",
        "REPLICA", "UPLOAD", "FILELIST", "VOTE"
    );
    for info in &infos {
        println!(
            "{:<12} {:<22} {:<20} {:<10} {}",
            info.replica_id,
            info.upload_status.as_str(),
            info.filelist_status.as_str(),
            info.checksum_status.as_str(),
            info.checksum.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

async fn registry_status(registry: &FileRegistry, filename: &str, json: bool) -> Result<()> {
    let Some(entry) = registry.entry(filename).await else {
        bail!("unknown file '{filename}'");
    };
    let aggregate = registry.aggregate_state(filename).await?;

    if json {
        let states: serde_json::Map<String, serde_json::Value> = entry
            .states
            .iter()
            .map(|(replica, report)| {
                (
                    replica.clone(),
                    serde_json::json!({
                        "state": report.state,
                        "changed_at": report.changed_at.to_string(),
                    }),
                )
            })
            .collect();
        let value = serde_json::json!({
            "filename": entry.filename,
            "checksum": entry.checksum,
            "aggregate": aggregate.state,
            "states": states,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("File: {}", entry.filename);
    println!("Checksum: {}", entry.checksum);
    println!("Aggregate: {}", aggregate.state);
    for (replica, report) in &entry.states {
        println!(
            "{:<12} {:<22} {}",
            replica,
            report.state.as_str(),
            report.changed_at
        );
    }
    Ok(())
}

async fn migrate_legacy(store: &ConsistencyStore, config: &AppConfig, dir: &Path) -> Result<()> {
    let registry = FileRegistry::open_with_replicas(dir, &config.replica_set())
        .await
        .with_context(|| format!("failed to open file registry in {}", dir.display()))?;
    if !store.is_empty().await? {
        tracing::warn!("Metadata store is not empty, merging registry into it");
    }

    let known: Vec<&str> = config.replicas.iter().map(|r| r.id.as_str()).collect();
    let entries = registry.entries().await;
    let total = entries.len();
    for (i, entry) in entries.iter().enumerate() {
        let states: Vec<(String, ReplicaStoreState, OffsetDateTime)> = entry
            .states
            .iter()
            .filter(|(replica, _)| {
                let keep = known.contains(&replica.as_str());
                if !keep {
                    tracing::warn!(
                        filename = %entry.filename,
                        replica_id = %replica,
                        "Skipping state of unconfigured replica"
                    );
                }
                keep
            })
            .map(|(replica, report)| (replica.clone(), report.state, report.changed_at))
            .collect();
        store
            .import_entry(&entry.filename, &entry.checksum, &states)
            .await
            .with_context(|| format!("failed to import '{}'", entry.filename))?;

        if (i + 1) % bitpres_core::LOGGING_ENTRY_INTERVAL == 0 {
            tracing::info!(imported = i + 1, total, "Migration progress");
        }
    }
    store.set_replica_dates(OffsetDateTime::now_utc()).await?;
    registry.close().await?;

    println!("Imported {total} entries from {}", registry.path().display());
    Ok(())
}

fn print_report(replica: &str, report: &IngestReport) {
    println!("Replica: {replica}");
    println!("Listed: {}", report.listed);
    println!("New files: {}", report.created);
    println!("Missing: {}", report.missing);
    println!("Duplicates: {}", report.duplicates);
    println!("Conflicts: {}", report.conflicts);
    print_summary(&report.votes);
}

fn print_summary(summary: &VoteSummary) {
    println!(
        "Votes: {} unanimous, {} majority, {} tied, {} missing everywhere, {} without checksums",
        summary.unanimous,
        summary.majority,
        summary.ties,
        summary.missing_everywhere,
        summary.no_checksums
    );
}

fn describe_outcome(outcome: &VoteOutcome) -> String {
    match outcome {
        VoteOutcome::MissingEverywhere => "missing in all replicas".to_string(),
        VoteOutcome::NoChecksums => "no checksums reported".to_string(),
        VoteOutcome::Unanimous { checksum } => format!("unanimous {checksum}"),
        VoteOutcome::Majority {
            checksum,
            votes,
            dissenting,
        } => format!("majority {checksum} ({votes} for, {dissenting} against)"),
        VoteOutcome::Tie { counts } => format!("tie {counts:?}"),
    }
}

fn format_date(at: Option<OffsetDateTime>) -> String {
    at.map(|at| at.to_string())
        .unwrap_or_else(|| "never".to_string())
}
