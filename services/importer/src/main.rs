//! Importer - loads admission-cutoff spreadsheets into the cutoff store
//!
//! Usage:
//!   # Import files or whole directories:
//!   cargo run --bin importer -- import data/AIQ_PG_2023_R1.xlsx data/2024/
//!
//!   # Parse and count without touching the database:
//!   cargo run --bin importer -- import --dry-run data/
//!
//!   # Collapse duplicate records left by older imports:
//!   cargo run --bin importer -- dedup

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use importer::model::EntityKind;
use importer::{
    BatchReport, Config, DedupReport, FileOutcome, ImportRules, Importer, MemoryStore,
    MergeEngine, PgStore, Store,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "importer", about = "Imports admission cutoff spreadsheets")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Use an in-memory store instead of DB_URL
    #[arg(long, global = true, default_value = "false")]
    dry_run: bool,

    /// Print reports as JSON
    #[arg(long, global = true, default_value = "false")]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import spreadsheets (files, or directories scanned one level deep)
    Import {
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// JSON rules file overriding the built-in vocabulary
        #[arg(long)]
        rules: Option<PathBuf>,

        /// Column workers per file (defaults to IMPORT_WORKERS)
        #[arg(long)]
        workers: Option<usize>,
    },
    /// Remove records sharing a natural key, keeping the earliest
    Dedup,
    /// Print record and entity counts
    Stats,
}

async fn open_store(config: &Config, dry_run: bool) -> Result<Arc<dyn Store>> {
    if dry_run {
        tracing::info!("dry run: using in-memory store");
        return Ok(Arc::new(MemoryStore::new()));
    }
    let db_url = config.db_url.as_deref().context("DB_URL env var missing")?;
    let store = PgStore::connect(db_url, config.max_connections)
        .await
        .context("Failed to connect to database")?;
    store
        .ensure_schema()
        .await
        .context("Failed to apply schema")?;
    Ok(Arc::new(store))
}

fn print_batch(report: &BatchReport) {
    println!("=== Import Report ===");
    for outcome in &report.files {
        match outcome {
            FileOutcome::Imported(import) => println!(
                "  [ok]      {} ({} {} round {}): {} written, {} dropped",
                import.file,
                import.context.counselling_type,
                import.context.year,
                import.context.round,
                import.summary.records_written,
                import.summary.dropped_missing_context
                    + import.summary.dropped_bad_rank
                    + import.summary.dropped_unresolved_entity
            ),
            FileOutcome::Skipped { file, reason } => println!("  [skipped] {}: {}", file, reason),
            FileOutcome::Failed {
                file,
                reason,
                summary,
            } => println!(
                "  [failed]  {}: {} ({} written before failure)",
                file, reason, summary.records_written
            ),
        }
    }

    let t = &report.totals;
    println!("\nRows seen:                 {}", t.rows_seen);
    println!("Records synthesized:       {}", t.records_synthesized);
    println!("Records written:           {} ({} replaced)", t.records_written, t.records_replaced);
    println!("Dropped, missing context:  {}", t.dropped_missing_context);
    println!("Dropped, bad rank:         {}", t.dropped_bad_rank);
    println!("Dropped, unresolved name:  {}", t.dropped_unresolved_entity);
    println!("Write failures:            {}", t.write_failures);
    println!("Unknown rows:              {}", t.rows_unknown);
    println!("Entities created:          {}", t.entities_created);
    if let Some(reason) = &report.aborted {
        println!("\nABORTED: {}", reason);
    }
}

fn print_dedup(report: &DedupReport) {
    println!("=== Dedup Report ===");
    println!("Mode:            {}", if report.dry_run { "dry-run" } else { "live" });
    println!("Duplicate keys:  {}", report.groups);
    println!("Removed:         {}", report.removed);
    println!("Records:         {} -> {}", report.records_before, report.records_after);
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = Config::from_env()?;

    match args.command {
        Command::Import {
            paths,
            rules,
            workers,
        } => {
            let rules = match rules {
                Some(path) => ImportRules::from_file(&path)?,
                None => ImportRules::default(),
            };
            let inputs = importer::import::discover_inputs(&paths)
                .context("Failed to scan input paths")?;
            tracing::info!(files = inputs.len(), "starting import");

            let store = open_store(&config, args.dry_run).await?;
            let importer = Importer::new(rules, store, workers.unwrap_or(config.workers))?;
            let report = importer.import_paths(&inputs).await;

            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_batch(&report);
            }
            if let Some(reason) = report.aborted {
                anyhow::bail!("import aborted: {}", reason);
            }
        }
        Command::Dedup => {
            // A dry run still needs the real store to find duplicates
            let store = open_store(&config, false).await?;
            let report = MergeEngine::new(store)
                .collapse_duplicates(args.dry_run)
                .await
                .context("Dedup failed; no records were removed")?;

            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_dedup(&report);
            }
        }
        Command::Stats => {
            let store = open_store(&config, args.dry_run).await?;
            let records = store.cutoff_count().await?;
            let institutions = store.entity_count(EntityKind::Institution).await?;
            let programs = store.entity_count(EntityKind::Program).await?;
            if args.json {
                println!(
                    "{}",
                    serde_json::json!({
                        "records": records,
                        "institutions": institutions,
                        "programs": programs,
                    })
                );
            } else {
                println!("Records:       {}", records);
                println!("Institutions:  {}", institutions);
                println!("Programs:      {}", programs);
            }
        }
    }

    Ok(())
}
