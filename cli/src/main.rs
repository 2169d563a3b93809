//! swapindex CLI: replay decoded escrow events and inspect swap state.
//!
//! # Commands
//! ```text
//! swapindex replay <events.jsonl> --config swapindex.json --db ./swaps.db
//! swapindex stats  --db ./swaps.db
//! swapindex info
//! ```

mod logging;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;

use swapindex_core::{
    CheckpointStore, CompletionPolicy, DecodedEvent, IndexerBuilder, IndexerConfig,
    ProcessOutcome, SwapIndexer, SwapStore,
};
use swapindex_storage::{InMemoryStorage, SqliteStorage};

use logging::{init_tracing, LogConfig};

#[derive(Parser)]
#[command(
    name = "swapindex",
    about = "Cross-chain atomic-swap indexing engine",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply decoded events, one JSON object per line
    Replay {
        /// Path to the events file (JSONL)
        events: PathBuf,
        /// Indexer config (JSON)
        #[arg(long)]
        config: Option<PathBuf>,
        /// SQLite database (default: in-memory)
        #[arg(long)]
        db: Option<String>,
        /// Completion policy: both | first
        #[arg(long, value_parser = parse_policy)]
        policy: Option<CompletionPolicy>,
        /// trace | debug | info | warn | error
        #[arg(long)]
        log_level: Option<String>,
        /// Emit JSON logs
        #[arg(long)]
        log_json: bool,
    },

    /// Show per-chain statistics of a SQLite database
    Stats {
        /// SQLite database path
        #[arg(long)]
        db: String,
    },

    /// Show swapindex configuration info
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Replay {
            events,
            config,
            db,
            policy,
            log_level,
            log_json,
        } => {
            let opts = ReplayOptions {
                config,
                db,
                policy,
                log_level,
                log_json,
            };
            cmd_replay(&events, opts).await
        }

        Commands::Stats { db } => cmd_stats(&db).await,

        Commands::Info => {
            cmd_info();
            Ok(())
        }
    }
}

fn cmd_info() {
    let defaults = IndexerConfig::default();
    println!("swapindex v{}", env!("CARGO_PKG_VERSION"));
    println!("  Default indexer id: {}", defaults.id);
    println!("  Default completion policy: both legs withdrawn");
    println!(
        "  Default checkpoint interval: every {} blocks",
        defaults.checkpoint_interval
    );
    println!("  Storage backends: memory, SQLite");
    println!("  Events: SrcEscrowCreated, DstEscrowCreated, EscrowWithdrawal, EscrowCancelled, FundsRescued");
}

// ─── Config ──────────────────────────────────────────────────────────────────

/// Contents of the `--config` file.
#[derive(Debug, Default, Deserialize)]
struct CliConfig {
    #[serde(flatten)]
    indexer: IndexerConfig,
    #[serde(default)]
    log: LogConfig,
}

fn load_config(path: Option<&Path>) -> Result<CliConfig> {
    let Some(path) = path else {
        return Ok(CliConfig::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
}

fn parse_policy(value: &str) -> Result<CompletionPolicy, String> {
    match value {
        "both" | "both_legs_withdrawn" => Ok(CompletionPolicy::BothLegsWithdrawn),
        "first" | "first_withdrawal" => Ok(CompletionPolicy::FirstWithdrawal),
        other => Err(format!("unknown completion policy '{other}' (expected both | first)")),
    }
}

// ─── replay ──────────────────────────────────────────────────────────────────

/// Options of `swapindex replay` besides the events file.
#[derive(Debug)]
struct ReplayOptions {
    config: Option<PathBuf>,
    db: Option<String>,
    policy: Option<CompletionPolicy>,
    log_level: Option<String>,
    log_json: bool,
}

/// Read one `DecodedEvent` per non-empty line.
fn read_events(path: &Path) -> Result<Vec<DecodedEvent>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading events {}", path.display()))?;
    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("{}:{}: invalid event", path.display(), i + 1))
        })
        .collect()
}

async fn cmd_replay(events_path: &Path, opts: ReplayOptions) -> Result<()> {
    let mut config = load_config(opts.config.as_deref())?;
    if let Some(level) = opts.log_level {
        config.log.level = level;
    }
    config.log.json |= opts.log_json;
    init_tracing(&config.log);

    if let Some(policy) = opts.policy {
        config.indexer.completion_policy = policy;
    }
    let events = read_events(events_path)?;

    match opts.db.as_deref() {
        Some(path) => {
            let store = Arc::new(SqliteStorage::open(path).await?);
            replay(store, config.indexer, events).await
        }
        None => replay(Arc::new(InMemoryStorage::new()), config.indexer, events).await,
    }
}

#[derive(Debug, Default)]
struct ChainSummary {
    chain_id: u64,
    applied: u64,
    duplicates: u64,
    ignored: u64,
    failed: u64,
    skipped: u64,
}

async fn replay<S>(store: Arc<S>, config: IndexerConfig, events: Vec<DecodedEvent>) -> Result<()>
where
    S: SwapStore + CheckpointStore + 'static,
{
    let indexer = Arc::new(IndexerBuilder::from_config(config).build(store.clone())?);
    indexer.restore().await?;

    let mut by_chain: BTreeMap<u64, Vec<DecodedEvent>> = BTreeMap::new();
    for event in events {
        by_chain.entry(event.chain_id).or_default().push(event);
    }
    for chain_events in by_chain.values_mut() {
        chain_events.sort_by_key(|e| (e.block_number, e.log_index));
    }

    let handles: Vec<_> = by_chain
        .into_iter()
        .map(|(chain_id, events)| tokio::spawn(drive_chain(indexer.clone(), chain_id, events)))
        .collect();

    for joined in futures::future::join_all(handles).await {
        let summary = joined.context("chain task panicked")??;
        println!(
            "chain {}: {} applied, {} duplicate, {} ignored, {} failed to decode, {} before checkpoint",
            summary.chain_id,
            summary.applied,
            summary.duplicates,
            summary.ignored,
            summary.failed,
            summary.skipped
        );
    }
    indexer.flush_checkpoints().await?;

    print_statistics(store.as_ref()).await
}

/// Feed one chain's events in order, reporting each finished block.
async fn drive_chain<S>(
    indexer: Arc<SwapIndexer<S>>,
    chain_id: u64,
    events: Vec<DecodedEvent>,
) -> Result<ChainSummary>
where
    S: SwapStore + CheckpointStore + 'static,
{
    let resume = indexer.resume_block(chain_id).await?.unwrap_or(0);
    let mut summary = ChainSummary {
        chain_id,
        ..Default::default()
    };
    let mut current_block: Option<u64> = None;

    for event in &events {
        if event.block_number < resume {
            summary.skipped += 1;
            continue;
        }
        if let Some(block) = current_block.filter(|b| *b != event.block_number) {
            indexer.complete_block(chain_id, block, "").await?;
        }
        current_block = Some(event.block_number);

        match indexer.process(event).await {
            Ok(ProcessOutcome::Applied(_)) => summary.applied += 1,
            Ok(ProcessOutcome::Duplicate(_)) => summary.duplicates += 1,
            Ok(ProcessOutcome::Ignored(_)) => summary.ignored += 1,
            // logged by the indexer; a malformed event can never succeed
            Err(e) if e.is_decode() => summary.failed += 1,
            Err(e) => {
                return Err(e).with_context(|| {
                    format!(
                        "chain {chain_id}: block {} tx {} log {}",
                        event.block_number, event.tx_hash, event.log_index
                    )
                })
            }
        }
    }
    if let Some(block) = current_block {
        indexer.complete_block(chain_id, block, "").await?;
    }
    tracing::info!(chain_id, applied = summary.applied, "Chain replay finished");
    Ok(summary)
}

// ─── stats ───────────────────────────────────────────────────────────────────

async fn cmd_stats(path: &str) -> Result<()> {
    let store = SqliteStorage::open(path).await?;
    print_statistics(&store).await
}

async fn print_statistics<S: SwapStore>(store: &S) -> Result<()> {
    for s in store.all_statistics().await? {
        println!("chain {}:", s.chain_id);
        println!("  source escrows:      {}", s.total_src_escrows);
        println!("  destination escrows: {}", s.total_dst_escrows);
        println!("  withdrawals:         {}", s.total_withdrawals);
        println!("  cancellations:       {}", s.total_cancellations);
        println!("  volume locked:       {}", s.total_volume_locked);
        println!("  volume withdrawn:    {}", s.total_volume_withdrawn);
        println!("  last updated block:  {}", s.last_updated_block);
    }

    let mut by_status: BTreeMap<&'static str, usize> = BTreeMap::new();
    for swap in store.swaps().await? {
        *by_status.entry(swap.status.as_str()).or_default() += 1;
    }
    println!("swaps:");
    for (status, count) in by_status {
        println!("  {status:<13} {count}");
    }
    Ok(())
}
