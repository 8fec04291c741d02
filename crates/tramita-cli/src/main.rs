//! Tramita CLI: the sync trigger for the periodic job runner, plus due-set
//! inspection and projection backfill over a JSON store snapshot.
//!
//! Exit codes follow the cron contract: 0 on success, 1 on an unrecovered
//! fatal error, 130 when interrupted.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};

use tramita_store::{DocumentStore, MemoryStore};
use tramita_sync::config::DEFAULT_BASE_URL;
use tramita_sync::{HttpTransport, SyncConfig, SyncEngine, backfill_latest};

#[derive(Parser)]
#[command(
    name = "tramita",
    version,
    about = "Acompanhamento de movimentações processuais via DataJud CNJ"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one synchronization pass and write the snapshot back.
    Sync(SyncArgs),
    /// List the processes currently due for refresh.
    Due(DueArgs),
    /// Recompute latest-movement summaries from stored movements.
    Backfill(SnapshotArgs),
}

#[derive(Args)]
struct SnapshotArgs {
    /// Path of the JSON store snapshot.
    #[arg(long, env = "TRAMITA_SNAPSHOT")]
    snapshot: PathBuf,
}

#[derive(Args)]
struct SyncArgs {
    #[command(flatten)]
    store: SnapshotArgs,
    /// DataJud API key.
    #[arg(long, env = "DATAJUD_API_KEY", hide_env_values = true)]
    api_key: String,
    /// DataJud endpoint root.
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    base_url: String,
    /// Staleness window in hours.
    #[arg(long, default_value_t = 24)]
    window_hours: i64,
    /// Upper bound on processes handled in one run.
    #[arg(long, default_value_t = 500)]
    max_per_run: usize,
    /// Processes per API batch.
    #[arg(long, default_value_t = 50)]
    batch_size: usize,
}

#[derive(Args)]
struct DueArgs {
    #[command(flatten)]
    store: SnapshotArgs,
    /// Staleness window in hours.
    #[arg(long, default_value_t = 24)]
    window_hours: i64,
    /// Upper bound on listed processes.
    #[arg(long, default_value_t = 500)]
    max_per_run: usize,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(error) => {
            tracing::error!(error = %error, "could not start runtime");
            return ExitCode::from(1);
        }
    };

    runtime.block_on(async {
        tokio::select! {
            result = execute(cli) => match result {
                Ok(()) => ExitCode::SUCCESS,
                Err(error) => {
                    tracing::error!("fatal: {error:#}");
                    ExitCode::from(1)
                }
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                ExitCode::from(130)
            }
        }
    })
}

async fn execute(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Sync(args) => sync(args).await,
        Command::Due(args) => due(args).await,
        Command::Backfill(args) => backfill(args).await,
    }
}

async fn sync(args: SyncArgs) -> anyhow::Result<()> {
    let store = load_store(&args.store.snapshot)?;
    let config = SyncConfig {
        base_url: args.base_url,
        api_key: args.api_key,
        staleness_window: chrono::Duration::hours(args.window_hours),
        max_per_run: args.max_per_run,
        batch_size: args.batch_size,
        ..SyncConfig::default()
    };
    let transport = HttpTransport::new(&config).context("building API client")?;

    let engine = SyncEngine::new(store, transport, config);
    let report = engine.run().await?;

    engine
        .store()
        .save_snapshot(&args.store.snapshot)
        .with_context(|| format!("saving snapshot {}", args.store.snapshot.display()))?;
    println!("{report}");
    Ok(())
}

async fn due(args: DueArgs) -> anyhow::Result<()> {
    let store = load_store(&args.store.snapshot)?;
    let due = store
        .find_due(
            Utc::now(),
            chrono::Duration::hours(args.window_hours),
            args.max_per_run,
        )
        .await?;

    if due.is_empty() {
        println!("no process is due for refresh");
        return Ok(());
    }
    for process in due {
        match process.checked_at {
            Some(checked) => println!("{}  last checked {}", process.reference, checked.to_rfc3339()),
            None => println!("{}  never checked", process.reference),
        }
    }
    Ok(())
}

async fn backfill(args: SnapshotArgs) -> anyhow::Result<()> {
    let store = load_store(&args.snapshot)?;
    let report = backfill_latest(&store, 100).await?;
    store
        .save_snapshot(&args.snapshot)
        .with_context(|| format!("saving snapshot {}", args.snapshot.display()))?;
    println!(
        "backfill: {} refreshed, {} without movements, {} erred",
        report.refreshed, report.empty, report.erred
    );
    Ok(())
}

fn load_store(path: &Path) -> anyhow::Result<MemoryStore> {
    MemoryStore::load_snapshot(path)
        .with_context(|| format!("loading snapshot {}", path.display()))
}
