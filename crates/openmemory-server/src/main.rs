//! Operational entry point: serve, migrate, backup, hash-admin-key.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};

use openmemory_core::{ConfigHandle, OmResult};
use openmemory_crypto::{ContentCipher, KeyRegistry};
use openmemory_scheduler::summarize::ExtractiveSummarizer;
use openmemory_scheduler::Scheduler;
use openmemory_server::{build_router, AppState};
use openmemory_storage::MemoryStore;

#[derive(Parser)]
#[command(name = "openmemory", version, about = "Multi-tenant memory store for AI agents")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default).
    Serve,
    /// Apply pending migrations and exit.
    Migrate,
    /// Snapshot management.
    Backup {
        #[command(subcommand)]
        action: BackupAction,
    },
    /// Hash a plaintext admin key for the ADMIN_KEY environment variable.
    HashAdminKey { plaintext: String },
}

#[derive(Subcommand)]
enum BackupAction {
    /// Create a snapshot in the backup directory.
    Create,
    /// List snapshots.
    List,
    /// Verify a snapshot and swap it in as the live database.
    Restore { snapshot: PathBuf },
}

fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "openmemory=info,warn".into()),
        )
        .init();

    let cli = Cli::parse();
    let runtime = tokio::runtime::Runtime::new().expect("build tokio runtime");
    let outcome = runtime.block_on(run(cli.command.unwrap_or(Command::Serve)));
    if let Err(e) = outcome {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run(command: Command) -> anyhow::Result<()> {
    match command {
        Command::Serve => serve().await,
        Command::Migrate => {
            // Opening the store applies pending migrations.
            open_store().await?;
            println!("migrations up to date");
            Ok(())
        }
        Command::Backup { action } => backup(action).await,
        Command::HashAdminKey { plaintext } => {
            let hash = openmemory_auth::hash_key(&plaintext)?;
            println!("{hash}");
            Ok(())
        }
    }
}

async fn open_store() -> OmResult<(ConfigHandle, Arc<MemoryStore>)> {
    let config = ConfigHandle::from_env()?;
    let cfg = config.get();
    let registry = Arc::new(KeyRegistry::from_config(
        cfg.encryption_key.as_deref(),
        cfg.encryption_key_version,
    )?);
    let cipher = Arc::new(ContentCipher::new(registry));
    let store = Arc::new(MemoryStore::open(&cfg, cipher).await?);
    Ok((config, store))
}

async fn serve() -> anyhow::Result<()> {
    let config = ConfigHandle::from_env()?;
    let jobs = Arc::new(openmemory_scheduler::registry::JobRegistry::new());
    let state = AppState::build(config.clone(), jobs.clone()).await?;

    let mut scheduler = Scheduler::new(
        state.store.clone(),
        state.memory.clone(),
        config.clone(),
        Arc::new(ExtractiveSummarizer::default()),
    );
    scheduler.start();

    let cfg = config.get();
    let addr = format!("{}:{}", cfg.host, cfg.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(
        addr = %addr,
        protocol = cfg.mode.protocol(),
        backend = ?cfg.metadata_backend,
        "listening"
    );

    let router = build_router(state);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.shutdown(Duration::from_secs(10)).await;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}

async fn backup(action: BackupAction) -> anyhow::Result<()> {
    let (config, store) = open_store().await?;
    let cfg = config.get();
    match action {
        BackupAction::Create => {
            let path = store
                .create_backup(&cfg.backup_dir, |total, remaining| {
                    tracing::info!(total, remaining, "backup progress");
                })
                .await?;
            store.prune_backups(&cfg.backup_dir, cfg.backup_retention)?;
            println!("{}", path.display());
            Ok(())
        }
        BackupAction::List => {
            for info in store.list_backups(&cfg.backup_dir)? {
                println!("{}\t{} bytes", info.file_name, info.size_bytes);
            }
            Ok(())
        }
        BackupAction::Restore { snapshot } => {
            // The live engine must not hold the file during the swap.
            drop(store);
            openmemory_storage::backup::restore_backup(&snapshot, &cfg.db_path)?;
            println!("restored {}", snapshot.display());
            Ok(())
        }
    }
}
