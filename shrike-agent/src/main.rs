//! Shrike Agent - Main entry point

use anyhow::Result;
use clap::{Parser, Subcommand};
use shrike_agent::api::{self, AppState};
use shrike_agent::config::Config;
use shrike_agent::daemon::shutdown::ShutdownCoordinator;
use shrike_agent::executor::rsync::RsyncRunner;
use shrike_agent::store::{EntryStore, JsonEntryStore};
use shrike_agent::{utils, SyncOrchestrator};
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the loopback trigger service (default)
    Serve {
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Sync all entries now and exit
    Sync,
    /// Add a file or directory to the backup list
    Add { path: String },
    /// Remove an entry by id
    Remove { id: Uuid },
    /// List backup entries
    List,
    /// Print the effective configuration as TOML
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load(args.config.as_deref())?;

    let log_level = args.log_level.as_deref().unwrap_or(&config.log.level);
    utils::logger::init(log_level)?;

    let store: Arc<dyn EntryStore> = Arc::new(JsonEntryStore::new(config.entries_file()));

    match args.command.unwrap_or(Command::Serve { port: None }) {
        Command::Serve { port } => serve(config, store, port).await,
        Command::Sync => sync_once(config, store).await,
        Command::Add { path } => {
            let entry = store.add_entry(&path)?;
            println!("Added {:?} {} ({})", entry.kind, entry.path, entry.id);
            Ok(())
        }
        Command::Remove { id } => {
            store.remove_entry(id)?;
            println!("Removed {id}");
            Ok(())
        }
        Command::List => {
            for entry in store.load_entries()? {
                let synced = entry
                    .last_synced
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "never".to_string());
                println!("{}  {:?}  {}  (last synced: {})", entry.id, entry.kind, entry.path, synced);
            }
            Ok(())
        }
        Command::Config => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

fn build_state(config: &Config, store: Arc<dyn EntryStore>) -> AppState {
    let runner = RsyncRunner::new(&config.sync.tool).with_timeout(config.timeout());
    let orchestrator = SyncOrchestrator::new(Arc::new(runner))
        .with_work_dir(config.agent.data_dir.join("tmp"))
        .with_lock_file(config.agent.data_dir.join("sync.lock"));
    AppState::new(
        orchestrator,
        store,
        config.destination(),
        config.auth.token.as_str(),
    )
}

async fn serve(mut config: Config, store: Arc<dyn EntryStore>, port: Option<u16>) -> Result<()> {
    if let Some(port) = port {
        config.agent.port = port;
    }
    config.ensure_token()?;

    tracing::info!(
        "Starting shrike-agent v{} (destination: {})",
        env!("CARGO_PKG_VERSION"),
        config.destination().resolve().display()
    );

    let state = build_state(&config, store);
    let app = api::create_router(state);

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{}", addr);
    tracing::info!("Status endpoint: GET http://{}/status", addr);
    tracing::info!("Trigger endpoint: POST http://{}/sync", addr);

    let shutdown = ShutdownCoordinator::new();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.wait_for_signal().await })
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn sync_once(config: Config, store: Arc<dyn EntryStore>) -> Result<()> {
    let state = build_state(&config, store);
    let result = api::sync::sync_now(&state).await?;
    println!(
        "Synced {} files, {} directories, {} bytes to {}",
        result.files_transferred,
        result.dirs_transferred,
        result.bytes_transferred,
        config.destination().resolve().display()
    );
    Ok(())
}
