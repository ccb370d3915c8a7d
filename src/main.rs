mod config;
mod coordinator;
mod error;
mod identity;
mod logging;
mod models;
mod run;
mod session;
mod store;
mod sync;
mod ui;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use config::{AppConfig, StoreBackend};
use identity::{IdentityProvider, LocalIdentityProvider};
use session::LedgerSession;
use store::{DocumentStore, MemoryStore, SqliteStore};

struct Invocation {
    memory: bool,
    config_path: Option<PathBuf>,
    commands: Vec<String>,
}

fn main() -> Result<()> {
    let invocation = parse_args(std::env::args().skip(1))?;
    if run::handle_info(&invocation.commands) {
        return Ok(());
    }

    let data_dir = config::data_dir()?;
    let config_path = invocation
        .config_path
        .clone()
        .unwrap_or_else(|| data_dir.join("config.yaml"));
    let mut config = AppConfig::load_layered(&config_path)?;
    if invocation.memory {
        config.store.backend = StoreBackend::Memory;
    }

    let _log_guard = logging::init(&config.logging, &config.log_directory(&data_dir))?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        backend = ?config.store.backend,
        config = %config_path.display(),
        "starting tally"
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?;
    runtime.block_on(async_main(invocation, config, data_dir))
}

async fn async_main(invocation: Invocation, config: AppConfig, data_dir: PathBuf) -> Result<()> {
    let (store, provider) = open_backend(&config, &data_dir)?;
    let session = LedgerSession::start(store, provider, config.session_options());

    if invocation.commands.is_empty() {
        run::as_tui(session).await
    } else {
        run::as_cli(&invocation.commands, session).await
    }
}

fn open_backend(
    config: &AppConfig,
    data_dir: &Path,
) -> Result<(Arc<dyn DocumentStore>, Arc<dyn IdentityProvider>)> {
    match config.store.backend {
        StoreBackend::Memory => {
            let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
            let provider: Arc<dyn IdentityProvider> = Arc::new(LocalIdentityProvider::ephemeral());
            Ok((store, provider))
        }
        StoreBackend::Sqlite => {
            let db_path = config.store_path(data_dir);
            if let Some(parent) = db_path.parent() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create store directory: {}", parent.display())
                })?;
            }
            let store: Arc<dyn DocumentStore> = Arc::new(
                SqliteStore::open(&db_path)
                    .with_context(|| format!("Failed to open ledger at {}", db_path.display()))?,
            );
            let provider: Arc<dyn IdentityProvider> = Arc::new(
                LocalIdentityProvider::persistent(data_dir.join("identity"))
                    .context("Failed to load the saved identity")?,
            );
            Ok((store, provider))
        }
    }
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Invocation> {
    let mut invocation = Invocation {
        memory: false,
        config_path: None,
        commands: Vec::new(),
    };
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--memory" => invocation.memory = true,
            "--config" => {
                let path = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--config needs a path"))?;
                invocation.config_path = Some(PathBuf::from(path));
            }
            _ => invocation.commands.push(arg),
        }
    }
    Ok(invocation)
}
