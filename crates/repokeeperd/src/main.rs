//! repokeeperd - repository fleet reconciliation daemon
//!
//! Loads the engine configuration, builds the GitHub client and the
//! optional identity directory, then runs the watch loop until a
//! shutdown signal arrives. Startup failures abort before the loop.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};

use repokeeper_core::identity::IdentityDirectory;
use repokeeper_core::registry::{NoopHook, PostCreateHook, RegistryPatcher};
use repokeeper_core::{init_tracing, KeeperConfig, Watcher};
use repokeeper_github::{GithubClient, OmDirectory};

#[derive(Parser)]
#[command(name = "repokeeperd")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Keeps hosted repositories converged to their declared state", long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// File holding the platform API token
    #[arg(long, env = "REPOKEEPER_TOKEN_FILE")]
    token_file: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    init_tracing(cli.json, level);

    let cfg = KeeperConfig::load(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;

    let token = std::fs::read_to_string(&cli.token_file)
        .with_context(|| format!("reading token file {}", cli.token_file.display()))?;
    let platform = Arc::new(GithubClient::new(token.trim())?);

    let identity: Option<Arc<dyn IdentityDirectory>> = match &cfg.identity_service {
        Some(svc) => Some(Arc::new(OmDirectory::new(svc.clone())?)),
        None => None,
    };

    let hook: Arc<dyn PostCreateHook> = if cfg.enable_registry_patch {
        Arc::new(RegistryPatcher::new(
            platform.clone(),
            cfg.registry_patch.clone(),
        ))
    } else {
        Arc::new(NoopHook)
    };

    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone());

    info!(version = repokeeper_core::VERSION, "repokeeperd starting");

    let watcher = Watcher::new(platform, identity, hook, cfg);
    watcher.run(cancel).await?;

    Ok(())
}

/// Cancel on SIGINT or SIGTERM; the watch loop drains in-flight tasks
/// before returning.
fn spawn_signal_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut term) => {
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => {}
                        _ = term.recv() => {}
                    }
                }
                Err(err) => {
                    warn!(error = %err, "SIGTERM handler unavailable, watching SIGINT only");
                    let _ = tokio::signal::ctrl_c().await;
                }
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
        }

        info!("shutdown signal received");
        cancel.cancel();
    });
}
