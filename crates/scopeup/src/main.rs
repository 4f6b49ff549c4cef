use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use scopeup::compose::ComposeRunner;
use scopeup::{Latch, Orchestrator, WorkspaceManager};
use scopeup_config::{NetworkConfig, default_anvil_network};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "scopeup", about = "Dev tool for running local block explorer instances")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Start explorer instances and run until interrupted (default).
    Up {
        /// Network config file (JSON). Defaults to a single local Anvil chain.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Directory for instance workspaces.
        #[arg(long)]
        workspace_root: Option<PathBuf>,
    },
    /// Remove leftover instance workspaces and their containers.
    Clean {
        #[arg(long)]
        workspace_root: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    match cli.command.unwrap_or(Command::Up {
        config: None,
        workspace_root: None,
    }) {
        Command::Up {
            config,
            workspace_root,
        } => up(config, workspace_root).await,
        Command::Clean { workspace_root } => clean(workspace_root).await,
    }
}

async fn up(config: Option<PathBuf>, workspace_root: Option<PathBuf>) -> anyhow::Result<()> {
    let network = load_network(config).await?;
    let configs = network.explorer_configs().context("derive instance configs")?;

    let compose = ComposeRunner::new();
    let manager = WorkspaceManager::new(
        workspace_root.unwrap_or_else(WorkspaceManager::default_root),
        compose.clone(),
    );

    let app_shutdown = Latch::new();
    let ctx = Latch::new();
    let orchestrator = Orchestrator::new(
        configs,
        manager,
        compose,
        network.shutdown_policy,
        app_shutdown.clone(),
    )
    .await?;

    if let Err(err) = orchestrator.start(&ctx).await {
        ctx.trip();
        let _ = orchestrator.stop().await;
        return Err(err);
    }

    println!("{}", orchestrator.config_summary());

    wait_for_shutdown(&app_shutdown).await;

    info!("shutting down");
    ctx.trip();
    orchestrator.stop().await
}

async fn clean(workspace_root: Option<PathBuf>) -> anyhow::Result<()> {
    let compose = ComposeRunner::new();
    let manager = WorkspaceManager::new(
        workspace_root.unwrap_or_else(WorkspaceManager::default_root),
        compose,
    );
    manager.cleanup_all().await
}

async fn load_network(config: Option<PathBuf>) -> anyhow::Result<NetworkConfig> {
    match config {
        Some(path) => {
            let raw = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("read config {}", path.display()))?;
            serde_json::from_str(&raw).with_context(|| format!("parse config {}", path.display()))
        }
        None => Ok(default_anvil_network()),
    }
}

/// Blocks until Ctrl-C, SIGTERM, or an instance requests process shutdown.
async fn wait_for_shutdown(app_shutdown: &Latch) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(err) => {
                tracing::warn!(error = %err, "failed to install SIGTERM handler");
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = app_shutdown.tripped() => {}
                }
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
            _ = app_shutdown.tripped() => {}
        }
    }
    #[cfg(not(unix))]
    {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = app_shutdown.tripped() => {}
        }
    }
}
