//! greview node - serves git pushes as code reviews.

use anyhow::Context;
use clap::Parser;
use greview_git::GitReceivePack;
use greview_node::{
    create_router,
    observability::{init_logging, LogFormat},
    AppState, NodeConfig,
};
use greview_store::MemoryReviewStore;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

/// greview node - turns git pushes into code reviews
#[derive(Parser, Debug)]
#[command(name = "greview-node")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// HTTP listen address
    #[arg(long)]
    listen_addr: Option<SocketAddr>,

    /// Git executable
    #[arg(long)]
    git_path: Option<PathBuf>,

    /// Bare repository holding review branches
    #[arg(long)]
    repository_path: Option<PathBuf>,

    /// Base URL reviews are browsed under
    #[arg(long)]
    public_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Log format (pretty, json)
    #[arg(long)]
    log_format: Option<String>,
}

impl Args {
    /// Applies command line overrides on top of `config`.
    fn apply(self, mut config: NodeConfig) -> NodeConfig {
        if let Some(addr) = self.listen_addr {
            config.listen_addr = addr;
        }
        if let Some(path) = self.git_path {
            config.git_path = path;
        }
        if let Some(path) = self.repository_path {
            config.repository_path = path;
        }
        if let Some(url) = self.public_url {
            config.public_url = Some(url);
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }
        if let Some(format) = self.log_format {
            config.log_format = LogFormat::parse(&format);
        }
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = NodeConfig::load_or_default(&args.config)?;
    let config = args.apply(config);

    init_logging(&config.log_level, config.log_format);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting greview node");
    tracing::info!(
        listen_addr = %config.listen_addr,
        git_path = %config.git_path.display(),
        repository_path = %config.repository_path.display(),
        public_url = config.public_url.as_deref().unwrap_or("<from Host header>"),
        "Node configuration"
    );

    let adapter = GitReceivePack::new(&config.git_path, &config.repository_path);
    if let Some(parent) = config.repository_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    adapter
        .ensure_repository()
        .context("failed to prepare review repository")?;

    let state = AppState::new(Arc::new(adapter), Arc::new(MemoryReviewStore::new()))
        .with_public_url(config.public_url.clone())
        .with_max_body_size(config.max_body_size);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "Node is ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Node stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
