//! spellbook-server - Spell catalog service
//!
//! Serves the canonical spell catalog and its moderation queue over HTTP.
//! Settings resolve CLI → environment → config.toml → compiled default.

use anyhow::{Context, Result};
use clap::Parser;
use spellbook_common::config::{
    database_path, resolve_root_folder, TomlConfig, DEFAULT_BIND_ADDRESS, DEFAULT_PORT,
};
use spellbook_common::db::init_database;
use spellbook_common::store::{MemoryStore, SpellStore, SqliteStore};
use spellbook_common::ApprovalPolicy;
use spellbook_server::{build_router, AppState};
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

/// Command-line arguments for spellbook-server
#[derive(Parser, Debug)]
#[command(name = "spellbook-server")]
#[command(about = "Spell catalog service with moderated submissions")]
#[command(version)]
struct Args {
    /// Root folder holding the catalog database (env: SPELLBOOK_ROOT)
    #[arg(short, long)]
    root_folder: Option<String>,

    /// Address to bind to
    #[arg(short, long, env = "SPELLBOOK_BIND_ADDRESS")]
    bind_address: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "SPELLBOOK_PORT")]
    port: Option<u16>,

    /// Hex SHA-256 digest of the admin token
    #[arg(long, env = "SPELLBOOK_ADMIN_TOKEN_SHA256")]
    admin_token_sha256: Option<String>,

    /// Approval policy: "overwrite" or "reconcile"
    #[arg(long, env = "SPELLBOOK_APPROVAL_POLICY")]
    approval_policy: Option<String>,

    /// Keep the catalog in memory only (nothing is written to disk)
    #[arg(long)]
    in_memory: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "spellbook_server=info,spellbook_common=info,tower_http=info".into()),
        )
        .init();

    // Build identification first, before any database delay
    info!(
        "Starting spellbook-server v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();
    let toml_config = TomlConfig::load().context("Failed to load config file")?;

    let approval_policy = match args.approval_policy.as_deref() {
        Some(policy) => policy.parse::<ApprovalPolicy>()?,
        None => toml_config.approval_policy()?.unwrap_or_default(),
    };
    info!("Approval policy: {}", approval_policy);

    let admin_token_sha256 = args
        .admin_token_sha256
        .or_else(|| toml_config.admin_token_sha256.clone())
        .filter(|digest| !digest.trim().is_empty());
    if admin_token_sha256.is_none() {
        warn!("No admin token digest configured; all callers are unprivileged");
    }

    let store: Arc<dyn SpellStore> = if args.in_memory {
        warn!("Running with an in-memory catalog; data is lost on exit");
        Arc::new(MemoryStore::new())
    } else {
        let root_folder =
            resolve_root_folder(args.root_folder.as_deref(), "SPELLBOOK_ROOT", &toml_config);
        let db_path = database_path(&root_folder);
        info!("Database path: {}", db_path.display());

        let pool = init_database(&db_path)
            .await
            .with_context(|| format!("Failed to open database {}", db_path.display()))?;
        info!("✓ Connected to database");
        Arc::new(SqliteStore::new(pool))
    };

    let state = AppState::new(store, admin_token_sha256, approval_policy);
    let app = build_router(state);

    let bind_address = args
        .bind_address
        .or(toml_config.bind_address)
        .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());
    let port = args.port.or(toml_config.port).unwrap_or(DEFAULT_PORT);
    let addr = format!("{}:{}", bind_address, port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("spellbook-server listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
