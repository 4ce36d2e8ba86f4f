/// rpcd - federated storage RPC daemon
///
/// Hosts the configured gRPC services behind one listener with:
/// - token authentication and scope checks on every protected method
/// - plaintext, static or CA-issued transport credentials
/// - built-in health, reflection, metrics and read-only support
mod settings;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use grpc_server::{register_builtins, Registry, Server};
use std::path::PathBuf;
use tokio::signal;
use tracing::info;

/// Federated storage RPC daemon
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "RPCD_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    // rustls 0.23 requires selecting a CryptoProvider at runtime
    if let Err(err) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
        return Err(anyhow!("Unable to install TLS crypto provider: {:?}", err));
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "rpcd=info,grpc_server=info,info".into()),
        )
        .with_target(false)
        .json()
        .init();

    info!(config = ?args.config, "Starting rpcd");

    let settings = settings::load(args.config.as_deref()).context("Failed to load configuration")?;

    let mut registry = Registry::new();
    register_builtins(&mut registry);

    let server = Server::new(settings, &registry)
        .await
        .context("Failed to initialize server")?;

    let handle = server.handle();
    tokio::spawn(async move {
        shutdown_signal().await;
        handle.graceful_stop();
    });

    server.serve().await.context("gRPC server error")?;

    info!("rpcd shutdown complete");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
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
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }

    info!("Shutting down gracefully...");
}
