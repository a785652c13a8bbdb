//! tremiti-server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens the
//! SQLite stores, queue broker and archive, serves the HTTP API and runs the
//! queue consumer until Ctrl+C or SIGTERM.
//!
//! # Supplier token digests
//!
//! To generate the `token_sha256` value for a `[[suppliers]]` entry:
//!
//! ```text
//! cargo run -p tremiti-server --bin server -- --hash-token
//! ```

use std::{path::PathBuf, time::Duration};

use anyhow::Context as _;
use clap::Parser;
use tokio::{net::TcpListener, sync::watch};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use tremiti_ingest::SupplierDirectory;
use tremiti_server::{ServerConfig, Services, worker};

#[derive(Parser)]
#[command(author, version, about = "Tremiti ticket ingestion server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Print the SHA-256 digest of a supplier token entered on stdin and exit.
  #[arg(long)]
  hash_token: bool,
}

/// How long the consumer gets to finish its batch after shutdown is signalled.
const WORKER_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  if cli.hash_token {
    let token = read_token()?;
    println!("{}", SupplierDirectory::hash_token(&token));
    return Ok(());
  }

  let cfg = ServerConfig::load(&cli.config)
    .with_context(|| format!("failed to load configuration from {:?}", cli.config))?;

  let services = Services::open(&cfg).await.context("failed to open backends")?;

  let (shutdown_tx, shutdown_rx) = watch::channel(false);
  let consumer = tokio::spawn(worker::run_consumer(
    services.consumer.clone(),
    services.main.clone(),
    cfg.queues.batch_size,
    cfg.queues.poll_interval(),
    shutdown_rx,
  ));

  let address = cfg.address();
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;
  tracing::info!("Listening on http://{address}");

  axum::serve(listener, services.router())
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

  tracing::info!("HTTP server stopped; stopping consumer");
  let _ = shutdown_tx.send(true);
  match tokio::time::timeout(WORKER_GRACE, consumer).await {
    Ok(Ok(())) => {}
    Ok(Err(e)) => tracing::warn!(error = %e, "consumer task failed"),
    Err(_) => tracing::warn!("consumer shutdown timed out"),
  }

  services.close().await.context("failed to close backends")?;
  tracing::info!("shutdown complete");
  Ok(())
}

async fn shutdown_signal() {
  use tokio::signal;

  let ctrl_c = async {
    if let Err(e) = signal::ctrl_c().await {
      tracing::error!(error = %e, "failed to listen for Ctrl+C");
      std::future::pending::<()>().await;
    }
  };

  #[cfg(unix)]
  let terminate = async {
    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
      Ok(mut sig) => {
        sig.recv().await;
      }
      Err(e) => {
        tracing::error!(error = %e, "failed to install SIGTERM handler");
        std::future::pending::<()>().await;
      }
    }
  };

  #[cfg(not(unix))]
  let terminate = std::future::pending::<()>();

  tokio::select! {
    () = ctrl_c => tracing::info!("received Ctrl+C"),
    () = terminate => tracing::info!("received SIGTERM"),
  }
}

/// Read a token from stdin.
fn read_token() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  print!("Token: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  io::stdin().lock().read_line(&mut line)?;
  let token = line.trim().to_owned();
  anyhow::ensure!(!token.is_empty(), "empty token");
  Ok(token)
}
