//! FaceMark server binary.
//!
//! Reads `config.toml` (or the path given with `--config`), layers
//! `FACEMARK__*` environment variables on top, opens the SQLite store, and
//! serves the JSON API over HTTP.
//!
//! # Admin password hash
//!
//! To generate the argon2 PHC string for `admin_password_hash`:
//!
//! ```
//! cargo run -p facemark-server -- --hash-password
//! ```

mod settings;

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::Parser;
use facemark_api::{AdminCredentials, ApiConfig, AppState};
use facemark_attendance::{Dispatcher, PolicyAccess};
use facemark_mail::MailNotifier;
use facemark_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use settings::{ServerConfig, expand_tilde};

#[derive(Parser)]
#[command(author, version, about = "FaceMark attendance server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Print the argon2 hash for a password entered on stdin and exit.
  #[arg(long)]
  hash_password: bool,
}

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

  if cli.hash_password {
    let password = read_password()?;
    let hash = facemark_api::auth::hash_password(&password)
      .map_err(|e| anyhow::anyhow!("{e}"))?;
    println!("{hash}");
    return Ok(());
  }

  let cfg = ServerConfig::load(&cli.config)
    .with_context(|| format!("failed to load configuration from {:?}", cli.config))?;

  let store_path = expand_tilde(&cfg.store_path);
  let store = Arc::new(
    SqliteStore::open(&store_path)
      .await
      .with_context(|| format!("failed to open store at {store_path:?}"))?,
  );

  let policy = PolicyAccess::new(Arc::clone(&store))
    .get()
    .await
    .context("failed to load notification policy")?;
  tracing::info!(?policy, "notification policy");

  let notifier = MailNotifier::from_config(cfg.smtp.clone()).context("invalid SMTP settings")?;
  if let MailNotifier::Smtp(smtp) = &notifier {
    match smtp.test_connection().await {
      Ok(true) => tracing::info!("SMTP relay reachable"),
      Ok(false) => tracing::warn!("SMTP relay refused the test connection"),
      Err(e) => tracing::warn!(error = %e, "SMTP relay unreachable; sends will fail until it recovers"),
    }
  }
  let notifier = Arc::new(notifier);

  let (dispatcher, workers) = Dispatcher::spawn(
    Arc::clone(&store),
    Arc::clone(&notifier),
    cfg.dispatch.to_dispatch_config(),
  );

  let state = AppState::new(store, notifier, dispatcher, ApiConfig {
    admin:          AdminCredentials {
      username:      cfg.admin_username.clone(),
      password_hash: cfg.admin_password_hash.clone(),
    },
    cookie_name:    cfg.session_cookie.clone(),
    notify_timeout: cfg.dispatch.timeout(),
    session_ttl:    cfg.session_ttl(),
  });
  let app = facemark_api::router(state).layer(TraceLayer::new_for_http());

  let address = format!("{}:{}", cfg.host, cfg.port);
  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

  // The router, and with it every dispatcher handle, is gone; let the
  // workers finish what is queued.
  tracing::info!("draining confirmation queue");
  workers.join().await;
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(error = %e, "failed to listen for ctrl-c");
    std::future::pending::<()>().await;
  }
  tracing::info!("shutdown requested");
}

/// Read a password from stdin.
fn read_password() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  print!("Password: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  io::stdin().lock().read_line(&mut line)?;
  Ok(line.trim_end_matches(['\n', '\r']).to_string())
}
