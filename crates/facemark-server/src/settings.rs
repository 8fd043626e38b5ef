//! Runtime configuration, deserialised from `config.toml` and `FACEMARK__*`
//! environment variables.

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use facemark_attendance::DispatchConfig;
use facemark_mail::SmtpConfig;
use serde::Deserialize;

fn default_host() -> String { "127.0.0.1".into() }

fn default_port() -> u16 { 5000 }

fn default_store_path() -> PathBuf { PathBuf::from("facemark.db") }

fn default_admin_username() -> String { "admin".into() }

fn default_session_cookie() -> String { "facemark_session".into() }

fn default_session_ttl_secs() -> u64 { facemark_api::DEFAULT_SESSION_TTL.as_secs() }

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                String,
  #[serde(default = "default_port")]
  pub port:                u16,
  #[serde(default = "default_store_path")]
  pub store_path:          PathBuf,
  #[serde(default = "default_admin_username")]
  pub admin_username:      String,
  /// PHC string from `--hash-password`.
  pub admin_password_hash: String,
  #[serde(default = "default_session_cookie")]
  pub session_cookie:      String,
  /// Seconds a login stays valid.
  #[serde(default = "default_session_ttl_secs")]
  pub session_ttl_secs:    u64,
  #[serde(default)]
  pub dispatch:            DispatchSettings,
  /// Without a relay, notifications are only logged.
  #[serde(default)]
  pub smtp:                Option<SmtpConfig>,
}

/// Confirmation worker pool and notifier timeout.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DispatchSettings {
  pub workers:        usize,
  pub queue_capacity: usize,
  pub timeout_secs:   u64,
}

impl Default for DispatchSettings {
  fn default() -> Self {
    let defaults = DispatchConfig::default();
    Self {
      workers:        defaults.workers,
      queue_capacity: defaults.queue_capacity,
      timeout_secs:   defaults.timeout.as_secs(),
    }
  }
}

impl DispatchSettings {
  pub fn timeout(&self) -> Duration { Duration::from_secs(self.timeout_secs) }

  pub fn to_dispatch_config(&self) -> DispatchConfig {
    DispatchConfig {
      workers:        self.workers,
      queue_capacity: self.queue_capacity,
      timeout:        self.timeout(),
    }
  }
}

impl ServerConfig {
  pub fn session_ttl(&self) -> Duration { Duration::from_secs(self.session_ttl_secs) }

  /// Reject values that deserialise but would disable the server's behaviour.
  pub fn validate(&self) -> anyhow::Result<()> {
    anyhow::ensure!(self.dispatch.timeout_secs > 0, "dispatch.timeout_secs must be at least 1");
    anyhow::ensure!(self.dispatch.workers > 0, "dispatch.workers must be at least 1");
    anyhow::ensure!(self.dispatch.queue_capacity > 0, "dispatch.queue_capacity must be at least 1");
    anyhow::ensure!(self.session_ttl_secs > 0, "session_ttl_secs must be at least 1");
    Ok(())
  }

  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix("FACEMARK")
          .separator("__")
          .try_parsing(true),
      )
      .build()?;
    let cfg: Self = settings.try_deserialize()?;
    cfg.validate()?;
    Ok(cfg)
  }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
