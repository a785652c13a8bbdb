//! Runtime configuration.
//!
//! Loaded once at startup from an optional TOML file layered with `TREMITI_*`
//! environment variables (`__` separates nested keys, e.g.
//! `TREMITI_QUEUES__BATCH_SIZE=25`).

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use serde::Deserialize;
use tremiti_ingest::SupplierEntry;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:               String,
  #[serde(default = "default_port")]
  pub port:               u16,
  /// The relational store. Leaving it unset runs the consumer with locally
  /// generated ids, which also requires `allow_degraded_ids`.
  #[serde(default)]
  pub primary_store_path: Option<PathBuf>,
  #[serde(default)]
  pub allow_degraded_ids: bool,
  pub item_store_path:    PathBuf,
  pub queue_path:         PathBuf,
  pub archive_root:       PathBuf,
  #[serde(default)]
  pub suppliers:          Vec<SupplierEntry>,
  #[serde(default)]
  pub queues:             QueueConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
  pub main:                    String,
  pub recovery:                String,
  pub dead_letter:             String,
  pub visibility_timeout_secs: u64,
  /// Receives before a main-queue message is redriven to the dead-letter
  /// queue.
  pub max_receive_count:       u32,
  /// Upper bound on messages per consumer batch, replay and reprocess run.
  pub batch_size:              usize,
  pub poll_interval_ms:        u64,
}

impl Default for QueueConfig {
  fn default() -> Self {
    Self {
      main:                    "tickets".into(),
      recovery:                "tickets-recovery".into(),
      dead_letter:             "tickets-dlq".into(),
      visibility_timeout_secs: 30,
      max_receive_count:       5,
      batch_size:              10,
      poll_interval_ms:        1000,
    }
  }
}

impl QueueConfig {
  pub fn visibility_timeout(&self) -> Duration { Duration::from_secs(self.visibility_timeout_secs) }

  pub fn poll_interval(&self) -> Duration { Duration::from_millis(self.poll_interval_ms) }
}

fn default_host() -> String { "127.0.0.1".into() }

fn default_port() -> u16 { 8080 }

impl ServerConfig {
  /// Read `path` (if it exists) and the environment.
  pub fn load(path: &Path) -> Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix("TREMITI")
          .prefix_separator("_")
          .separator("__")
          .try_parsing(true),
      )
      .build()?;
    Self::from_settings(settings)
  }

  pub fn from_toml(toml: &str) -> Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from_str(toml, config::FileFormat::Toml))
      .build()?;
    Self::from_settings(settings)
  }

  fn from_settings(settings: config::Config) -> Result<Self> {
    let mut cfg: Self = settings.try_deserialize()?;
    cfg.primary_store_path = cfg.primary_store_path.as_deref().map(expand_tilde);
    cfg.item_store_path = expand_tilde(&cfg.item_store_path);
    cfg.queue_path = expand_tilde(&cfg.queue_path);
    cfg.archive_root = expand_tilde(&cfg.archive_root);
    cfg.check()?;
    Ok(cfg)
  }

  fn check(&self) -> Result<()> {
    if self.primary_store_path.is_none() && !self.allow_degraded_ids {
      return Err(Error::DegradedNotAllowed);
    }
    if self.queues.batch_size == 0 {
      return Err(Error::InvalidSetting("queues.batch_size must be at least 1".into()));
    }
    if self.queues.max_receive_count == 0 {
      return Err(Error::InvalidSetting("queues.max_receive_count must be at least 1".into()));
    }
    let names = [&self.queues.main, &self.queues.recovery, &self.queues.dead_letter];
    if names[0] == names[1] || names[0] == names[2] || names[1] == names[2] {
      return Err(Error::InvalidSetting("queue names must be distinct".into()));
    }
    Ok(())
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use super::*;

  const BASE: &str = r#"
    item_store_path = "/var/lib/tremiti/items.db"
    queue_path      = "/var/lib/tremiti/queues.db"
    archive_root    = "/var/lib/tremiti/archive"
  "#;

  #[test]
  fn full_config_parses() {
    let cfg = ServerConfig::from_toml(&format!(
      r#"{BASE}
      host               = "0.0.0.0"
      port               = 9000
      primary_store_path = "/var/lib/tremiti/primary.db"

      [[suppliers]]
      name         = "nlg"
      id           = 1
      token_sha256 = "00"

      [queues]
      batch_size        = 25
      max_receive_count = 3
      "#
    ))
    .unwrap();

    assert_eq!(cfg.address(), "0.0.0.0:9000");
    assert_eq!(cfg.suppliers.len(), 1);
    assert_eq!(cfg.suppliers[0].id.0, 1);
    assert_eq!(cfg.queues.batch_size, 25);
    assert_eq!(cfg.queues.max_receive_count, 3);
    // Unset queue keys keep their defaults.
    assert_eq!(cfg.queues.main, "tickets");
    assert_eq!(cfg.queues.visibility_timeout(), Duration::from_secs(30));
  }

  #[test]
  fn missing_primary_requires_acknowledgement() {
    let err = ServerConfig::from_toml(BASE).unwrap_err();
    assert!(matches!(err, Error::DegradedNotAllowed));

    let cfg = ServerConfig::from_toml(&format!("allow_degraded_ids = true\n{BASE}")).unwrap();
    assert!(cfg.primary_store_path.is_none());
    assert_eq!(cfg.address(), "127.0.0.1:8080");
  }

  #[test]
  fn zero_batch_size_is_rejected() {
    let err = ServerConfig::from_toml(&format!(
      "allow_degraded_ids = true\n{BASE}\n[queues]\nbatch_size = 0\n"
    ))
    .unwrap_err();
    assert!(matches!(err, Error::InvalidSetting(_)));
  }
}
