//! Startup errors for the server crate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("configuration error: {0}")]
  Config(#[from] config::ConfigError),

  #[error(
    "primary_store_path is not set; set allow_degraded_ids = true to run with locally generated \
     ticket ids"
  )]
  DegradedNotAllowed,

  #[error("invalid setting: {0}")]
  InvalidSetting(String),

  #[error("supplier table: {0}")]
  Suppliers(#[from] tremiti_ingest::DirectoryError),

  #[error("sqlite: {0}")]
  Sqlite(#[from] tremiti_store_sqlite::Error),

  #[error("archive: {0}")]
  Archive(#[from] tremiti_archive_fs::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
