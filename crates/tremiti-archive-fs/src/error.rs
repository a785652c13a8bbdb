//! Error type for `tremiti-archive-fs`.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid archive key: {0}")]
  InvalidKey(String),

  #[error("archive object already exists: {0}")]
  AlreadyExists(String),

  #[error("i/o error at {}: {}", .0.display(), .1)]
  Io(PathBuf, #[source] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
