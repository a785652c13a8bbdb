//! Error types for `tremiti-core`.

use thiserror::Error;

/// Why an inbound ticket payload was rejected before it reached a queue.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
  #[error("payload must be a JSON object")]
  NotAnObject,

  #[error("missing fields: {}", .0.join(", "))]
  MissingFields(Vec<&'static str>),

  #[error("invalid date {0:?}: expected YYYY-MM-DD")]
  InvalidDate(String),

  #[error("number must be a non-empty string or an integer without '/'")]
  InvalidNumber,

  #[error("exemption must be an integer between 2 and 12")]
  InvalidExemption,
}

#[derive(Debug, Error)]
pub enum Error {
  #[error("validation error: {0}")]
  Validation(#[from] ValidationError),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
