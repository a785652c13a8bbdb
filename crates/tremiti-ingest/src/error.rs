//! Error types for `tremiti-ingest`.
//!
//! Backend errors arrive as associated `Error` types of the storage traits and
//! are boxed here so the pipeline's own taxonomy stays backend-agnostic.

use chrono::NaiveDate;
use thiserror::Error;
use tremiti_core::{ValidationError, ticket::TicketId};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Why a submission was not accepted.
#[derive(Debug, Error)]
pub enum SubmitError {
  /// Missing or unknown credential.
  #[error("unauthorized")]
  Unauthorized,

  #[error("malformed JSON payload: {0}")]
  MalformedJson(#[source] serde_json::Error),

  #[error(transparent)]
  Validation(#[from] ValidationError),

  #[error("serialization error: {0}")]
  Serialization(#[from] tremiti_core::Error),

  /// The main queue refused the message and it could not be parked on the
  /// recovery queue either. Carries the main queue's error.
  #[error("enqueue failed: {0}")]
  Enqueue(#[source] BoxError),
}

/// A failure that leaves a queue message unacknowledged.
#[derive(Debug, Error)]
pub enum ProcessError {
  /// The body does not parse. Permanent: it will dead-letter.
  #[error("malformed message: {0}")]
  Malformed(#[source] tremiti_core::Error),

  #[error("primary store: {0}")]
  Primary(#[source] BoxError),

  /// The primary store reported a duplicate but the row could not be read
  /// back.
  #[error("primary store: duplicate ({date}, {number}) not found on lookup")]
  DuplicateNotFound { date: NaiveDate, number: String },

  #[error("secondary store: {0}")]
  Secondary(#[source] BoxError),

  #[error("archive: {0}")]
  Archive(#[source] BoxError),

  #[error("serialization error: {0}")]
  Serialization(#[from] tremiti_core::Error),
}

/// Failure of a drain run as a whole. Per-message failures are reported in
/// the [`crate::DrainReport`] instead.
#[derive(Debug, Error)]
pub enum DrainError {
  #[error("receive from {queue} failed: {source}")]
  Receive {
    queue:  String,
    #[source]
    source: BoxError,
  },
}

#[derive(Debug, Error)]
pub enum DeskError {
  #[error("ticket {0} not found")]
  NotFound(TicketId),

  #[error("secondary store: {0}")]
  Secondary(#[source] BoxError),
}
