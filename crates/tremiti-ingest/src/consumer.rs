//! The Queue Consumer.
//!
//! Commits each queued ticket to the primary store, the secondary store and
//! the archive, strictly in that order. The primary store's `(date, number)`
//! constraint is the only deduplication authority: a redelivered or duplicate
//! message resolves to the id already assigned, the secondary write is
//! conditional on that id, and the archive gets a fresh object per physical
//! commit. Every step is therefore safe to re-run.
//!
//! A message is acknowledged only after all three writes succeed. Any failure
//! leaves it on the queue, whose redelivery and dead-letter redrive take over.

use std::sync::{
  Arc,
  atomic::{AtomicI64, Ordering},
};

use chrono::Utc;
use tremiti_core::{
  archive::{ArchiveKey, ArchiveMetadata, ArchiveRecord},
  delivery::DeliveryState,
  queue::{QueueMessage, TicketQueue},
  store::{ArchiveStore, Insertion, PrimaryStore, PutOutcome, SecondaryStore},
  ticket::{TicketId, TicketItem, TicketMessage},
};
use uuid::Uuid;

use crate::error::ProcessError;

/// Written into the archive metadata's `source`.
pub const DEFAULT_SOURCE: &str = "ticket-consumer";

/// How a committed ticket got its id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdSource {
  /// Freshly assigned by the primary store.
  Assigned,
  /// The primary store already held this `(date, number)`.
  Existing,
  /// No primary store configured; a local timestamp id.
  Degraded,
}

/// Last degraded id handed out in this process.
static LAST_DEGRADED_ID: AtomicI64 = AtomicI64::new(0);

/// Millisecond timestamp, bumped past the previous id so that tickets
/// committed within the same millisecond still get distinct ids.
fn next_degraded_id() -> i64 {
  let now = Utc::now().timestamp_millis();
  match LAST_DEGRADED_ID.fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
    Some(now.max(last + 1))
  }) {
    Ok(last) | Err(last) => now.max(last + 1),
  }
}

#[derive(Debug, Clone)]
pub struct Committed {
  pub message_id:  String,
  pub ticket_id:   TicketId,
  pub number:      String,
  pub archive_key: ArchiveKey,
  pub id_source:   IdSource,
}

#[derive(Debug)]
pub struct MessageFailure {
  pub message_id:    String,
  pub receive_count: u32,
  pub state:         DeliveryState,
  pub error:         ProcessError,
}

/// Per-message outcome of [`Consumer::process_batch`].
#[derive(Debug, Default)]
pub struct BatchReport {
  pub committed: Vec<Committed>,
  pub failures:  Vec<MessageFailure>,
}

impl BatchReport {
  pub fn is_empty(&self) -> bool { self.committed.is_empty() && self.failures.is_empty() }
}

pub struct Consumer<P, S, A> {
  primary:           Option<Arc<P>>,
  secondary:         Arc<S>,
  archive:           Arc<A>,
  max_receive_count: u32,
  source:            String,
}

impl<P, S, A> Consumer<P, S, A>
where
  P: PrimaryStore,
  S: SecondaryStore,
  A: ArchiveStore,
{
  /// `primary = None` runs in degraded mode: ids are generated locally and
  /// nothing enforces `(date, number)` uniqueness.
  pub fn new(
    primary: Option<Arc<P>>,
    secondary: Arc<S>,
    archive: Arc<A>,
    max_receive_count: u32,
  ) -> Self {
    Self {
      primary,
      secondary,
      archive,
      max_receive_count,
      source: DEFAULT_SOURCE.to_owned(),
    }
  }

  pub fn with_source(mut self, source: impl Into<String>) -> Self {
    self.source = source.into();
    self
  }

  /// Process a received batch against `queue`. Messages are handled
  /// independently; committed ones are deleted, failed ones are left for
  /// redelivery.
  pub async fn process_batch<Q: TicketQueue>(
    &self,
    queue: &Q,
    messages: Vec<QueueMessage>,
  ) -> BatchReport {
    let mut report = BatchReport::default();

    for message in messages {
      let received = DeliveryState::Received { receive_count: message.receive_count };
      tracing::debug!(message_id = %message.message_id, state = %received, "message received");
      tracing::trace!(message_id = %message.message_id, state = %DeliveryState::Processing);

      match self.process_message(&message).await {
        Ok(committed) => {
          if let Err(e) = queue.delete(&message.receipt).await {
            // Committed regardless; a redelivery resolves as a duplicate.
            tracing::warn!(
              message_id = %message.message_id,
              queue = queue.name(),
              error = %e,
              "committed message could not be deleted"
            );
          }
          report.committed.push(committed);
        }
        Err(error) => {
          let state = DeliveryState::after_failure(message.receive_count, self.max_receive_count);
          tracing::warn!(
            message_id = %message.message_id,
            receive_count = message.receive_count,
            %state,
            error = %error,
            "message processing failed; left unacknowledged"
          );
          report.failures.push(MessageFailure {
            message_id: message.message_id,
            receive_count: message.receive_count,
            state,
            error,
          });
        }
      }
    }

    if !report.is_empty() {
      tracing::info!(
        queue = queue.name(),
        committed = report.committed.len(),
        failed = report.failures.len(),
        "batch processed"
      );
    }
    report
  }

  /// Commit one message. Does not touch the queue.
  pub async fn process_message(&self, message: &QueueMessage) -> Result<Committed, ProcessError> {
    let ticket = TicketMessage::from_body(&message.body).map_err(ProcessError::Malformed)?;

    let (ticket_id, id_source) = self.resolve_id(&ticket).await?;

    let item = TicketItem::committed(ticket_id.clone(), &ticket, Uuid::new_v4());
    match self.secondary.put_if_absent(&item).await {
      Ok(PutOutcome::Written) => {}
      Ok(PutOutcome::AlreadyExists) => {
        tracing::debug!(%ticket_id, "secondary item already present");
      }
      Err(e) => return Err(ProcessError::Secondary(Box::new(e))),
    }

    let record = ArchiveRecord {
      item,
      metadata: ArchiveMetadata {
        processed_at: Utc::now(),
        message_id:   message.message_id.clone(),
        source:       self.source.clone(),
      },
    };
    let archive_key = record.key();
    self
      .archive
      .put_new(&archive_key, record.to_bytes()?)
      .await
      .map_err(|e| ProcessError::Archive(Box::new(e)))?;

    tracing::info!(
      message_id = %message.message_id,
      %ticket_id,
      ticket_number = %ticket.number,
      %archive_key,
      "ticket committed"
    );

    Ok(Committed {
      message_id: message.message_id.clone(),
      ticket_id,
      number: ticket.number,
      archive_key,
      id_source,
    })
  }

  async fn resolve_id(&self, ticket: &TicketMessage) -> Result<(TicketId, IdSource), ProcessError> {
    let Some(primary) = &self.primary else {
      let id = TicketId::from(next_degraded_id());
      tracing::warn!(
        ticket_id = %id,
        ticket_number = %ticket.number,
        "no primary store; using a degraded local id"
      );
      return Ok((id, IdSource::Degraded));
    };

    let insertion = primary
      .insert_ticket(&ticket.new_ticket())
      .await
      .map_err(|e| ProcessError::Primary(Box::new(e)))?;

    match insertion {
      Insertion::Created(id) => Ok((id, IdSource::Assigned)),
      Insertion::Duplicate => {
        let existing = primary
          .find_id(ticket.date, &ticket.number)
          .await
          .map_err(|e| ProcessError::Primary(Box::new(e)))?;
        let Some(id) = existing else {
          return Err(ProcessError::DuplicateNotFound {
            date:   ticket.date,
            number: ticket.number.clone(),
          });
        };
        tracing::warn!(
          ticket_id = %id,
          ticket_number = %ticket.number,
          date = %ticket.date,
          "duplicate ticket; reusing existing id"
        );
        Ok((id, IdSource::Existing))
      }
    }
  }
}
