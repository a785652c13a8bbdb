//! Dead-Letter Replay: move dead-lettered messages back onto the main queue,
//! byte for byte.

use std::sync::Arc;

use tremiti_core::queue::TicketQueue;

use crate::{drain::DrainReport, error::DrainError};

pub struct DeadLetterReplay<D, M> {
  dead_letter: Arc<D>,
  main:        Arc<M>,
  batch_size:  usize,
}

impl<D, M> DeadLetterReplay<D, M>
where
  D: TicketQueue,
  M: TicketQueue,
{
  pub fn new(dead_letter: Arc<D>, main: Arc<M>, batch_size: usize) -> Self {
    Self { dead_letter, main, batch_size }
  }

  /// Replay one batch. Each message is sent to the main queue and only then
  /// deleted from the dead-letter queue; a message whose send fails stays
  /// where it is.
  pub async fn run(&self) -> Result<DrainReport, DrainError> {
    let batch = self.dead_letter.receive(self.batch_size).await.map_err(|e| {
      DrainError::Receive { queue: self.dead_letter.name().to_owned(), source: Box::new(e) }
    })?;

    let mut report = DrainReport { seen: batch.len(), ..Default::default() };

    for message in batch {
      if let Err(e) = self.main.send(message.body).await {
        tracing::warn!(
          message_id = %message.message_id,
          queue = self.main.name(),
          error = %e,
          "dead-letter replay: send failed"
        );
        report.record_failure(&message.message_id, e);
        continue;
      }

      // Already on the main queue; a failed delete only means the message is
      // replayed again later, which the consumer absorbs.
      if let Err(e) = self.dead_letter.delete(&message.receipt).await {
        tracing::warn!(
          message_id = %message.message_id,
          queue = self.dead_letter.name(),
          error = %e,
          "dead-letter replay: delete failed after send"
        );
        report.record_failure(&message.message_id, e);
        continue;
      }

      report.record_success();
    }

    tracing::info!(
      queue = self.dead_letter.name(),
      seen = report.seen,
      succeeded = report.succeeded,
      failed = report.errors.len(),
      "dead-letter replay finished"
    );
    Ok(report)
  }
}
