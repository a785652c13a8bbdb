//! Recovery Reprocessor: return parked submissions to the main queue.

use std::sync::Arc;

use chrono::Utc;
use tremiti_core::{queue::TicketQueue, ticket::TicketMessage};

use crate::{drain::DrainReport, error::DrainError};

pub struct RecoveryReprocessor<R, M> {
  recovery:   Arc<R>,
  main:       Arc<M>,
  batch_size: usize,
}

impl<R, M> RecoveryReprocessor<R, M>
where
  R: TicketQueue,
  M: TicketQueue,
{
  pub fn new(recovery: Arc<R>, main: Arc<M>, batch_size: usize) -> Self {
    Self { recovery, main, batch_size }
  }

  /// Reprocess one batch. Each message has its gateway annotations stripped,
  /// its `retryAttempt` incremented and `reprocessedAt` stamped before it is
  /// sent on. Bodies that do not parse are reported and left in place.
  pub async fn run(&self) -> Result<DrainReport, DrainError> {
    let batch = self.recovery.receive(self.batch_size).await.map_err(|e| {
      DrainError::Receive { queue: self.recovery.name().to_owned(), source: Box::new(e) }
    })?;

    let mut report = DrainReport { seen: batch.len(), ..Default::default() };

    for message in batch {
      let cleaned = TicketMessage::from_body(&message.body)
        .and_then(|m| m.reprocessed(Utc::now()).to_body());
      let body = match cleaned {
        Ok(body) => body,
        Err(e) => {
          tracing::warn!(
            message_id = %message.message_id,
            queue = self.recovery.name(),
            error = %e,
            "recovery reprocess: unreadable message left in place"
          );
          report.record_failure(&message.message_id, e);
          continue;
        }
      };

      if let Err(e) = self.main.send(body).await {
        tracing::warn!(
          message_id = %message.message_id,
          queue = self.main.name(),
          error = %e,
          "recovery reprocess: send failed"
        );
        report.record_failure(&message.message_id, e);
        continue;
      }

      if let Err(e) = self.recovery.delete(&message.receipt).await {
        tracing::warn!(
          message_id = %message.message_id,
          queue = self.recovery.name(),
          error = %e,
          "recovery reprocess: delete failed after send"
        );
        report.record_failure(&message.message_id, e);
        continue;
      }

      report.record_success();
    }

    tracing::info!(
      queue = self.recovery.name(),
      seen = report.seen,
      succeeded = report.succeeded,
      failed = report.errors.len(),
      "recovery reprocess finished"
    );
    Ok(report)
  }
}

#[cfg(test)]
mod tests {
  use serde_json::{Value, json};

  use super::*;
  use crate::testing::MemoryQueue;

  fn queues() -> (Arc<MemoryQueue>, Arc<MemoryQueue>) {
    (Arc::new(MemoryQueue::new("recovery")), Arc::new(MemoryQueue::new("main")))
  }

  #[tokio::test]
  async fn strips_annotations_and_increments_attempt() {
    let (recovery, main) = queues();
    recovery
      .send(
        json!({
          "date": "2025-06-15",
          "number": "TEST000123",
          "supplier": 1,
          "created_at": "2025-06-15T08:00:00Z",
          "exemption": 7,
          "retryAttempt": 0,
          "originalError": "main unavailable",
          "failedAt": "2025-06-15T08:00:00Z",
        })
        .to_string(),
      )
      .await
      .unwrap();

    let report = RecoveryReprocessor::new(recovery.clone(), main.clone(), 10).run().await.unwrap();
    assert_eq!((report.seen, report.succeeded), (1, 1));
    assert_eq!(recovery.len(), 0);

    let sent: Value = serde_json::from_str(&main.bodies()[0]).unwrap();
    assert_eq!(sent["retryAttempt"], json!(1));
    assert!(sent.get("originalError").is_none());
    assert!(sent.get("failedAt").is_none());
    assert!(sent.get("reprocessedAt").is_some());
    assert_eq!(sent["number"], json!("TEST000123"));
    assert_eq!(sent["exemption"], json!(7));
    assert_eq!(sent["created_at"], json!("2025-06-15T08:00:00Z"));
  }

  #[tokio::test]
  async fn absent_attempt_counts_from_zero() {
    let (recovery, main) = queues();
    recovery
      .send(r#"{"date":"2025-06-15","number":"A1","supplier":2,"created_at":"2025-06-15T08:00:00Z"}"#
        .into())
      .await
      .unwrap();

    RecoveryReprocessor::new(recovery, main.clone(), 10).run().await.unwrap();
    let sent: Value = serde_json::from_str(&main.bodies()[0]).unwrap();
    assert_eq!(sent["retryAttempt"], json!(1));
  }

  #[tokio::test]
  async fn unreadable_body_is_reported_and_kept() {
    let (recovery, main) = queues();
    let id = recovery.send("garbage".into()).await.unwrap();
    recovery
      .send(r#"{"date":"2025-06-15","number":"A1","supplier":2,"created_at":"2025-06-15T08:00:00Z"}"#
        .into())
      .await
      .unwrap();

    let report = RecoveryReprocessor::new(recovery.clone(), main.clone(), 10).run().await.unwrap();
    assert_eq!(report.seen, 2);
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.errors[0].message_id, id);
    assert_eq!(recovery.bodies(), ["garbage"]);
    assert_eq!(main.len(), 1);
  }

  #[tokio::test]
  async fn failed_send_keeps_message() {
    let recovery = Arc::new(MemoryQueue::new("recovery"));
    let main = Arc::new(MemoryQueue::failing("main"));
    recovery
      .send(r#"{"date":"2025-06-15","number":"A1","supplier":2,"created_at":"2025-06-15T08:00:00Z"}"#
        .into())
      .await
      .unwrap();

    let report = RecoveryReprocessor::new(recovery.clone(), main, 10).run().await.unwrap();
    assert_eq!(report.succeeded, 0);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(recovery.len(), 1);
  }
}
