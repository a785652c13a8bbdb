//! [`SqliteQueueBroker`] — durable named queues on a single SQLite file.
//!
//! Semantics follow a visibility-timeout queue:
//!
//! - `send` appends a message that is immediately visible.
//! - `receive` hands out visible messages oldest first, bumps their receive
//!   count, issues a fresh receipt handle and hides them for the queue's
//!   visibility timeout. A message that is not deleted before the timeout
//!   elapses becomes visible again.
//! - With a [`RedrivePolicy`], a message that has already been received
//!   `max_receive_count` times is moved to the dead-letter queue on its next
//!   receive instead of being delivered again.
//! - `delete` removes a message by its latest receipt handle.

use std::{path::Path, sync::Arc, time::Duration};

use chrono::Utc;
use tremiti_core::queue::{QueueMessage, ReceiptHandle, TicketQueue};
use uuid::Uuid;

use crate::{Result, schema::QUEUE_SCHEMA};

/// Where messages go once they exhaust their receives.
#[derive(Debug, Clone)]
pub struct RedrivePolicy {
  pub dead_letter_queue: String,
  pub max_receive_count: u32,
}

#[derive(Debug, Clone)]
pub struct QueueSettings {
  pub visibility_timeout: Duration,
  pub redrive:            Option<RedrivePolicy>,
}

impl Default for QueueSettings {
  fn default() -> Self {
    Self { visibility_timeout: Duration::from_secs(30), redrive: None }
  }
}

/// Owns the queue database connection and hands out [`SqliteQueue`] handles.
#[derive(Clone)]
pub struct SqliteQueueBroker {
  conn: tokio_rusqlite::Connection,
}

impl SqliteQueueBroker {
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let broker = Self { conn };
    broker.init_schema().await?;
    Ok(broker)
  }

  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let broker = Self { conn };
    broker.init_schema().await?;
    Ok(broker)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(QUEUE_SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// A handle to the queue called `name`. Queues need no declaration; the
  /// settings apply to receives made through this handle.
  pub fn queue(&self, name: impl Into<String>, settings: QueueSettings) -> SqliteQueue {
    SqliteQueue {
      conn: self.conn.clone(),
      name: Arc::from(name.into()),
      settings: Arc::new(settings),
    }
  }

  /// Close the connection. Queue handles created from this broker fail
  /// afterwards.
  pub async fn close(self) -> Result<()> {
    self.conn.close().await?;
    Ok(())
  }
}

/// One named queue within a [`SqliteQueueBroker`].
#[derive(Clone)]
pub struct SqliteQueue {
  conn:     tokio_rusqlite::Connection,
  name:     Arc<str>,
  settings: Arc<QueueSettings>,
}

fn now_ms() -> i64 { Utc::now().timestamp_millis() }

impl TicketQueue for SqliteQueue {
  type Error = crate::Error;

  fn name(&self) -> &str { &self.name }

  async fn send(&self, body: String) -> Result<String> {
    let message_id = Uuid::new_v4().hyphenated().to_string();
    let id         = message_id.clone();
    let queue      = self.name.to_string();
    let now        = now_ms();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO queue_messages (message_id, queue, body, sent_at_ms, visible_at_ms)
           VALUES (?1, ?2, ?3, ?4, ?4)",
          rusqlite::params![id, queue, body, now],
        )?;
        Ok(())
      })
      .await?;

    Ok(message_id)
  }

  async fn receive(&self, max_messages: usize) -> Result<Vec<QueueMessage>> {
    let queue   = self.name.to_string();
    let limit   = i64::try_from(max_messages).unwrap_or(i64::MAX);
    let hide_ms = i64::try_from(self.settings.visibility_timeout.as_millis()).unwrap_or(i64::MAX);
    let redrive = self.settings.redrive.clone();
    let now     = now_ms();

    let (delivered, redriven) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let candidates: Vec<(i64, String, String, u32)> = {
          let mut stmt = tx.prepare(
            "SELECT seq, message_id, body, receive_count FROM queue_messages
             WHERE queue = ?1 AND visible_at_ms <= ?2
             ORDER BY seq
             LIMIT ?3",
          )?;
          stmt
            .query_map(rusqlite::params![queue, now, limit], |row| {
              Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };

        let mut delivered = Vec::with_capacity(candidates.len());
        let mut redriven = Vec::new();

        for (seq, message_id, body, receive_count) in candidates {
          if let Some(policy) = &redrive
            && receive_count >= policy.max_receive_count
          {
            tx.execute(
              "UPDATE queue_messages
               SET queue = ?1, visible_at_ms = ?2, receive_count = 0, receipt_handle = NULL
               WHERE seq = ?3",
              rusqlite::params![policy.dead_letter_queue, now, seq],
            )?;
            redriven.push((message_id, receive_count));
            continue;
          }

          let receipt = Uuid::new_v4().hyphenated().to_string();
          let receive_count = receive_count + 1;
          tx.execute(
            "UPDATE queue_messages
             SET receive_count = ?1, visible_at_ms = ?2, receipt_handle = ?3
             WHERE seq = ?4",
            rusqlite::params![receive_count, now.saturating_add(hide_ms), receipt, seq],
          )?;
          delivered.push(QueueMessage {
            message_id,
            receipt: ReceiptHandle::new(receipt),
            body,
            receive_count,
          });
        }

        tx.commit()?;
        Ok((delivered, redriven))
      })
      .await?;

    if let Some(policy) = &self.settings.redrive {
      for (message_id, receive_count) in redriven {
        tracing::warn!(
          queue = %self.name,
          dead_letter_queue = %policy.dead_letter_queue,
          %message_id,
          receive_count,
          "message exhausted its receives; moved to dead-letter queue"
        );
      }
    }

    Ok(delivered)
  }

  async fn delete(&self, receipt: &ReceiptHandle) -> Result<()> {
    let queue   = self.name.to_string();
    let handle  = receipt.as_str().to_owned();

    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM queue_messages WHERE queue = ?1 AND receipt_handle = ?2",
          rusqlite::params![queue, handle],
        )?)
      })
      .await?;

    if deleted == 0 {
      tracing::debug!(queue = %self.name, %receipt, "delete with stale receipt ignored");
    }
    Ok(())
  }
}
