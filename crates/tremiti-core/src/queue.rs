//! The `TicketQueue` trait and delivered-message types.
//!
//! Implemented by queue backends (e.g. `tremiti-store-sqlite`). The pipeline
//! depends only on this abstraction: send, receive a bounded batch, delete by
//! receipt. Visibility timeouts, receive counting and dead-letter redrive are
//! properties of the backend.

use std::{fmt, future::Future};

/// Opaque token proving a particular receive of a message; required to delete
/// it. A new handle is issued on every receive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReceiptHandle(String);

impl ReceiptHandle {
  pub fn new(handle: impl Into<String>) -> Self { Self(handle.into()) }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for ReceiptHandle {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

/// A message handed out by [`TicketQueue::receive`].
#[derive(Debug, Clone)]
pub struct QueueMessage {
  /// Stable for the life of the message, including across redrive.
  pub message_id:    String,
  pub receipt:       ReceiptHandle,
  pub body:          String,
  /// How many times this message has been received, this receive included.
  pub receive_count: u32,
}

pub trait TicketQueue: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Queue name, for logging.
  fn name(&self) -> &str;

  /// Enqueue `body` unchanged; returns the new message id.
  fn send(
    &self,
    body: String,
  ) -> impl Future<Output = Result<String, Self::Error>> + Send + '_;

  /// Receive up to `max_messages` currently visible messages. Returns an empty
  /// batch when nothing is visible; never waits.
  fn receive(
    &self,
    max_messages: usize,
  ) -> impl Future<Output = Result<Vec<QueueMessage>, Self::Error>> + Send + '_;

  /// Acknowledge a message. Deleting with a stale receipt is a no-op.
  fn delete<'a>(
    &'a self,
    receipt: &'a ReceiptHandle,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}
