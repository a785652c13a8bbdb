//! Per-message delivery state.
//!
//! Redelivery is owned by the queue: a message that is not deleted becomes
//! visible again after its visibility timeout, and is moved to the dead-letter
//! queue once its receive count reaches the configured maximum. The consumer
//! only observes where a message sits in that lifecycle:
//!
//! ```text
//! Received ─► Processing ─┬─► Committed
//!                         ├─► Redelivered(n)   (n < max_receive_count)
//!                         └─► DeadLettered     (n ≥ max_receive_count)
//! ```

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DeliveryState {
  Received { receive_count: u32 },
  Processing,
  Committed,
  /// Left unacknowledged; the queue will deliver it again. Carries the number
  /// of receives so far.
  Redelivered { receive_count: u32 },
  /// Left unacknowledged on its final permitted receive; the queue moves it to
  /// the dead-letter queue instead of delivering it again.
  DeadLettered,
}

impl DeliveryState {
  /// Where a message goes after a failed processing attempt on its
  /// `receive_count`-th receive.
  pub fn after_failure(receive_count: u32, max_receive_count: u32) -> Self {
    if receive_count >= max_receive_count {
      Self::DeadLettered
    } else {
      Self::Redelivered { receive_count }
    }
  }

  pub fn is_terminal(self) -> bool { matches!(self, Self::Committed | Self::DeadLettered) }
}

impl fmt::Display for DeliveryState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Received { receive_count } => write!(f, "received({receive_count})"),
      Self::Processing => f.write_str("processing"),
      Self::Committed => f.write_str("committed"),
      Self::Redelivered { receive_count } => write!(f, "redelivered({receive_count})"),
      Self::DeadLettered => f.write_str("dead_lettered"),
    }
  }
}
