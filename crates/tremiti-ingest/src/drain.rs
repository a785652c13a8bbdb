//! The report shared by the queue-draining operations.

use serde::Serialize;

/// Outcome of one drain run. An empty queue yields all zeros.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
  pub seen:      usize,
  pub succeeded: usize,
  pub errors:    Vec<DrainFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DrainFailure {
  #[serde(rename = "messageId")]
  pub message_id: String,
  pub error:      String,
}

impl DrainReport {
  pub(crate) fn record_success(&mut self) { self.succeeded += 1; }

  pub(crate) fn record_failure(&mut self, message_id: &str, error: impl ToString) {
    self.errors.push(DrainFailure { message_id: message_id.to_owned(), error: error.to_string() });
  }
}
