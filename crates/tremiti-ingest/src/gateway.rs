//! The Submission Gateway.
//!
//! `submit` resolves the supplier from the credential, validates the payload
//! and enqueues it on the main queue. When the main queue refuses the message
//! the gateway parks it on the recovery queue, annotated with the failure, and
//! reports [`SubmitOutcome::AcceptedForRetry`]. Only when both queues refuse
//! does the submission fail.

use std::sync::Arc;

use chrono::Utc;
use tremiti_core::{queue::TicketQueue, validate::validate};

use crate::{error::SubmitError, suppliers::SupplierDirectory};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
  /// On the main queue.
  Accepted { message_id: String },
  /// Parked on the recovery queue for later reprocessing.
  AcceptedForRetry { message_id: String },
}

impl SubmitOutcome {
  pub fn message_id(&self) -> &str {
    match self {
      Self::Accepted { message_id } | Self::AcceptedForRetry { message_id } => message_id,
    }
  }
}

pub struct Gateway<Q, R = Q> {
  suppliers: Arc<SupplierDirectory>,
  main:      Arc<Q>,
  recovery:  Option<Arc<R>>,
}

impl<Q, R> Clone for Gateway<Q, R> {
  fn clone(&self) -> Self {
    Self {
      suppliers: self.suppliers.clone(),
      main:      self.main.clone(),
      recovery:  self.recovery.clone(),
    }
  }
}

impl<Q, R> Gateway<Q, R>
where
  Q: TicketQueue,
  R: TicketQueue,
{
  pub fn new(suppliers: Arc<SupplierDirectory>, main: Arc<Q>, recovery: Option<Arc<R>>) -> Self {
    Self { suppliers, main, recovery }
  }

  /// Accept one submission. `credential` is the raw `Authorization` header
  /// value; `body` the raw request body.
  pub async fn submit(
    &self,
    credential: Option<&str>,
    body: &[u8],
  ) -> Result<SubmitOutcome, SubmitError> {
    let supplier = credential
      .and_then(|c| self.suppliers.resolve(c))
      .ok_or(SubmitError::Unauthorized)?;

    let payload: serde_json::Value =
      serde_json::from_slice(body).map_err(SubmitError::MalformedJson)?;
    let message = validate(&payload, supplier, Utc::now())?;
    let wire = message.to_body()?;

    let main_err = match self.main.send(wire).await {
      Ok(message_id) => {
        tracing::info!(
          queue = self.main.name(),
          %message_id,
          %supplier,
          ticket_number = %message.number,
          "ticket queued"
        );
        return Ok(SubmitOutcome::Accepted { message_id });
      }
      Err(e) => e,
    };

    let Some(recovery) = &self.recovery else {
      tracing::error!(
        queue = self.main.name(),
        ticket_number = %message.number,
        error = %main_err,
        "main queue refused ticket and no recovery queue is configured"
      );
      return Err(SubmitError::Enqueue(Box::new(main_err)));
    };

    tracing::warn!(
      queue = self.main.name(),
      recovery_queue = recovery.name(),
      ticket_number = %message.number,
      error = %main_err,
      "main queue refused ticket; routing to recovery queue"
    );

    let parked = message.for_recovery(main_err.to_string(), Utc::now()).to_body()?;
    match recovery.send(parked).await {
      Ok(message_id) => Ok(SubmitOutcome::AcceptedForRetry { message_id }),
      Err(recovery_err) => {
        tracing::error!(
          queue = recovery.name(),
          error = %recovery_err,
          main_error = %main_err,
          "recovery queue refused ticket; submission failed"
        );
        Err(SubmitError::Enqueue(Box::new(main_err)))
      }
    }
  }
}
