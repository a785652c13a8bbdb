//! Ticket types — the unit of work flowing through the ingestion pipeline.
//!
//! A ticket enters as a [`TicketMessage`] (the queue wire format), is
//! committed to the primary store as a [`NewTicket`], and is mirrored into the
//! secondary store as a [`TicketItem`] carrying the primary-assigned
//! [`TicketId`].

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::{Result, ValidationError};

// ─── Identifiers ─────────────────────────────────────────────────────────────

/// A transport supplier, resolved server-side from the caller's credential.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SupplierId(pub u8);

impl fmt::Display for SupplierId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { self.0.fmt(f) }
}

/// The authoritative ticket identifier, assigned once by the primary store.
/// Every downstream store uses it verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketId(String);

impl TicketId {
  pub fn new(id: impl Into<String>) -> Self { Self(id.into()) }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl From<i64> for TicketId {
  fn from(id: i64) -> Self { Self(id.to_string()) }
}

impl fmt::Display for TicketId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

/// A fare exemption category. Only values in `[2, 12]` can be constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Exemption(u8);

impl Exemption {
  pub const MIN: u8 = 2;
  pub const MAX: u8 = 12;

  pub fn get(self) -> u8 { self.0 }
}

impl TryFrom<i64> for Exemption {
  type Error = ValidationError;

  fn try_from(value: i64) -> Result<Self, Self::Error> {
    match u8::try_from(value) {
      Ok(v) if (Self::MIN..=Self::MAX).contains(&v) => Ok(Self(v)),
      _ => Err(ValidationError::InvalidExemption),
    }
  }
}

impl From<Exemption> for i64 {
  fn from(e: Exemption) -> Self { i64::from(e.0) }
}

// ─── Ticket number ───────────────────────────────────────────────────────────

/// Suppliers send the ticket number either as a string or as an integer.
/// Downstream it is always a string.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawNumber {
  Text(String),
  Int(i64),
}

fn number_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
  D: Deserializer<'de>,
{
  Ok(match RawNumber::deserialize(deserializer)? {
    RawNumber::Text(s) => s,
    RawNumber::Int(n) => n.to_string(),
  })
}

/// Normalise a raw `number` value from a submission payload.
///
/// The number becomes a path segment of the archive key, so it must be
/// non-empty and must not contain `/`.
pub fn normalize_number(
  value: &serde_json::Value,
) -> Result<String, ValidationError> {
  let number = match value {
    serde_json::Value::String(s) => s.trim().to_owned(),
    serde_json::Value::Number(n) if n.is_i64() || n.is_u64() => n.to_string(),
    _ => return Err(ValidationError::InvalidNumber),
  };
  if number.is_empty() || number.contains('/') || number == "." || number == ".." {
    return Err(ValidationError::InvalidNumber);
  }
  Ok(number)
}

// ─── Queue message ───────────────────────────────────────────────────────────

/// The JSON body carried by the main, recovery and dead-letter queues.
///
/// The retry bookkeeping fields keep their camelCase wire names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketMessage {
  pub date:           NaiveDate,
  #[serde(deserialize_with = "number_as_string")]
  pub number:         String,
  pub supplier:       SupplierId,
  /// Stamped once by the gateway and carried unchanged through every queue.
  pub created_at:     DateTime<Utc>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub exemption:      Option<Exemption>,
  #[serde(rename = "retryAttempt", default, skip_serializing_if = "Option::is_none")]
  pub retry_attempt:  Option<u32>,
  #[serde(rename = "reprocessedAt", default, skip_serializing_if = "Option::is_none")]
  pub reprocessed_at: Option<DateTime<Utc>>,
  #[serde(rename = "originalError", default, skip_serializing_if = "Option::is_none")]
  pub original_error: Option<String>,
  #[serde(rename = "failedAt", default, skip_serializing_if = "Option::is_none")]
  pub failed_at:      Option<DateTime<Utc>>,
}

impl TicketMessage {
  /// Parse a queue message body.
  pub fn from_body(body: &str) -> Result<Self> { Ok(serde_json::from_str(body)?) }

  /// Serialise to a queue message body.
  pub fn to_body(&self) -> Result<String> { Ok(serde_json::to_string(self)?) }

  /// Annotate a submission that could not reach the main queue so it can be
  /// parked on the recovery queue.
  pub fn for_recovery(
    mut self,
    original_error: impl Into<String>,
    failed_at: DateTime<Utc>,
  ) -> Self {
    self.original_error = Some(original_error.into());
    self.retry_attempt = Some(0);
    self.failed_at = Some(failed_at);
    self
  }

  /// Strip the recovery annotations and count one more attempt.
  pub fn reprocessed(mut self, at: DateTime<Utc>) -> Self {
    self.original_error = None;
    self.failed_at = None;
    self.retry_attempt = Some(self.retry_attempt.unwrap_or(0) + 1);
    self.reprocessed_at = Some(at);
    self
  }

  /// The row inserted into the primary store.
  pub fn new_ticket(&self) -> NewTicket {
    NewTicket {
      supplier:   self.supplier,
      date:       self.date,
      number:     self.number.clone(),
      created_at: self.created_at,
      exemption:  self.exemption,
    }
  }
}

// ─── Committed forms ─────────────────────────────────────────────────────────

/// Input to [`crate::store::PrimaryStore::insert_ticket`].
#[derive(Debug, Clone, PartialEq)]
pub struct NewTicket {
  pub supplier:   SupplierId,
  pub date:       NaiveDate,
  pub number:     String,
  pub created_at: DateTime<Utc>,
  pub exemption:  Option<Exemption>,
}

/// A committed ticket as held by the secondary store, keyed by [`TicketId`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketItem {
  pub id:         TicketId,
  pub supplier:   SupplierId,
  pub date:       NaiveDate,
  pub number:     String,
  pub created_at: DateTime<Utc>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub exemption:  Option<Exemption>,
  /// Discriminates the archive object written for this physical commit.
  pub uuid:       Uuid,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub checked_at: Option<DateTime<Utc>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub controller: Option<String>,
}

impl TicketItem {
  /// Build the item for a message whose primary write resolved to `id`.
  pub fn committed(id: TicketId, message: &TicketMessage, uuid: Uuid) -> Self {
    Self {
      id,
      supplier: message.supplier,
      date: message.date,
      number: message.number.clone(),
      created_at: message.created_at,
      exemption: message.exemption,
      uuid,
      checked_at: None,
      controller: None,
    }
  }
}
