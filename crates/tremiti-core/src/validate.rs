//! Submission payload validation.
//!
//! Pure: no I/O, no clock reads. The caller supplies the resolved supplier and
//! the enqueue timestamp, and gets back the normalised [`TicketMessage`].

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;

use crate::{
  ValidationError,
  ticket::{Exemption, SupplierId, TicketMessage, normalize_number},
};

/// Keys every submission must carry, in the order they are reported.
pub const REQUIRED_FIELDS: [&str; 2] = ["date", "number"];

/// Validate a raw submission payload.
///
/// Checks run in order: required fields, date format, number shape, exemption
/// range. Any `supplier` key in the payload is ignored; the supplier always
/// comes from the caller's credential.
pub fn validate(
  payload: &Value,
  supplier: SupplierId,
  now: DateTime<Utc>,
) -> Result<TicketMessage, ValidationError> {
  let obj = payload.as_object().ok_or(ValidationError::NotAnObject)?;

  let missing: Vec<&'static str> = REQUIRED_FIELDS
    .into_iter()
    .filter(|key| obj.get(*key).is_none_or(Value::is_null))
    .collect();
  if !missing.is_empty() {
    return Err(ValidationError::MissingFields(missing));
  }

  let date = parse_date(&obj["date"])?;
  let number = normalize_number(&obj["number"])?;

  // Absent means no exemption; a present `null` is not an integer.
  let exemption = obj.get("exemption").map(parse_exemption).transpose()?;

  Ok(TicketMessage {
    date,
    number,
    supplier,
    created_at: now,
    exemption,
    retry_attempt: None,
    reprocessed_at: None,
    original_error: None,
    failed_at: None,
  })
}

fn parse_date(value: &Value) -> Result<NaiveDate, ValidationError> {
  value
    .as_str()
    .and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok())
    .ok_or_else(|| ValidationError::InvalidDate(value.to_string()))
}

/// Integral JSON numbers only; `7.0` is accepted, `7.5` and `"7"` are not.
fn parse_exemption(value: &Value) -> Result<Exemption, ValidationError> {
  let n = match value.as_i64() {
    Some(n) => n,
    None => match value.as_f64() {
      Some(f) if f.fract() == 0.0 && f.abs() < 1e9 => f as i64,
      _ => return Err(ValidationError::InvalidExemption),
    },
  };
  Exemption::try_from(n)
}
