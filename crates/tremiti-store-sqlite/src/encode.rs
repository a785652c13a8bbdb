//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings, calendar dates as `YYYY-MM-DD`,
//! UUIDs as hyphenated lowercase strings.

use chrono::{DateTime, NaiveDate, Utc};
use tremiti_core::ticket::{Exemption, SupplierId, TicketId, TicketItem};
use uuid::Uuid;

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::Decode(format!("timestamp {s:?}: {e}")))
}

// ─── NaiveDate ───────────────────────────────────────────────────────────────

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|e| Error::Decode(format!("date {s:?}: {e}")))
}

// ─── Supplier / exemption ────────────────────────────────────────────────────

pub fn decode_supplier(v: i64) -> Result<SupplierId> {
  u8::try_from(v)
    .map(SupplierId)
    .map_err(|_| Error::Decode(format!("supplier out of range: {v}")))
}

pub fn encode_exemption(e: Option<Exemption>) -> Option<i64> { e.map(i64::from) }

pub fn decode_exemption(v: Option<i64>) -> Result<Option<Exemption>> {
  v.map(|n| {
    Exemption::try_from(n).map_err(|_| Error::Decode(format!("exemption out of range: {n}")))
  })
  .transpose()
}

// ─── Row types ───────────────────────────────────────────────────────────────

pub const ITEM_COLUMNS: &str =
  "id, supplier, date, number, created_at, exemption, uuid, checked_at, controller";

/// Raw values read directly from a `ticket_items` row, in [`ITEM_COLUMNS`]
/// order.
pub struct RawTicketItem {
  pub id:         String,
  pub supplier:   i64,
  pub date:       String,
  pub number:     String,
  pub created_at: String,
  pub exemption:  Option<i64>,
  pub uuid:       String,
  pub checked_at: Option<String>,
  pub controller: Option<String>,
}

impl RawTicketItem {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:         row.get(0)?,
      supplier:   row.get(1)?,
      date:       row.get(2)?,
      number:     row.get(3)?,
      created_at: row.get(4)?,
      exemption:  row.get(5)?,
      uuid:       row.get(6)?,
      checked_at: row.get(7)?,
      controller: row.get(8)?,
    })
  }

  pub fn into_item(self) -> Result<TicketItem> {
    Ok(TicketItem {
      id:         TicketId::new(self.id),
      supplier:   decode_supplier(self.supplier)?,
      date:       decode_date(&self.date)?,
      number:     self.number,
      created_at: decode_dt(&self.created_at)?,
      exemption:  decode_exemption(self.exemption)?,
      uuid:       Uuid::parse_str(&self.uuid)?,
      checked_at: self.checked_at.as_deref().map(decode_dt).transpose()?,
      controller: self.controller,
    })
  }
}
