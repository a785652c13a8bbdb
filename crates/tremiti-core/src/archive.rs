//! Archive snapshots — the write-once JSON record of a committed ticket.

use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Result, ticket::TicketItem};

/// Object key `{year}/{month}-{day}/{number}/{uuid}.json`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArchiveKey(String);

impl ArchiveKey {
  pub fn new(date: NaiveDate, number: &str, uuid: Uuid) -> Self {
    Self(format!(
      "{:04}/{:02}-{:02}/{number}/{uuid}.json",
      date.year(),
      date.month(),
      date.day(),
    ))
  }

  pub fn for_item(item: &TicketItem) -> Self { Self::new(item.date, &item.number, item.uuid) }

  pub fn as_str(&self) -> &str { &self.0 }

  /// The `/`-separated segments of the key.
  pub fn segments(&self) -> impl Iterator<Item = &str> { self.0.split('/') }
}

impl fmt::Display for ArchiveKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

/// Processing metadata attached to every snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveMetadata {
  pub processed_at: DateTime<Utc>,
  /// Identifier of the queue message that produced this commit.
  pub message_id:   String,
  pub source:       String,
}

/// The archived document: the committed item plus [`ArchiveMetadata`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveRecord {
  #[serde(flatten)]
  pub item:     TicketItem,
  pub metadata: ArchiveMetadata,
}

impl ArchiveRecord {
  pub fn key(&self) -> ArchiveKey { ArchiveKey::for_item(&self.item) }

  /// Pretty-printed JSON object body.
  pub fn to_bytes(&self) -> Result<Vec<u8>> { Ok(serde_json::to_vec_pretty(self)?) }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::ticket::{SupplierId, TicketId};

  #[test]
  fn key_is_partitioned_by_date_and_number() {
    let uuid = Uuid::parse_str("6f1c1f8e-3c1b-4a40-9a55-2b1c3b3f4a10").unwrap();
    let date = NaiveDate::from_ymd_opt(2025, 6, 5).unwrap();
    let key = ArchiveKey::new(date, "TEST000123", uuid);
    assert_eq!(
      key.as_str(),
      "2025/06-05/TEST000123/6f1c1f8e-3c1b-4a40-9a55-2b1c3b3f4a10.json"
    );
    assert_eq!(key.segments().count(), 4);
  }

  #[test]
  fn record_flattens_item_and_nests_metadata() {
    let item = TicketItem {
      id:         TicketId::new("42"),
      supplier:   SupplierId(1),
      date:       NaiveDate::from_ymd_opt(2025, 6, 15).unwrap(),
      number:     "TEST000123".into(),
      created_at: "2025-06-15T08:00:00Z".parse().unwrap(),
      exemption:  None,
      uuid:       Uuid::new_v4(),
      checked_at: None,
      controller: None,
    };
    let record = ArchiveRecord {
      item,
      metadata: ArchiveMetadata {
        processed_at: "2025-06-15T08:00:01Z".parse().unwrap(),
        message_id:   "m-1".into(),
        source:       "ticket-consumer".into(),
      },
    };
    let value: serde_json::Value = serde_json::from_slice(&record.to_bytes().unwrap()).unwrap();
    assert_eq!(value["id"], "42");
    assert_eq!(value["metadata"]["messageId"], "m-1");
    assert_eq!(value["metadata"]["processedAt"], "2025-06-15T08:00:01Z");
    assert!(value.get("exemption").is_none());
    assert!(value.get("checked_at").is_none());
  }
}
