//! [`SqliteItemStore`] — the SQLite implementation of [`SecondaryStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension as _, ffi};
use tremiti_core::{
  store::{PutOutcome, SecondaryStore},
  ticket::{TicketId, TicketItem},
};

use crate::{
  Result,
  encode::{ITEM_COLUMNS, RawTicketItem, encode_date, encode_dt, encode_exemption},
  schema::ITEMS_SCHEMA,
};

/// The secondary item store: one row per committed ticket, keyed by the
/// primary store's id, with an index on `number` for lookup.
#[derive(Clone)]
pub struct SqliteItemStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteItemStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(ITEMS_SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  pub async fn close(self) -> Result<()> {
    self.conn.close().await?;
    Ok(())
  }
}

impl SecondaryStore for SqliteItemStore {
  type Error = crate::Error;

  async fn put_if_absent(&self, item: &TicketItem) -> Result<PutOutcome> {
    let id         = item.id.as_str().to_owned();
    let supplier   = i64::from(item.supplier.0);
    let date_str   = encode_date(item.date);
    let number     = item.number.clone();
    let created_at = encode_dt(item.created_at);
    let exemption  = encode_exemption(item.exemption);
    let uuid_str   = item.uuid.hyphenated().to_string();
    let checked_at = item.checked_at.map(encode_dt);
    let controller = item.controller.clone();

    let written = self
      .conn
      .call(move |conn| {
        let res = conn.execute(
          "INSERT INTO ticket_items (
             id, supplier, date, number, created_at, exemption, uuid,
             checked_at, controller
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
          rusqlite::params![
            id, supplier, date_str, number, created_at, exemption, uuid_str,
            checked_at, controller,
          ],
        );
        match res {
          Ok(_) => Ok(true),
          // The conditional-put guard: an item with this id already exists.
          Err(rusqlite::Error::SqliteFailure(e, _))
            if e.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
          {
            Ok(false)
          }
          Err(e) => Err(e.into()),
        }
      })
      .await?;

    Ok(if written { PutOutcome::Written } else { PutOutcome::AlreadyExists })
  }

  async fn get(&self, id: &TicketId) -> Result<Option<TicketItem>> {
    let id = id.as_str().to_owned();

    let raw: Option<RawTicketItem> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {ITEM_COLUMNS} FROM ticket_items WHERE id = ?1"),
              rusqlite::params![id],
              RawTicketItem::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawTicketItem::into_item).transpose()
  }

  async fn find_by_number(&self, number: &str) -> Result<Vec<TicketItem>> {
    let number = number.to_owned();

    let raws: Vec<RawTicketItem> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {ITEM_COLUMNS} FROM ticket_items
           WHERE number = ?1
           ORDER BY created_at, rowid"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![number], RawTicketItem::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawTicketItem::into_item).collect()
  }

  async fn check_in(
    &self,
    id:         &TicketId,
    controller: &str,
    at:         DateTime<Utc>,
  ) -> Result<Option<TicketItem>> {
    let id_str     = id.as_str().to_owned();
    let controller = controller.to_owned();
    let at_str     = encode_dt(at);

    let raw: Option<RawTicketItem> = self
      .conn
      .call(move |conn| {
        let updated = conn.execute(
          "UPDATE ticket_items SET checked_at = ?1, controller = ?2 WHERE id = ?3",
          rusqlite::params![at_str, controller, id_str],
        )?;
        if updated == 0 {
          return Ok(None);
        }
        Ok(
          conn
            .query_row(
              &format!("SELECT {ITEM_COLUMNS} FROM ticket_items WHERE id = ?1"),
              rusqlite::params![id_str],
              RawTicketItem::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawTicketItem::into_item).transpose()
  }
}
