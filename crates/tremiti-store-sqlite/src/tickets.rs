//! [`SqliteTicketStore`] — the SQLite implementation of [`PrimaryStore`].

use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{OptionalExtension as _, ffi};
use tremiti_core::{
  store::{Insertion, PrimaryStore},
  ticket::{NewTicket, TicketId},
};

use crate::{
  Result,
  encode::{encode_date, encode_dt, encode_exemption},
  schema::TICKETS_SCHEMA,
};

/// The primary ticket store, backed by a single SQLite file.
///
/// Holds exactly one connection; cloning is cheap and shares it. The
/// composition root owns the store and calls [`SqliteTicketStore::close`] on
/// shutdown.
#[derive(Clone)]
pub struct SqliteTicketStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteTicketStore {
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
        conn.execute_batch(TICKETS_SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Close the underlying connection, waiting for queued calls to finish.
  pub async fn close(self) -> Result<()> {
    self.conn.close().await?;
    Ok(())
  }

  #[cfg(test)]
  pub(crate) async fn row_count(&self) -> Result<i64> {
    Ok(
      self
        .conn
        .call(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM tickets", [], |r| r.get(0))?))
        .await?,
    )
  }
}

// ─── PrimaryStore impl ───────────────────────────────────────────────────────

impl PrimaryStore for SqliteTicketStore {
  type Error = crate::Error;

  async fn insert_ticket(&self, ticket: &NewTicket) -> Result<Insertion> {
    let supplier   = i64::from(ticket.supplier.0);
    let date_str   = encode_date(ticket.date);
    let number     = ticket.number.clone();
    let created_at = encode_dt(ticket.created_at);
    let exemption  = encode_exemption(ticket.exemption);

    let inserted: Option<i64> = self
      .conn
      .call(move |conn| {
        let res = conn.execute(
          "INSERT INTO tickets (supplier, date, number, created_at, exemption)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![supplier, date_str, number, created_at, exemption],
        );
        match res {
          Ok(_) => Ok(Some(conn.last_insert_rowid())),
          Err(rusqlite::Error::SqliteFailure(e, _))
            if e.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE =>
          {
            Ok(None)
          }
          Err(e) => Err(e.into()),
        }
      })
      .await?;

    Ok(match inserted {
      Some(id) => Insertion::Created(TicketId::from(id)),
      None => Insertion::Duplicate,
    })
  }

  async fn find_id(&self, date: NaiveDate, number: &str) -> Result<Option<TicketId>> {
    let date_str = encode_date(date);
    let number   = number.to_owned();

    let id: Option<i64> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT id FROM tickets WHERE date = ?1 AND number = ?2",
              rusqlite::params![date_str, number],
              |row| row.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    Ok(id.map(TicketId::from))
  }

  async fn check_in(
    &self,
    id:         &TicketId,
    controller: &str,
    at:         DateTime<Utc>,
  ) -> Result<bool> {
    // Ids minted here are integers; anything else cannot match a row.
    let Ok(id_num) = id.as_str().parse::<i64>() else {
      return Ok(false);
    };
    let controller = controller.to_owned();
    let at_str     = encode_dt(at);

    let updated = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE tickets SET checked_at = ?1, controller = ?2
           WHERE id = ?3",
          rusqlite::params![at_str, controller, id_num],
        )?)
      })
      .await?;

    Ok(updated > 0)
  }
}
