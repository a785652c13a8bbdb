//! Lookup and check-in against committed tickets.

use std::sync::Arc;

use chrono::Utc;
use tremiti_core::{
  store::{PrimaryStore, SecondaryStore},
  ticket::{TicketId, TicketItem},
};

use crate::error::DeskError;

/// Result of [`TicketDesk::check_in`].
#[derive(Debug, Clone)]
pub struct CheckIn {
  /// The secondary item after the update.
  pub item:            TicketItem,
  /// Whether the primary row was stamped too.
  pub primary_updated: bool,
}

pub struct TicketDesk<P, S> {
  primary:   Option<Arc<P>>,
  secondary: Arc<S>,
}

impl<P, S> Clone for TicketDesk<P, S> {
  fn clone(&self) -> Self {
    Self { primary: self.primary.clone(), secondary: self.secondary.clone() }
  }
}

impl<P, S> TicketDesk<P, S>
where
  P: PrimaryStore,
  S: SecondaryStore,
{
  pub fn new(primary: Option<Arc<P>>, secondary: Arc<S>) -> Self { Self { primary, secondary } }

  /// The oldest committed ticket with this number.
  pub async fn lookup(&self, number: &str) -> Result<Option<TicketItem>, DeskError> {
    let matches = self
      .secondary
      .find_by_number(number)
      .await
      .map_err(|e| DeskError::Secondary(Box::new(e)))?;
    if matches.len() > 1 {
      tracing::debug!(ticket_number = number, matches = matches.len(), "lookup matched several dates");
    }
    Ok(matches.into_iter().next())
  }

  /// Stamp `checked_at` and `controller`. The secondary item must exist; the
  /// primary row is updated on a best-effort basis.
  pub async fn check_in(&self, id: &TicketId, controller: &str) -> Result<CheckIn, DeskError> {
    let at = Utc::now();

    let item = self
      .secondary
      .check_in(id, controller, at)
      .await
      .map_err(|e| DeskError::Secondary(Box::new(e)))?
      .ok_or_else(|| DeskError::NotFound(id.clone()))?;

    let primary_updated = match &self.primary {
      None => false,
      Some(primary) => match primary.check_in(id, controller, at).await {
        Ok(true) => true,
        Ok(false) => {
          tracing::warn!(ticket_id = %id, "check-in: no primary row for this id");
          false
        }
        Err(e) => {
          tracing::warn!(ticket_id = %id, error = %e, "check-in: primary update failed");
          false
        }
      },
    };

    tracing::info!(ticket_id = %id, controller, primary_updated, "ticket checked in");
    Ok(CheckIn { item, primary_updated })
  }
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;
  use tremiti_core::{
    store::Insertion,
    ticket::{NewTicket, SupplierId},
  };
  use tremiti_store_sqlite::{SqliteItemStore, SqliteTicketStore};
  use uuid::Uuid;

  use super::*;

  fn date() -> NaiveDate { NaiveDate::from_ymd_opt(2025, 6, 15).unwrap() }

  async fn committed(
    primary: &SqliteTicketStore,
    secondary: &SqliteItemStore,
    number: &str,
  ) -> TicketId {
    let new = NewTicket {
      supplier:   SupplierId(1),
      date:       date(),
      number:     number.into(),
      created_at: Utc::now(),
      exemption:  None,
    };
    let Insertion::Created(id) = primary.insert_ticket(&new).await.unwrap() else {
      panic!("expected a fresh insert");
    };
    secondary
      .put_if_absent(&TicketItem {
        id:         id.clone(),
        supplier:   new.supplier,
        date:       new.date,
        number:     new.number,
        created_at: new.created_at,
        exemption:  None,
        uuid:       Uuid::new_v4(),
        checked_at: None,
        controller: None,
      })
      .await
      .unwrap();
    id
  }

  async fn desk() -> (TicketDesk<SqliteTicketStore, SqliteItemStore>, Arc<SqliteTicketStore>, Arc<SqliteItemStore>) {
    let primary = Arc::new(SqliteTicketStore::open_in_memory().await.unwrap());
    let secondary = Arc::new(SqliteItemStore::open_in_memory().await.unwrap());
    (TicketDesk::new(Some(primary.clone()), secondary.clone()), primary, secondary)
  }

  #[tokio::test]
  async fn lookup_finds_by_number() {
    let (desk, primary, secondary) = desk().await;
    let id = committed(&primary, &secondary, "TEST000123").await;

    let found = desk.lookup("TEST000123").await.unwrap().unwrap();
    assert_eq!(found.id, id);
    assert!(desk.lookup("missing").await.unwrap().is_none());
  }

  #[tokio::test]
  async fn check_in_updates_both_stores() {
    let (desk, primary, secondary) = desk().await;
    let id = committed(&primary, &secondary, "A1").await;

    let result = desk.check_in(&id, "ctrl-7").await.unwrap();
    assert!(result.primary_updated);
    assert_eq!(result.item.controller.as_deref(), Some("ctrl-7"));
    assert!(result.item.checked_at.is_some());

    let stored = secondary.get(&id).await.unwrap().unwrap();
    assert_eq!(stored.controller.as_deref(), Some("ctrl-7"));
  }

  #[tokio::test]
  async fn check_in_unknown_id_is_not_found() {
    let (desk, ..) = desk().await;
    let err = desk.check_in(&TicketId::new("404"), "ctrl-7").await.unwrap_err();
    assert!(matches!(err, DeskError::NotFound(id) if id.as_str() == "404"));
  }

  #[tokio::test]
  async fn missing_primary_row_does_not_fail_check_in() {
    let secondary = Arc::new(SqliteItemStore::open_in_memory().await.unwrap());
    let other_primary = SqliteTicketStore::open_in_memory().await.unwrap();
    let id = committed(&other_primary, &secondary, "A1").await;

    let desk = TicketDesk::new(
      Some(Arc::new(SqliteTicketStore::open_in_memory().await.unwrap())),
      secondary,
    );
    let result = desk.check_in(&id, "ctrl-7").await.unwrap();
    assert!(!result.primary_updated);
    assert_eq!(result.item.controller.as_deref(), Some("ctrl-7"));
  }
}
