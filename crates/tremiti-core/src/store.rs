//! Storage traits for the three commit targets.
//!
//! - [`PrimaryStore`]: relational, owns `(date, number)` uniqueness and assigns
//!   [`TicketId`]s.
//! - [`SecondaryStore`]: item store keyed by [`TicketId`], with a secondary
//!   index on `number` for lookup.
//! - [`ArchiveStore`]: write-once object storage.
//!
//! All methods return `Send` futures so implementations can be shared across
//! tokio tasks and axum handlers.

use std::future::Future;

use chrono::{DateTime, NaiveDate, Utc};

use crate::{
  archive::ArchiveKey,
  ticket::{NewTicket, TicketId, TicketItem},
};

/// Result of [`PrimaryStore::insert_ticket`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Insertion {
  Created(TicketId),
  /// A row with the same `(date, number)` already exists.
  Duplicate,
}

/// Result of [`SecondaryStore::put_if_absent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
  Written,
  /// An item with this id already exists; nothing was written.
  AlreadyExists,
}

pub trait PrimaryStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Insert a ticket row. A unique-key conflict on `(date, number)` is
  /// reported as [`Insertion::Duplicate`], not as an error.
  fn insert_ticket<'a>(
    &'a self,
    ticket: &'a NewTicket,
  ) -> impl Future<Output = Result<Insertion, Self::Error>> + Send + 'a;

  /// The id of the row for `(date, number)`, if any.
  fn find_id<'a>(
    &'a self,
    date: NaiveDate,
    number: &'a str,
  ) -> impl Future<Output = Result<Option<TicketId>, Self::Error>> + Send + 'a;

  /// Stamp a check-in. Returns `false` when no row has this id.
  fn check_in<'a>(
    &'a self,
    id: &'a TicketId,
    controller: &'a str,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;
}

pub trait SecondaryStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Write `item` only if no item with `item.id` exists.
  fn put_if_absent<'a>(
    &'a self,
    item: &'a TicketItem,
  ) -> impl Future<Output = Result<PutOutcome, Self::Error>> + Send + 'a;

  fn get<'a>(
    &'a self,
    id: &'a TicketId,
  ) -> impl Future<Output = Result<Option<TicketItem>, Self::Error>> + Send + 'a;

  /// All items with this ticket number, oldest first. Numbers are only unique
  /// per date, so more than one may match.
  fn find_by_number<'a>(
    &'a self,
    number: &'a str,
  ) -> impl Future<Output = Result<Vec<TicketItem>, Self::Error>> + Send + 'a;

  /// Stamp a check-in and return the updated item, or `None` when no item has
  /// this id.
  fn check_in<'a>(
    &'a self,
    id: &'a TicketId,
    controller: &'a str,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<Option<TicketItem>, Self::Error>> + Send + 'a;
}

pub trait ArchiveStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Store a new object. Objects are never overwritten; writing an existing
  /// key is an error.
  fn put_new<'a>(
    &'a self,
    key: &'a ArchiveKey,
    body: Vec<u8>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}
