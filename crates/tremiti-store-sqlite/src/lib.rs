//! SQLite backends for the Tremiti ticket pipeline.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Each store owns exactly one connection;
//! clones share it.
//!
//! - [`SqliteTicketStore`]: the primary relational store.
//! - [`SqliteItemStore`]: the secondary item store.
//! - [`SqliteQueueBroker`]: durable named queues with visibility timeouts and
//!   dead-letter redrive.

mod encode;
mod items;
mod queue;
mod schema;
mod tickets;

pub mod error;

pub use error::{Error, Result};
pub use items::SqliteItemStore;
pub use queue::{QueueSettings, RedrivePolicy, SqliteQueue, SqliteQueueBroker};
pub use tickets::SqliteTicketStore;
