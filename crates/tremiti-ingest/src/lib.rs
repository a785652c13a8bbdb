//! The Tremiti ingestion pipeline.
//!
//! Everything here is generic over the storage and queue traits in
//! `tremiti-core`; the server wires in concrete backends.
//!
//! - [`gateway`]: authenticate, validate and enqueue submissions, parking them
//!   on the recovery queue when the main queue refuses them.
//! - [`consumer`]: commit queued tickets to the primary store, the secondary
//!   store and the archive, in that order.
//! - [`replay`] / [`reprocess`]: move dead-lettered and recovery-queue
//!   messages back onto the main queue.
//! - [`desk`]: lookup and check-in against committed tickets.

pub mod consumer;
pub mod desk;
pub mod drain;
pub mod error;
pub mod gateway;
pub mod replay;
pub mod reprocess;
pub mod suppliers;

pub use consumer::{BatchReport, Committed, Consumer, IdSource, MessageFailure};
pub use desk::{CheckIn, TicketDesk};
pub use drain::{DrainFailure, DrainReport};
pub use error::{BoxError, DeskError, DrainError, ProcessError, SubmitError};
pub use gateway::{Gateway, SubmitOutcome};
pub use replay::DeadLetterReplay;
pub use reprocess::RecoveryReprocessor;
pub use suppliers::{DirectoryError, SupplierDirectory, SupplierEntry};

#[cfg(test)]
mod testing;
