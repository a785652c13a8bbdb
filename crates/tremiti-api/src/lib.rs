//! JSON HTTP API for Tremiti.
//!
//! Exposes an axum [`Router`] over the ingestion pipeline: supplier
//! submissions, controller lookup and check-in, and the operator drain
//! triggers. TLS and transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! let app = tremiti_api::api_router(state).layer(TraceLayer::new_for_http());
//! ```

pub mod admin;
pub mod error;
pub mod tickets;

use std::sync::Arc;

use axum::{Router, routing::post};
use tremiti_core::{
  queue::TicketQueue,
  store::{PrimaryStore, SecondaryStore},
};
use tremiti_ingest::{DeadLetterReplay, Gateway, RecoveryReprocessor, TicketDesk};

pub use error::ApiError;

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all handlers. `Q` backs all three queues.
pub struct AppState<Q, P, S> {
  pub gateway:   Gateway<Q>,
  pub desk:      TicketDesk<P, S>,
  pub replay:    Arc<DeadLetterReplay<Q, Q>>,
  pub reprocess: Arc<RecoveryReprocessor<Q, Q>>,
}

impl<Q, P, S> Clone for AppState<Q, P, S> {
  fn clone(&self) -> Self {
    Self {
      gateway:   self.gateway.clone(),
      desk:      self.desk.clone(),
      replay:    self.replay.clone(),
      reprocess: self.reprocess.clone(),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<Q, P, S>(state: AppState<Q, P, S>) -> Router<()>
where
  Q: TicketQueue + 'static,
  P: PrimaryStore + 'static,
  S: SecondaryStore + 'static,
{
  Router::new()
    // Suppliers
    .route("/tickets", post(tickets::submit::<Q, P, S>))
    // Controllers
    .route("/tickets/lookup", post(tickets::lookup::<Q, P, S>))
    .route("/tickets/check-in", post(tickets::check_in::<Q, P, S>))
    // Operators
    .route("/admin/dead-letters/replay", post(admin::replay_dead_letters::<Q, P, S>))
    .route("/admin/recovery/reprocess", post(admin::reprocess_recovery::<Q, P, S>))
    .with_state(state)
}
