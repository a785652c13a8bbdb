//! Operator triggers for draining the dead-letter and recovery queues.
//!
//! Both are parameterless and return a [`DrainReport`].

use axum::{Json, extract::State};
use tremiti_core::{
  queue::TicketQueue,
  store::{PrimaryStore, SecondaryStore},
};
use tremiti_ingest::DrainReport;

use crate::{AppState, error::ApiError};

/// `POST /admin/dead-letters/replay`
pub async fn replay_dead_letters<Q, P, S>(
  State(state): State<AppState<Q, P, S>>,
) -> Result<Json<DrainReport>, ApiError>
where
  Q: TicketQueue + 'static,
  P: PrimaryStore + 'static,
  S: SecondaryStore + 'static,
{
  Ok(Json(state.replay.run().await?))
}

/// `POST /admin/recovery/reprocess`
pub async fn reprocess_recovery<Q, P, S>(
  State(state): State<AppState<Q, P, S>>,
) -> Result<Json<DrainReport>, ApiError>
where
  Q: TicketQueue + 'static,
  P: PrimaryStore + 'static,
  S: SecondaryStore + 'static,
{
  Ok(Json(state.reprocess.run().await?))
}
