//! Handlers for `/tickets` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/tickets` | Supplier submission; `Authorization` carries the supplier token |
//! | `POST` | `/tickets/lookup` | Body: `{"number": ...}` |
//! | `POST` | `/tickets/check-in` | Body: `{"ticketId": ..., "controller": "..."}` |

use axum::{
  Json,
  body::Bytes,
  extract::{State, rejection::JsonRejection},
  http::{HeaderMap, StatusCode, header},
  response::IntoResponse,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tremiti_core::{
  queue::TicketQueue,
  store::{PrimaryStore, SecondaryStore},
  ticket::{TicketId, TicketItem, normalize_number},
};
use tremiti_ingest::SubmitOutcome;

use crate::{AppState, error::ApiError};

// ─── Submit ───────────────────────────────────────────────────────────────────

/// `POST /tickets`
///
/// `200` when the ticket is on the main queue, `202` when it was parked on the
/// recovery queue.
pub async fn submit<Q, P, S>(
  State(state): State<AppState<Q, P, S>>,
  headers: HeaderMap,
  body: Bytes,
) -> Result<impl IntoResponse, ApiError>
where
  Q: TicketQueue + 'static,
  P: PrimaryStore + 'static,
  S: SecondaryStore + 'static,
{
  let credential = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok());

  let response = match state.gateway.submit(credential, &body).await? {
    SubmitOutcome::Accepted { message_id } => (
      StatusCode::OK,
      Json(json!({ "message": "ticket queued", "messageId": message_id })),
    ),
    SubmitOutcome::AcceptedForRetry { message_id } => (
      StatusCode::ACCEPTED,
      Json(json!({
        "message": "ticket accepted for deferred processing",
        "status": "queued_for_retry",
        "messageId": message_id,
      })),
    ),
  };
  Ok(response)
}

// ─── Lookup ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LookupBody {
  pub number: Option<Value>,
}

/// A committed ticket as returned to controllers.
#[derive(Debug, Serialize)]
pub struct TicketView {
  pub id:         TicketId,
  pub number:     String,
  pub date:       NaiveDate,
  pub supplier:   u8,
  pub exemption:  Option<u8>,
  pub created_at: DateTime<Utc>,
  pub checked_at: Option<DateTime<Utc>>,
  pub controller: Option<String>,
}

impl From<TicketItem> for TicketView {
  fn from(item: TicketItem) -> Self {
    Self {
      id:         item.id,
      number:     item.number,
      date:       item.date,
      supplier:   item.supplier.0,
      exemption:  item.exemption.map(|e| e.get()),
      created_at: item.created_at,
      checked_at: item.checked_at,
      controller: item.controller,
    }
  }
}

/// `POST /tickets/lookup`
pub async fn lookup<Q, P, S>(
  State(state): State<AppState<Q, P, S>>,
  body: Result<Json<LookupBody>, JsonRejection>,
) -> Result<Json<TicketView>, ApiError>
where
  Q: TicketQueue + 'static,
  P: PrimaryStore + 'static,
  S: SecondaryStore + 'static,
{
  let Json(body) = body?;
  let number = body
    .number
    .as_ref()
    .filter(|v| !v.is_null())
    .ok_or_else(|| ApiError::BadRequest("number is required".into()))
    .and_then(|v| normalize_number(v).map_err(|e| ApiError::BadRequest(e.to_string())))?;

  let item = state
    .desk
    .lookup(&number)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("ticket number {number}")))?;

  Ok(Json(item.into()))
}

// ─── Check-in ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CheckInBody {
  #[serde(rename = "ticketId")]
  pub ticket_id:  Option<Value>,
  pub controller: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CheckInView {
  #[serde(rename = "ticketId")]
  pub ticket_id:  TicketId,
  pub controller: String,
  pub checked_at: DateTime<Utc>,
}

/// `POST /tickets/check-in`
pub async fn check_in<Q, P, S>(
  State(state): State<AppState<Q, P, S>>,
  body: Result<Json<CheckInBody>, JsonRejection>,
) -> Result<Json<CheckInView>, ApiError>
where
  Q: TicketQueue + 'static,
  P: PrimaryStore + 'static,
  S: SecondaryStore + 'static,
{
  let Json(body) = body?;
  let ticket_id = match body.ticket_id {
    Some(Value::String(s)) if !s.trim().is_empty() => TicketId::new(s.trim()),
    Some(Value::Number(n)) if n.is_i64() || n.is_u64() => TicketId::new(n.to_string()),
    _ => return Err(ApiError::BadRequest("ticketId is required".into())),
  };
  let controller = body
    .controller
    .map(|c| c.trim().to_owned())
    .filter(|c| !c.is_empty())
    .ok_or_else(|| ApiError::BadRequest("controller is required".into()))?;

  let result = state.desk.check_in(&ticket_id, &controller).await?;
  let checked_at = result
    .item
    .checked_at
    .ok_or_else(|| ApiError::Internal("check-in did not stamp checked_at".into()))?;

  Ok(Json(CheckInView { ticket_id, controller, checked_at }))
}
