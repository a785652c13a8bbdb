//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  extract::rejection::JsonRejection,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tremiti_ingest::{BoxError, DeskError, DrainError, SubmitError};

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("unauthorized")]
  Unauthorized,

  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("internal error: {0}")]
  Internal(#[source] BoxError),
}

impl From<SubmitError> for ApiError {
  fn from(e: SubmitError) -> Self {
    match e {
      SubmitError::Unauthorized => ApiError::Unauthorized,
      SubmitError::MalformedJson(e) => ApiError::BadRequest(format!("malformed JSON: {e}")),
      SubmitError::Validation(e) => ApiError::BadRequest(e.to_string()),
      e @ (SubmitError::Serialization(_) | SubmitError::Enqueue(_)) => {
        ApiError::Internal(Box::new(e))
      }
    }
  }
}

impl From<DeskError> for ApiError {
  fn from(e: DeskError) -> Self {
    match e {
      DeskError::NotFound(id) => ApiError::NotFound(format!("ticket {id}")),
      e @ DeskError::Secondary(_) => ApiError::Internal(Box::new(e)),
    }
  }
}

/// Bad JSON, a missing content type, or a body of the wrong shape.
impl From<JsonRejection> for ApiError {
  fn from(e: JsonRejection) -> Self { ApiError::BadRequest(e.body_text()) }
}

impl From<DrainError> for ApiError {
  fn from(e: DrainError) -> Self { ApiError::Internal(Box::new(e)) }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized".to_owned()),
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, format!("not found: {m}")),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Internal(e) => {
        tracing::error!(error = %e, "request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
      }
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
