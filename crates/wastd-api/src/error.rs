//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use wastd_core::store::StoreError;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("precondition failed: the record changed since it was read")]
  PreconditionFailed,

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  /// Classify a backend error by the domain error it carries.
  pub fn from_store<E: StoreError>(e: E) -> Self {
    match e.as_core() {
      Some(core) if core.is_not_found() => Self::NotFound(core.to_string()),
      Some(core) if core.is_conflict() => Self::Conflict(core.to_string()),
      Some(core) if core.is_invalid_input() => Self::BadRequest(core.to_string()),
      _ => Self::Store(Box::new(e)),
    }
  }
}

impl From<wastd_core::Error> for ApiError {
  fn from(e: wastd_core::Error) -> Self {
    if e.is_not_found() {
      Self::NotFound(e.to_string())
    } else if e.is_conflict() {
      Self::Conflict(e.to_string())
    } else if e.is_invalid_input() {
      Self::BadRequest(e.to_string())
    } else {
      Self::Store(Box::new(e))
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
      ApiError::PreconditionFailed => (StatusCode::PRECONDITION_FAILED, self.to_string()),
      ApiError::Store(e) => {
        tracing::error!(error = %e, "store failure");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
      }
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
