//! Handlers for the QA transition endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/encounters/:id/curate` | Body: [`TransitionBody`] |
//! | `POST` | `/encounters/:id/flag`   | Body: [`TransitionBody`] |
//! | `POST` | `/encounters/:id/reject` | Body: [`TransitionBody`] |
//!
//! Each accepts an optional `If-Match` header carrying the ETag of a previous
//! `GET /encounters/:id`; a mismatch is answered with 412 and nothing changes.
//! The status and log count behind the ETag are checked again under the
//! store's write lock, so a change racing the request is also a 412.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::{HeaderMap, header},
  response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use wastd_core::{
  qa::{Actor, StateLog, Transition, TransitionRequest},
  store::{RecordStore, StoreError},
};

use crate::{
  encounters::{EncounterView, load_with_etag},
  error::ApiError,
  etag::if_match_satisfied,
};

#[derive(Debug, Deserialize)]
pub struct TransitionBody {
  pub actor:       String,
  #[serde(default)]
  pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TransitionResponse {
  pub encounter: EncounterView,
  pub log:       StateLog,
}

/// `POST /encounters/:id/curate`
pub async fn curate<S: RecordStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  headers: HeaderMap,
  Json(body): Json<TransitionBody>,
) -> Result<Response, ApiError> {
  apply(store.as_ref(), id, &headers, body, Transition::Curate).await
}

/// `POST /encounters/:id/flag`
pub async fn flag<S: RecordStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  headers: HeaderMap,
  Json(body): Json<TransitionBody>,
) -> Result<Response, ApiError> {
  apply(store.as_ref(), id, &headers, body, Transition::Flag).await
}

/// `POST /encounters/:id/reject`
pub async fn reject<S: RecordStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  headers: HeaderMap,
  Json(body): Json<TransitionBody>,
) -> Result<Response, ApiError> {
  apply(store.as_ref(), id, &headers, body, Transition::Reject).await
}

async fn apply<S: RecordStore>(
  store: &S,
  id: Uuid,
  headers: &HeaderMap,
  body: TransitionBody,
  transition: Transition,
) -> Result<Response, ApiError> {
  let actor = Actor::new(body.actor)?;
  let mut request = TransitionRequest::new(transition, actor, body.description);

  let if_match = headers
    .get(header::IF_MATCH)
    .map(|v| v.to_str().map(str::to_owned))
    .transpose()
    .map_err(|_| ApiError::BadRequest("If-Match is not valid ASCII".into()))?;
  let conditional = if_match.is_some();
  if let Some(if_match) = if_match {
    let read = load_with_etag(store, id).await?;
    if !if_match_satisfied(&if_match, &read.etag) {
      return Err(ApiError::PreconditionFailed);
    }
    request = request
      .expecting(read.encounter.status)
      .expecting_logs(read.log_count);
  }

  let (encounter, log) = store.transition(id, request).await.map_err(|e| {
    if conditional && e.as_core().is_some_and(|core| core.is_stale()) {
      ApiError::PreconditionFailed
    } else {
      ApiError::from_store(e)
    }
  })?;
  let etag = load_with_etag(store, id).await?.etag;

  Ok(
    (
      [(header::ETAG, etag)],
      Json(TransitionResponse { encounter: encounter.into(), log }),
    )
      .into_response(),
  )
}
