//! Handlers for `/encounters` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/encounters` | Optional `status`, `survey_id`, `name`, `limit`, `offset` |
//! | `POST` | `/encounters` | Body: [`NewEncounter`]; returns 201 + stored encounter |
//! | `GET`  | `/encounters/:id` | Carries an `ETag` for conditional transitions |
//! | `GET`  | `/encounters/:id/logs` | QA history, oldest first |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::{StatusCode, header},
  response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use wastd_core::{
  encounter::{Encounter, EncounterQuery, NewEncounter},
  qa::{QaStatus, StateLog},
  store::RecordStore,
};

use crate::{
  display::{status_badge, status_label},
  error::ApiError,
  etag::compute_etag,
};

/// An encounter with its presentation fields resolved.
#[derive(Debug, Serialize)]
pub struct EncounterView {
  #[serde(flatten)]
  pub encounter:    Encounter,
  pub season:       i32,
  pub status_label: &'static str,
  pub status_badge: &'static str,
}

impl From<Encounter> for EncounterView {
  fn from(encounter: Encounter) -> Self {
    Self {
      season: encounter.season(),
      status_label: status_label(encounter.status),
      status_badge: status_badge(encounter.status),
      encounter,
    }
  }
}

/// An encounter as read, with the inputs of its ETag.
pub(crate) struct Versioned {
  pub encounter: Encounter,
  pub log_count: usize,
  pub etag:      String,
}

/// Load an encounter and its current ETag, or 404.
pub(crate) async fn load_with_etag<S: RecordStore>(
  store: &S,
  id: Uuid,
) -> Result<Versioned, ApiError> {
  let encounter = store
    .get_encounter(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("encounter {id} not found")))?;
  let log_count = store.state_logs(id).await.map_err(ApiError::from_store)?.len();
  let etag = compute_etag(&encounter, log_count);
  Ok(Versioned { encounter, log_count, etag })
}

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub status:    Option<QaStatus>,
  pub survey_id: Option<Uuid>,
  pub name:      Option<String>,
  pub limit:     Option<usize>,
  pub offset:    Option<usize>,
}

/// `GET /encounters[?status=curated][&survey_id=...][&name=...]`
pub async fn list<S: RecordStore>(
  State(store): State<Arc<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<EncounterView>>, ApiError> {
  let query = EncounterQuery {
    status:    params.status,
    survey_id: params.survey_id,
    name:      params.name,
    limit:     params.limit,
    offset:    params.offset,
  };
  let encounters = store.list_encounters(query).await.map_err(ApiError::from_store)?;
  Ok(Json(encounters.into_iter().map(EncounterView::from).collect()))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /encounters`
pub async fn create<S: RecordStore>(
  State(store): State<Arc<S>>,
  Json(body): Json<NewEncounter>,
) -> Result<impl IntoResponse, ApiError> {
  let encounter = store.add_encounter(body).await.map_err(ApiError::from_store)?;
  let etag = compute_etag(&encounter, 0);
  Ok((
    StatusCode::CREATED,
    [(header::ETAG, etag)],
    Json(EncounterView::from(encounter)),
  ))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /encounters/:id`
pub async fn get_one<S: RecordStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
  let Versioned { encounter, etag, .. } = load_with_etag(store.as_ref(), id).await?;
  Ok(([(header::ETAG, etag)], Json(EncounterView::from(encounter))))
}

/// `GET /encounters/:id/logs`
pub async fn logs<S: RecordStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<StateLog>>, ApiError> {
  store
    .get_encounter(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("encounter {id} not found")))?;
  let logs = store.state_logs(id).await.map_err(ApiError::from_store)?;
  Ok(Json(logs))
}
