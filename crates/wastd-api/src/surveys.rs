//! Handlers for `/surveys` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/surveys` | Optional `site_id`, `production`, `limit`, `offset` |
//! | `POST` | `/surveys` | Body: [`NewSurvey`] |
//! | `GET`  | `/surveys/:id` | 404 if not found |
//! | `GET`  | `/surveys/:id/duplicates` | Read-only preview |
//! | `POST` | `/surveys/:id/reconcile` | Body: `{"actor":"..."}` |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;
use wastd_core::{
  qa::Actor,
  store::RecordStore,
  survey::{NewSurvey, ReconciliationReport, Survey, SurveyQuery},
};

use crate::error::ApiError;

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub site_id:    Option<Uuid>,
  pub production: Option<bool>,
  pub limit:      Option<usize>,
  pub offset:     Option<usize>,
}

/// `GET /surveys[?site_id=...][&production=true]`
pub async fn list<S: RecordStore>(
  State(store): State<Arc<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Survey>>, ApiError> {
  let query = SurveyQuery {
    site_id:    params.site_id,
    production: params.production,
    limit:      params.limit,
    offset:     params.offset,
  };
  let surveys = store.list_surveys(query).await.map_err(ApiError::from_store)?;
  Ok(Json(surveys))
}

// ─── Create / get ─────────────────────────────────────────────────────────────

/// `POST /surveys`
pub async fn create<S: RecordStore>(
  State(store): State<Arc<S>>,
  Json(body): Json<NewSurvey>,
) -> Result<impl IntoResponse, ApiError> {
  let survey = store.add_survey(body).await.map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(survey)))
}

/// `GET /surveys/:id`
pub async fn get_one<S: RecordStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Survey>, ApiError> {
  let survey = store
    .get_survey(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("survey {id} not found")))?;
  Ok(Json(survey))
}

// ─── Reconciliation ───────────────────────────────────────────────────────────

/// `GET /surveys/:id/duplicates`
pub async fn duplicates<S: RecordStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<Survey>>, ApiError> {
  let surveys = store.duplicate_surveys(id).await.map_err(ApiError::from_store)?;
  Ok(Json(surveys))
}

#[derive(Debug, Deserialize)]
pub struct ReconcileBody {
  pub actor: String,
}

/// `POST /surveys/:id/reconcile`, body: `{"actor":"..."}`
pub async fn reconcile<S: RecordStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<ReconcileBody>,
) -> Result<Json<ReconciliationReport>, ApiError> {
  let actor = Actor::new(body.actor)?;
  let report = store
    .reconcile_duplicates(id, actor)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(report))
}
