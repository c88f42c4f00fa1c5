//! Handlers for observations attached to an encounter.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/encounters/:id/observations` | Oldest first |
//! | `POST` | `/encounters/:id/observations` | Body: `{"type":"tag","data":{...}}` |
//! | `GET`  | `/encounters/:id/nest-success` | Figures for each nest excavation |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Serialize;
use uuid::Uuid;
use wastd_core::{
  nest::NestSuccess,
  observation::{NewObservation, Observation, ObservationValue},
  store::RecordStore,
};

use crate::error::ApiError;

/// `GET /encounters/:id/observations`
pub async fn list<S: RecordStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<Observation>>, ApiError> {
  let observations = store.get_observations(id).await.map_err(ApiError::from_store)?;
  Ok(Json(observations))
}

/// `POST /encounters/:id/observations`
pub async fn create<S: RecordStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  Json(value): Json<ObservationValue>,
) -> Result<impl IntoResponse, ApiError> {
  if let ObservationValue::Tag(tag) = &value
    && tag.name.trim().is_empty()
  {
    return Err(ApiError::BadRequest("tag name must not be empty".into()));
  }
  let observation = store
    .record_observation(NewObservation::new(id, value))
    .await
    .map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(observation)))
}

#[derive(Debug, Serialize)]
pub struct NestSuccessView {
  pub observation_id: Uuid,
  #[serde(flatten)]
  pub success:        NestSuccess,
}

/// `GET /encounters/:id/nest-success`
pub async fn nest_success<S: RecordStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<NestSuccessView>>, ApiError> {
  let observations = store.get_observations(id).await.map_err(ApiError::from_store)?;
  let figures = observations
    .iter()
    .filter_map(|o| {
      o.value.as_nest().map(|nest| NestSuccessView {
        observation_id: o.observation_id,
        success:        nest.success(),
      })
    })
    .collect();
  Ok(Json(figures))
}
