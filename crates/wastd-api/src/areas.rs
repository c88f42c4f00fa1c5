//! Handlers for `/areas` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/areas` | All areas, by name |
//! | `POST` | `/areas` | Body: [`NewArea`] |
//! | `GET`  | `/areas/:id` | 404 if not found |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use uuid::Uuid;
use wastd_core::{
  store::RecordStore,
  survey::{Area, NewArea},
};

use crate::error::ApiError;

/// `GET /areas`
pub async fn list<S: RecordStore>(
  State(store): State<Arc<S>>,
) -> Result<Json<Vec<Area>>, ApiError> {
  let areas = store.list_areas().await.map_err(ApiError::from_store)?;
  Ok(Json(areas))
}

/// `POST /areas`
pub async fn create<S: RecordStore>(
  State(store): State<Arc<S>>,
  Json(body): Json<NewArea>,
) -> Result<impl IntoResponse, ApiError> {
  if body.geom.exterior.len() < 3 {
    return Err(ApiError::BadRequest("an area needs at least three vertices".into()));
  }
  let area = store.add_area(body).await.map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(area)))
}

/// `GET /areas/:id`
pub async fn get_one<S: RecordStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Area>, ApiError> {
  let area = store
    .get_area(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("area {id} not found")))?;
  Ok(Json(area))
}
