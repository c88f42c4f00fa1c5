//! Handlers for identity resolution and name propagation.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/encounters/:id/identity` | Encounters linked by shared tags |
//! | `POST` | `/encounters/:id/name` | Body: `{"name":"..."}`; renames the closure |
//! | `POST` | `/encounters/:id/name/refresh` | Re-infers the name from tags |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use wastd_core::{identity::IdentityClosure, store::RecordStore};

use crate::error::ApiError;

/// `GET /encounters/:id/identity`
pub async fn resolve<S: RecordStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<IdentityClosure>, ApiError> {
  let closure = store.resolve_identity(id).await.map_err(ApiError::from_store)?;
  Ok(Json(closure))
}

#[derive(Debug, Deserialize)]
pub struct RenameBody {
  pub name: String,
}

/// `POST /encounters/:id/name`
pub async fn rename<S: RecordStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<RenameBody>,
) -> Result<Json<IdentityClosure>, ApiError> {
  let closure = store
    .propagate_name(id, body.name)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(closure))
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
  pub name: Option<String>,
}

/// `POST /encounters/:id/name/refresh`
pub async fn refresh<S: RecordStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<RefreshResponse>, ApiError> {
  let name = store.refresh_name(id).await.map_err(ApiError::from_store)?;
  Ok(Json(RefreshResponse { name }))
}
