//! HTTP application and configuration for the `wastd` server.
//!
//! Mounts the JSON API from `wastd-api` under `/api`, adds a `/health` check
//! and request tracing.

use std::{path::PathBuf, sync::Arc};

use axum::{Json, Router, routing::get};
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;
use wastd_core::{identity::LinkScope, store::RecordStore, survey::ReconcileOptions};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `WASTD_*` environment variables. Every key is optional.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
  pub host:                     String,
  pub port:                     u16,
  pub store_path:               PathBuf,
  pub link_scope:               LinkScope,
  pub reconcile_buffer_minutes: i64,
  pub local_utc_offset_hours:   i32,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:                     "127.0.0.1".to_string(),
      port:                     8220,
      store_path:               PathBuf::from("wastd.db"),
      link_scope:               LinkScope::default(),
      reconcile_buffer_minutes: 30,
      local_utc_offset_hours:   8,
    }
  }
}

impl ServerConfig {
  /// Reconciliation options, or `None` if the configured offset is not a
  /// valid time zone offset.
  pub fn reconcile_options(&self) -> Option<ReconcileOptions> {
    ReconcileOptions::from_minutes_and_hours(
      self.reconcile_buffer_minutes,
      self.local_utc_offset_hours,
    )
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the complete application router for `store`.
pub fn app<S>(store: Arc<S>) -> Router
where
  S: RecordStore + 'static,
{
  Router::new()
    .route("/health", get(health))
    .nest("/api", wastd_api::api_router(store))
    .layer(TraceLayer::new_for_http())
}

async fn health() -> Json<Value> { Json(json!({ "status": "ok" })) }
