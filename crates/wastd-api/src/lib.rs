//! JSON REST API for WAStD curation.
//!
//! Exposes an axum [`Router`] backed by any [`wastd_core::store::RecordStore`].
//! Auth, TLS, and transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", wastd_api::api_router(store.clone()))
//! ```

pub mod areas;
pub mod display;
pub mod encounters;
pub mod error;
pub mod etag;
pub mod identity;
pub mod observations;
pub mod qa;
pub mod surveys;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use wastd_core::store::RecordStore;

pub use error::ApiError;

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: RecordStore + 'static,
{
  Router::new()
    // Areas
    .route("/areas", get(areas::list::<S>).post(areas::create::<S>))
    .route("/areas/{id}", get(areas::get_one::<S>))
    // Surveys
    .route("/surveys", get(surveys::list::<S>).post(surveys::create::<S>))
    .route("/surveys/{id}", get(surveys::get_one::<S>))
    .route("/surveys/{id}/duplicates", get(surveys::duplicates::<S>))
    .route("/surveys/{id}/reconcile", post(surveys::reconcile::<S>))
    // Encounters
    .route("/encounters", get(encounters::list::<S>).post(encounters::create::<S>))
    .route("/encounters/{id}", get(encounters::get_one::<S>))
    .route("/encounters/{id}/logs", get(encounters::logs::<S>))
    // Quality control
    .route("/encounters/{id}/curate", post(qa::curate::<S>))
    .route("/encounters/{id}/flag", post(qa::flag::<S>))
    .route("/encounters/{id}/reject", post(qa::reject::<S>))
    // Identity
    .route("/encounters/{id}/identity", get(identity::resolve::<S>))
    .route("/encounters/{id}/name", post(identity::rename::<S>))
    .route("/encounters/{id}/name/refresh", post(identity::refresh::<S>))
    // Observations
    .route(
      "/encounters/{id}/observations",
      get(observations::list::<S>).post(observations::create::<S>),
    )
    .route("/encounters/{id}/nest-success", get(observations::nest_success::<S>))
    .with_state(store)
}
