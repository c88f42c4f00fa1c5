//! The `RecordStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `wastd-store-sqlite`).
//! Higher layers (`wastd-api`, `wastd-server`) depend on this abstraction, not
//! on any concrete backend.

use std::future::Future;

use uuid::Uuid;

use crate::{
  encounter::{Encounter, EncounterQuery, NewEncounter},
  identity::IdentityClosure,
  observation::{NewObservation, Observation},
  qa::{Actor, StateLog, Transition, TransitionRequest},
  survey::{Area, NewArea, NewSurvey, ReconciliationReport, Survey, SurveyQuery},
};

/// Backend errors must expose the domain error they wrap, if any, so callers
/// can tell "not found" and "conflict" apart from infrastructure failures.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  fn as_core(&self) -> Option<&crate::Error>;
}

/// Abstraction over a WAStD record store backend.
///
/// Encounter and survey status only ever change through
/// [`RecordStore::transition`], which appends exactly one [`StateLog`] per
/// successful call. State logs are never updated or deleted.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait RecordStore: Send + Sync {
  type Error: StoreError;

  // ── Areas ─────────────────────────────────────────────────────────────

  fn add_area(
    &self,
    input: NewArea,
  ) -> impl Future<Output = Result<Area, Self::Error>> + Send + '_;

  fn get_area(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Area>, Self::Error>> + Send + '_;

  fn list_areas(&self) -> impl Future<Output = Result<Vec<Area>, Self::Error>> + Send + '_;

  // ── Surveys ───────────────────────────────────────────────────────────

  /// Persist a survey. It starts in the `new` QA status.
  fn add_survey(
    &self,
    input: NewSurvey,
  ) -> impl Future<Output = Result<Survey, Self::Error>> + Send + '_;

  fn get_survey(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Survey>, Self::Error>> + Send + '_;

  fn list_surveys(
    &self,
    query: SurveyQuery,
  ) -> impl Future<Output = Result<Vec<Survey>, Self::Error>> + Send + '_;

  /// Surveys that duplicate `survey_id` (same site, same local date,
  /// overlapping interval). Read-only.
  fn duplicate_surveys(
    &self,
    survey_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Survey>, Self::Error>> + Send + '_;

  /// Make `survey_id` the production survey of its site and night, absorbing
  /// the encounters of its duplicates. Runs in a single transaction.
  fn reconcile_duplicates(
    &self,
    survey_id: Uuid,
    actor: Actor,
  ) -> impl Future<Output = Result<ReconciliationReport, Self::Error>> + Send + '_;

  // ── Encounters ────────────────────────────────────────────────────────

  /// Persist an encounter in the entry state chosen by `input.entry`.
  ///
  /// Returns an error if another record already has the same
  /// `(source, source_id)`.
  fn add_encounter(
    &self,
    input: NewEncounter,
  ) -> impl Future<Output = Result<Encounter, Self::Error>> + Send + '_;

  fn get_encounter(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Encounter>, Self::Error>> + Send + '_;

  fn list_encounters(
    &self,
    query: EncounterQuery,
  ) -> impl Future<Output = Result<Vec<Encounter>, Self::Error>> + Send + '_;

  // ── Observations ──────────────────────────────────────────────────────

  /// Attach an observation to its encounter. Tag readings refresh the
  /// encounter's identity name.
  fn record_observation(
    &self,
    input: NewObservation,
  ) -> impl Future<Output = Result<Observation, Self::Error>> + Send + '_;

  fn get_observations(
    &self,
    encounter_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Observation>, Self::Error>> + Send + '_;

  // ── Quality control ───────────────────────────────────────────────────

  /// Apply a QA transition to an encounter.
  ///
  /// The source state, the configured guard and the optional expected status
  /// are all checked against the stored status under the write lock. On
  /// success the status update and its log entry are committed together.
  fn transition(
    &self,
    encounter_id: Uuid,
    request: TransitionRequest,
  ) -> impl Future<Output = Result<(Encounter, StateLog), Self::Error>> + Send + '_;

  fn curate(
    &self,
    encounter_id: Uuid,
    actor: Actor,
    description: Option<String>,
  ) -> impl Future<Output = Result<(Encounter, StateLog), Self::Error>> + Send + '_ {
    self.transition(
      encounter_id,
      TransitionRequest::new(Transition::Curate, actor, description),
    )
  }

  fn flag(
    &self,
    encounter_id: Uuid,
    actor: Actor,
    description: Option<String>,
  ) -> impl Future<Output = Result<(Encounter, StateLog), Self::Error>> + Send + '_ {
    self.transition(
      encounter_id,
      TransitionRequest::new(Transition::Flag, actor, description),
    )
  }

  fn reject(
    &self,
    encounter_id: Uuid,
    actor: Actor,
    description: Option<String>,
  ) -> impl Future<Output = Result<(Encounter, StateLog), Self::Error>> + Send + '_ {
    self.transition(
      encounter_id,
      TransitionRequest::new(Transition::Reject, actor, description),
    )
  }

  /// The state log of an encounter or survey, oldest first.
  fn state_logs(
    &self,
    subject_id: Uuid,
  ) -> impl Future<Output = Result<Vec<StateLog>, Self::Error>> + Send + '_;

  // ── Identity ──────────────────────────────────────────────────────────

  /// Every encounter transitively linked to `encounter_id` by shared tags.
  fn resolve_identity(
    &self,
    encounter_id: Uuid,
  ) -> impl Future<Output = Result<IdentityClosure, Self::Error>> + Send + '_;

  /// Write `name` to every encounter of the identity closure in one
  /// transaction. Returns the closure that was renamed.
  fn propagate_name(
    &self,
    encounter_id: Uuid,
    name: String,
  ) -> impl Future<Output = Result<IdentityClosure, Self::Error>> + Send + '_;

  /// Infer the closure's name from its tags and propagate it. Returns the
  /// inferred name; the closure is left untouched when there is none.
  fn refresh_name(
    &self,
    encounter_id: Uuid,
  ) -> impl Future<Output = Result<Option<String>, Self::Error>> + Send + '_;
}
