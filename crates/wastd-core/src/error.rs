//! Error types for `wastd-core`.

use thiserror::Error;
use uuid::Uuid;

use crate::qa::{QaStatus, Transition};

#[derive(Debug, Error)]
pub enum Error {
  #[error("encounter not found: {0}")]
  EncounterNotFound(Uuid),

  #[error("survey not found: {0}")]
  SurveyNotFound(Uuid),

  #[error("area not found: {0}")]
  AreaNotFound(Uuid),

  #[error(
    "cannot {attempted} {subject_id}: status is {current}, allowed from [{}]",
    join_states(.allowed)
  )]
  InvalidTransition {
    subject_id: Uuid,
    current:    QaStatus,
    attempted:  Transition,
    allowed:    Vec<QaStatus>,
  },

  #[error("{transition} refused: {reason}")]
  TransitionRefused {
    transition: Transition,
    reason:     String,
  },

  #[error("status of {subject_id} changed: expected {expected}, found {actual}")]
  StaleStatus {
    subject_id: Uuid,
    expected:   QaStatus,
    actual:     QaStatus,
  },

  #[error("history of {subject_id} changed: expected {expected} log entries, found {actual}")]
  StaleHistory {
    subject_id: Uuid,
    expected:   usize,
    actual:     usize,
  },

  #[error("a record from {data_source:?} with source id {source_id:?} already exists")]
  DuplicateSource {
    data_source: String,
    source_id:   String,
  },

  #[error("survey {0} has no end time")]
  IncompleteSurvey(Uuid),

  #[error("an actor is required")]
  EmptyActor,

  #[error("invalid input: {0}")]
  InvalidInput(String),

  #[error("unknown QA status: {0:?}")]
  UnknownStatus(String),

  #[error("unknown observation type discriminant: {0:?}")]
  UnknownObservationType(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  /// True for the variants that mean "the addressed record does not exist".
  pub fn is_not_found(&self) -> bool {
    matches!(
      self,
      Self::EncounterNotFound(_) | Self::SurveyNotFound(_) | Self::AreaNotFound(_)
    )
  }

  /// True for the variants caused by malformed caller input.
  pub fn is_invalid_input(&self) -> bool {
    matches!(
      self,
      Self::EmptyActor
        | Self::InvalidInput(_)
        | Self::UnknownStatus(_)
        | Self::UnknownObservationType(_)
        | Self::IncompleteSurvey(_)
    )
  }

  /// True for the variants that describe a conflict with the stored state.
  pub fn is_conflict(&self) -> bool {
    matches!(
      self,
      Self::InvalidTransition { .. }
        | Self::TransitionRefused { .. }
        | Self::StaleStatus { .. }
        | Self::StaleHistory { .. }
        | Self::DuplicateSource { .. }
    )
  }

  /// True when the record changed after the caller last read it.
  pub fn is_stale(&self) -> bool {
    matches!(self, Self::StaleStatus { .. } | Self::StaleHistory { .. })
  }
}

fn join_states(states: &[QaStatus]) -> String {
  states
    .iter()
    .map(|s| s.as_str())
    .collect::<Vec<_>>()
    .join(", ")
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
