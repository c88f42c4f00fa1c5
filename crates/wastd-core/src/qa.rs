//! The quality-control state machine.
//!
//! A curatable record carries a [`QaStatus`]. Callers never write the status
//! directly: they request a [`Transition`], which is checked against the static
//! table in [`Transition::sources`], then against the configured
//! [`TransitionGuard`], and only then applied by the store together with
//! exactly one [`StateLog`] entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Status ──────────────────────────────────────────────────────────────────

/// QA status of an encounter or survey: how far its data can be trusted.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  EnumIter,
)]
pub enum QaStatus {
  #[default]
  #[serde(rename = "new")]
  #[strum(serialize = "new")]
  New,
  #[serde(rename = "imported")]
  #[strum(serialize = "imported")]
  Imported,
  #[serde(rename = "manual input")]
  #[strum(serialize = "manual input")]
  ManualInput,
  #[serde(rename = "proofread")]
  #[strum(serialize = "proofread")]
  Proofread,
  #[serde(rename = "curated")]
  #[strum(serialize = "curated")]
  Curated,
  #[serde(rename = "published")]
  #[strum(serialize = "published")]
  Published,
  #[serde(rename = "flagged")]
  #[strum(serialize = "flagged")]
  Flagged,
  #[serde(rename = "rejected")]
  #[strum(serialize = "rejected")]
  Rejected,
}

impl QaStatus {
  /// The string stored in the `status` column.
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::New => "new",
      Self::Imported => "imported",
      Self::ManualInput => "manual input",
      Self::Proofread => "proofread",
      Self::Curated => "curated",
      Self::Published => "published",
      Self::Flagged => "flagged",
      Self::Rejected => "rejected",
    }
  }

  /// Parse a stored status string.
  pub fn parse(s: &str) -> Result<Self> {
    s.parse().map_err(|_| Error::UnknownStatus(s.to_owned()))
  }

  /// Whether records enter the system in this state.
  pub fn is_entry(&self) -> bool {
    matches!(self, Self::New | Self::Imported | Self::ManualInput)
  }
}

/// How a record entered the system; determines its initial [`QaStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryState {
  #[default]
  New,
  Imported,
  ManualInput,
}

impl From<EntryState> for QaStatus {
  fn from(e: EntryState) -> Self {
    match e {
      EntryState::New => QaStatus::New,
      EntryState::Imported => QaStatus::Imported,
      EntryState::ManualInput => QaStatus::ManualInput,
    }
  }
}

// ─── Transitions ─────────────────────────────────────────────────────────────

/// A QA transition a caller may request.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Transition {
  Curate,
  Flag,
  Reject,
}

const CURATE_SOURCES: &[QaStatus] = &[
  QaStatus::New,
  QaStatus::Imported,
  QaStatus::ManualInput,
  QaStatus::Flagged,
];
const FLAG_SOURCES: &[QaStatus] = &[
  QaStatus::New,
  QaStatus::Imported,
  QaStatus::ManualInput,
  QaStatus::Curated,
];
const REJECT_SOURCES: &[QaStatus] = &[
  QaStatus::New,
  QaStatus::Imported,
  QaStatus::ManualInput,
  QaStatus::Flagged,
];

impl Transition {
  /// States from which this transition may be taken.
  pub fn sources(&self) -> &'static [QaStatus] {
    match self {
      Self::Curate => CURATE_SOURCES,
      Self::Flag => FLAG_SOURCES,
      Self::Reject => REJECT_SOURCES,
    }
  }

  /// The state this transition leads to.
  pub fn target(&self) -> QaStatus {
    match self {
      Self::Curate => QaStatus::Curated,
      Self::Flag => QaStatus::Flagged,
      Self::Reject => QaStatus::Rejected,
    }
  }

  pub fn allowed_from(&self, current: QaStatus) -> bool {
    self.sources().contains(&current)
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Curate => "curate",
      Self::Flag => "flag",
      Self::Reject => "reject",
    }
  }
}

// ─── Actor ───────────────────────────────────────────────────────────────────

/// The person performing a transition. Always supplied explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Actor(String);

impl Actor {
  pub fn new(name: impl Into<String>) -> Result<Self> {
    let name = name.into();
    if name.trim().is_empty() {
      return Err(Error::EmptyActor);
    }
    Ok(Self(name))
  }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl TryFrom<String> for Actor {
  type Error = Error;

  fn try_from(value: String) -> Result<Self> { Self::new(value) }
}

impl From<Actor> for String {
  fn from(a: Actor) -> Self { a.0 }
}

impl std::fmt::Display for Actor {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(&self.0)
  }
}

// ─── Guards ──────────────────────────────────────────────────────────────────

/// What a guard gets to look at before a transition is applied.
#[derive(Debug, Clone, Copy)]
pub struct GuardContext<'a> {
  pub subject_id:   Uuid,
  pub subject_kind: SubjectKind,
  pub current:      QaStatus,
  pub actor:        &'a Actor,
}

/// Business-rule hook evaluated for every transition whose source state is
/// legal. Return `Err(reason)` to refuse.
pub trait TransitionGuard: Send + Sync {
  fn check(
    &self,
    transition: Transition,
    ctx: &GuardContext<'_>,
  ) -> std::result::Result<(), String>;
}

/// The default guard: every legal transition is allowed.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unguarded;

impl TransitionGuard for Unguarded {
  fn check(
    &self,
    _transition: Transition,
    _ctx: &GuardContext<'_>,
  ) -> std::result::Result<(), String> {
    Ok(())
  }
}

/// Validate `transition` from `ctx.current` and return the target state.
///
/// Pure: evaluates the source table first, then the guard.
pub fn plan_transition(
  transition: Transition,
  ctx: &GuardContext<'_>,
  guard: &dyn TransitionGuard,
) -> Result<QaStatus> {
  if !transition.allowed_from(ctx.current) {
    return Err(Error::InvalidTransition {
      subject_id: ctx.subject_id,
      current:    ctx.current,
      attempted:  transition,
      allowed:    transition.sources().to_vec(),
    });
  }
  guard
    .check(transition, ctx)
    .map_err(|reason| Error::TransitionRefused { transition, reason })?;
  Ok(transition.target())
}

// ─── Requests and logs ───────────────────────────────────────────────────────

/// Input to [`crate::store::RecordStore::transition`].
#[derive(Debug, Clone)]
pub struct TransitionRequest {
  pub transition:      Transition,
  pub actor:           Actor,
  pub description:     Option<String>,
  /// If set, the transition is refused with [`Error::StaleStatus`] unless the
  /// stored status still equals this value.
  pub expected_status: Option<QaStatus>,
  /// If set, the transition is refused with [`Error::StaleHistory`] unless
  /// the subject still has exactly this many state log entries.
  pub expected_logs:   Option<usize>,
}

impl TransitionRequest {
  pub fn new(transition: Transition, actor: Actor, description: Option<String>) -> Self {
    Self {
      transition,
      actor,
      description,
      expected_status: None,
      expected_logs: None,
    }
  }

  pub fn expecting(mut self, status: QaStatus) -> Self {
    self.expected_status = Some(status);
    self
  }

  pub fn expecting_logs(mut self, count: usize) -> Self {
    self.expected_logs = Some(count);
    self
  }
}

/// The kind of record a [`StateLog`] entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectKind {
  Encounter,
  Survey,
}

impl SubjectKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Encounter => "encounter",
      Self::Survey => "survey",
    }
  }
}

/// An immutable record of one applied transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateLog {
  pub log_id:       Uuid,
  pub subject_id:   Uuid,
  pub subject_kind: SubjectKind,
  pub transition:   Transition,
  pub source_state: QaStatus,
  /// The resulting state.
  pub state:        QaStatus,
  pub actor:        Actor,
  pub description:  Option<String>,
  pub timestamp:    DateTime<Utc>,
}
