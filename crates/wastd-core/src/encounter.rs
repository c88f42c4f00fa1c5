//! Encounters: one dated, located observation event of a subject.

use chrono::{DateTime, Datelike, Months, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  geo::Point,
  qa::{EntryState, QaStatus},
};

/// What kind of event an encounter records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EncounterType {
  Stranding,
  Tagging,
  Inwater,
  Nest,
  Tracks,
  TagManagement,
  Logger,
  #[default]
  Other,
}

impl EncounterType {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Stranding => "stranding",
      Self::Tagging => "tagging",
      Self::Inwater => "inwater",
      Self::Nest => "nest",
      Self::Tracks => "tracks",
      Self::TagManagement => "tag-management",
      Self::Logger => "logger",
      Self::Other => "other",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    Some(match s {
      "stranding" => Self::Stranding,
      "tagging" => Self::Tagging,
      "inwater" => Self::Inwater,
      "nest" => Self::Nest,
      "tracks" => Self::Tracks,
      "tag-management" => Self::TagManagement,
      "logger" => Self::Logger,
      "other" => Self::Other,
      _ => return None,
    })
  }
}

/// A persisted encounter.
///
/// `status` only changes through QA transitions and `name` only through
/// identity propagation; neither is accepted on creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Encounter {
  pub encounter_id:   Uuid,
  pub encounter_type: EncounterType,
  pub when:           DateTime<Utc>,
  pub location:       Point,
  pub status:         QaStatus,
  /// Provenance system; unique together with `source_id`.
  pub source:         String,
  pub source_id:      String,
  pub observer:       String,
  pub reporter:       String,
  /// Subject identifier shared by every encounter of the same animal.
  pub name:           Option<String>,
  pub campaign_id:    Option<Uuid>,
  pub survey_id:      Option<Uuid>,
  pub area_id:        Option<Uuid>,
  pub site_id:        Option<Uuid>,
  pub created_at:     DateTime<Utc>,
}

impl Encounter {
  /// The turtle season: the calendar year six months before `when`.
  pub fn season(&self) -> i32 {
    self
      .when
      .checked_sub_months(Months::new(6))
      .unwrap_or(self.when)
      .year()
  }
}

/// Input to [`crate::store::RecordStore::add_encounter`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEncounter {
  #[serde(default)]
  pub encounter_type: EncounterType,
  pub when:           DateTime<Utc>,
  pub location:       Point,
  #[serde(default)]
  pub entry:          EntryState,
  pub source:         String,
  pub source_id:      String,
  pub observer:       String,
  pub reporter:       String,
  #[serde(default)]
  pub campaign_id:    Option<Uuid>,
  #[serde(default)]
  pub survey_id:      Option<Uuid>,
  #[serde(default)]
  pub area_id:        Option<Uuid>,
  #[serde(default)]
  pub site_id:        Option<Uuid>,
}

impl NewEncounter {
  /// Convenience constructor with every optional link unset.
  pub fn new(
    when: DateTime<Utc>,
    location: Point,
    source: impl Into<String>,
    source_id: impl Into<String>,
    observer: impl Into<String>,
  ) -> Self {
    let observer = observer.into();
    Self {
      encounter_type: EncounterType::default(),
      when,
      location,
      entry: EntryState::default(),
      source: source.into(),
      source_id: source_id.into(),
      reporter: observer.clone(),
      observer,
      campaign_id: None,
      survey_id: None,
      area_id: None,
      site_id: None,
    }
  }
}

/// Parameters for [`crate::store::RecordStore::list_encounters`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EncounterQuery {
  pub status:    Option<QaStatus>,
  pub survey_id: Option<Uuid>,
  pub name:      Option<String>,
  pub limit:     Option<usize>,
  pub offset:    Option<usize>,
}
