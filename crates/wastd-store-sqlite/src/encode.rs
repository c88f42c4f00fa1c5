//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 UTC strings with a fixed number of
//! fractional digits, so lexical order in SQL equals chronological order.
//! Polygons and observation payloads are stored as compact JSON. UUIDs are
//! stored as hyphenated lowercase strings.

use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;
use wastd_core::{
  encounter::{Encounter, EncounterType},
  geo::{Point, Polygon},
  observation::{Observation, ObservationValue},
  qa::{Actor, QaStatus, StateLog, SubjectKind, Transition},
  survey::{Area, AreaType, Survey},
};

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

fn decode_opt_uuid(s: Option<String>) -> Result<Option<Uuid>> {
  s.as_deref().map(decode_uuid).transpose()
}

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

fn decode_status(s: &str) -> Result<QaStatus> { Ok(QaStatus::parse(s)?) }

fn decode_subject_kind(s: &str) -> Result<SubjectKind> {
  match s {
    "encounter" => Ok(SubjectKind::Encounter),
    "survey" => Ok(SubjectKind::Survey),
    other => Err(Error::Decode(format!("unknown subject kind: {other:?}"))),
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

pub const AREA_COLUMNS: &str = "area_id, area_type, name, geom_json";

/// Raw strings read directly from an `areas` row.
pub struct RawArea {
  pub area_id:   String,
  pub area_type: String,
  pub name:      String,
  pub geom_json: String,
}

impl RawArea {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      area_id:   row.get(0)?,
      area_type: row.get(1)?,
      name:      row.get(2)?,
      geom_json: row.get(3)?,
    })
  }

  pub fn into_area(self) -> Result<Area> {
    let geom: Polygon = serde_json::from_str(&self.geom_json)?;
    Ok(Area {
      area_id: decode_uuid(&self.area_id)?,
      area_type: AreaType::parse(&self.area_type)
        .ok_or_else(|| Error::Decode(format!("unknown area type: {:?}", self.area_type)))?,
      name: self.name,
      geom,
    })
  }
}

pub const SURVEY_COLUMNS: &str = "survey_id, source, source_id, site_id, start_time, \
                                  end_time, production, status, reporter, label";

/// Raw strings read directly from a `surveys` row.
pub struct RawSurvey {
  pub survey_id:  String,
  pub source:     String,
  pub source_id:  String,
  pub site_id:    Option<String>,
  pub start_time: String,
  pub end_time:   Option<String>,
  pub production: bool,
  pub status:     String,
  pub reporter:   Option<String>,
  pub label:      Option<String>,
}

impl RawSurvey {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      survey_id:  row.get(0)?,
      source:     row.get(1)?,
      source_id:  row.get(2)?,
      site_id:    row.get(3)?,
      start_time: row.get(4)?,
      end_time:   row.get(5)?,
      production: row.get(6)?,
      status:     row.get(7)?,
      reporter:   row.get(8)?,
      label:      row.get(9)?,
    })
  }

  pub fn into_survey(self) -> Result<Survey> {
    Ok(Survey {
      survey_id:  decode_uuid(&self.survey_id)?,
      source:     self.source,
      source_id:  self.source_id,
      site_id:    decode_opt_uuid(self.site_id)?,
      start_time: decode_dt(&self.start_time)?,
      end_time:   self.end_time.as_deref().map(decode_dt).transpose()?,
      production: self.production,
      status:     decode_status(&self.status)?,
      reporter:   self.reporter,
      label:      self.label,
    })
  }
}

pub const ENCOUNTER_COLUMNS: &str = "encounter_id, encounter_type, when_at, longitude, \
                                     latitude, status, source, source_id, observer, \
                                     reporter, name, campaign_id, survey_id, area_id, \
                                     site_id, created_at";

/// Raw strings read directly from an `encounters` row.
pub struct RawEncounter {
  pub encounter_id:   String,
  pub encounter_type: String,
  pub when_at:        String,
  pub longitude:      f64,
  pub latitude:       f64,
  pub status:         String,
  pub source:         String,
  pub source_id:      String,
  pub observer:       String,
  pub reporter:       String,
  pub name:           Option<String>,
  pub campaign_id:    Option<String>,
  pub survey_id:      Option<String>,
  pub area_id:        Option<String>,
  pub site_id:        Option<String>,
  pub created_at:     String,
}

impl RawEncounter {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      encounter_id:   row.get(0)?,
      encounter_type: row.get(1)?,
      when_at:        row.get(2)?,
      longitude:      row.get(3)?,
      latitude:       row.get(4)?,
      status:         row.get(5)?,
      source:         row.get(6)?,
      source_id:      row.get(7)?,
      observer:       row.get(8)?,
      reporter:       row.get(9)?,
      name:           row.get(10)?,
      campaign_id:    row.get(11)?,
      survey_id:      row.get(12)?,
      area_id:        row.get(13)?,
      site_id:        row.get(14)?,
      created_at:     row.get(15)?,
    })
  }

  pub fn into_encounter(self) -> Result<Encounter> {
    let encounter_type = EncounterType::parse(&self.encounter_type).ok_or_else(|| {
      Error::Decode(format!("unknown encounter type: {:?}", self.encounter_type))
    })?;
    Ok(Encounter {
      encounter_id: decode_uuid(&self.encounter_id)?,
      encounter_type,
      when: decode_dt(&self.when_at)?,
      location: Point::new(self.longitude, self.latitude),
      status: decode_status(&self.status)?,
      source: self.source,
      source_id: self.source_id,
      observer: self.observer,
      reporter: self.reporter,
      name: self.name,
      campaign_id: decode_opt_uuid(self.campaign_id)?,
      survey_id: decode_opt_uuid(self.survey_id)?,
      area_id: decode_opt_uuid(self.area_id)?,
      site_id: decode_opt_uuid(self.site_id)?,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

pub const OBSERVATION_COLUMNS: &str =
  "observation_id, encounter_id, observation_type, value_json, recorded_at";

/// Raw strings read directly from an `observations` row.
pub struct RawObservation {
  pub observation_id:   String,
  pub encounter_id:     String,
  pub observation_type: String,
  pub value_json:       String,
  pub recorded_at:      String,
}

impl RawObservation {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      observation_id:   row.get(0)?,
      encounter_id:     row.get(1)?,
      observation_type: row.get(2)?,
      value_json:       row.get(3)?,
      recorded_at:      row.get(4)?,
    })
  }

  pub fn into_observation(self) -> Result<Observation> {
    let data: serde_json::Value = serde_json::from_str(&self.value_json)?;
    Ok(Observation {
      observation_id: decode_uuid(&self.observation_id)?,
      encounter_id:   decode_uuid(&self.encounter_id)?,
      value:          ObservationValue::from_parts(&self.observation_type, data)?,
      recorded_at:    decode_dt(&self.recorded_at)?,
    })
  }
}

pub const STATE_LOG_COLUMNS: &str = "log_id, subject_id, subject_kind, transition, \
                                     source_state, state, actor, description, timestamp";

/// Raw strings read directly from a `state_logs` row.
pub struct RawStateLog {
  pub log_id:       String,
  pub subject_id:   String,
  pub subject_kind: String,
  pub transition:   String,
  pub source_state: String,
  pub state:        String,
  pub actor:        String,
  pub description:  Option<String>,
  pub timestamp:    String,
}

impl RawStateLog {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      log_id:       row.get(0)?,
      subject_id:   row.get(1)?,
      subject_kind: row.get(2)?,
      transition:   row.get(3)?,
      source_state: row.get(4)?,
      state:        row.get(5)?,
      actor:        row.get(6)?,
      description:  row.get(7)?,
      timestamp:    row.get(8)?,
    })
  }

  pub fn into_state_log(self) -> Result<StateLog> {
    let transition: Transition = self
      .transition
      .parse()
      .map_err(|_| Error::Decode(format!("unknown transition: {:?}", self.transition)))?;
    Ok(StateLog {
      log_id: decode_uuid(&self.log_id)?,
      subject_id: decode_uuid(&self.subject_id)?,
      subject_kind: decode_subject_kind(&self.subject_kind)?,
      transition,
      source_state: decode_status(&self.source_state)?,
      state: decode_status(&self.state)?,
      actor: Actor::new(self.actor)?,
      description: self.description,
      timestamp: decode_dt(&self.timestamp)?,
    })
  }
}
