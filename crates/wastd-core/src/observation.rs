//! Observations: typed measurements attached to exactly one encounter.
//!
//! The set of observation kinds is closed: each kind is a variant of
//! [`ObservationValue`] carrying its own fields, and the variant name doubles
//! as the `observation_type` discriminant stored in the database.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, identity::TagKey, nest::NestValue};

// ─── Tags ────────────────────────────────────────────────────────────────────

/// The kind of identifying tag or sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TagType {
  FlipperTag,
  PitTag,
  SatelliteTag,
  DataLogger,
  BloodSample,
  BiopsySample,
  Other,
}

impl TagType {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::FlipperTag => "flipper-tag",
      Self::PitTag => "pit-tag",
      Self::SatelliteTag => "satellite-tag",
      Self::DataLogger => "data-logger",
      Self::BloodSample => "blood-sample",
      Self::BiopsySample => "biopsy-sample",
      Self::Other => "other",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    Some(match s {
      "flipper-tag" => Self::FlipperTag,
      "pit-tag" => Self::PitTag,
      "satellite-tag" => Self::SatelliteTag,
      "data-logger" => Self::DataLogger,
      "blood-sample" => Self::BloodSample,
      "biopsy-sample" => Self::BiopsySample,
      "other" => Self::Other,
      _ => return None,
    })
  }

  /// Flipper and PIT tags are the ones an animal is named after.
  pub fn names_animal(&self) -> bool { matches!(self, Self::FlipperTag | Self::PitTag) }
}

/// Where the tag was in its life cycle after the encounter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TagStatus {
  Ordered,
  Produced,
  Delivered,
  Allocated,
  AppliedNew,
  #[default]
  Resighted,
  Reclinched,
  Removed,
  NotAttached,
  Lost,
  Returned,
  Decommissioned,
}

impl TagStatus {
  /// First association of the tag with the animal.
  pub fn is_new(&self) -> bool { matches!(self, Self::AppliedNew) }

  /// The tag was already on the animal when encountered.
  pub fn is_recapture(&self) -> bool {
    matches!(self, Self::Resighted | Self::Reclinched | Self::Removed)
  }
}

/// A reading of an identifying tag (flipper tag, PIT tag, sample barcode…).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagValue {
  pub tag_type:     TagType,
  /// Body-part code, e.g. `L1` for the first left front flipper position.
  /// The lowest code on an encounter is its primary tag.
  pub tag_location: String,
  /// The tag's identifier string.
  pub name:         String,
  #[serde(default)]
  pub status:       TagStatus,
  pub comments:     Option<String>,
}

impl TagValue {
  pub fn key(&self) -> TagKey { TagKey::new(self.tag_type, self.name.clone()) }
}

// ─── Other observation kinds ─────────────────────────────────────────────────

/// Carapace measurements and weight of an adult turtle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TurtleMorphometricValue {
  pub curved_carapace_length_mm:    Option<u32>,
  pub curved_carapace_width_mm:     Option<u32>,
  pub straight_carapace_length_mm:  Option<u32>,
  pub body_weight_kg:               Option<f64>,
  pub comments:                     Option<String>,
}

/// Damage or injury observed on an animal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurtleDamageValue {
  pub body_part:   String,
  pub damage_type: String,
  pub damage_age:  Option<String>,
  pub description: Option<String>,
}

/// A disturbance of a nest by a predator or other cause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NestDisturbanceValue {
  pub disturbance_cause:    String,
  pub disturbance_severity: Option<String>,
  pub comments:             Option<String>,
}

/// A tally of tracks or nests of one species and type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackTallyValue {
  pub species:   String,
  pub nest_type: String,
  pub tally:     u32,
}

/// A photo or document attached to an encounter; only the path is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaValue {
  pub media_type: String,
  pub title:      Option<String>,
  pub path:       String,
}

// ─── ObservationValue ────────────────────────────────────────────────────────

/// The typed payload of an observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ObservationValue {
  Tag(TagValue),
  TurtleNest(NestValue),
  TurtleMorphometric(TurtleMorphometricValue),
  TurtleDamage(TurtleDamageValue),
  NestDisturbance(NestDisturbanceValue),
  TrackTally(TrackTallyValue),
  Media(MediaValue),
}

impl ObservationValue {
  /// The discriminant string stored in the `observation_type` column.
  /// Must match the `rename_all = "snake_case"` serde tags above.
  pub fn discriminant(&self) -> &'static str {
    match self {
      Self::Tag(_) => "tag",
      Self::TurtleNest(_) => "turtle_nest",
      Self::TurtleMorphometric(_) => "turtle_morphometric",
      Self::TurtleDamage(_) => "turtle_damage",
      Self::NestDisturbance(_) => "nest_disturbance",
      Self::TrackTally(_) => "track_tally",
      Self::Media(_) => "media",
    }
  }

  pub fn as_tag(&self) -> Option<&TagValue> {
    match self {
      Self::Tag(t) => Some(t),
      _ => None,
    }
  }

  pub fn as_nest(&self) -> Option<&NestValue> {
    match self {
      Self::TurtleNest(n) => Some(n),
      _ => None,
    }
  }

  /// Serialise the inner payload (without the type tag).
  pub fn to_json(&self) -> Result<serde_json::Value> {
    let full = serde_json::to_value(self)?;
    Ok(full.get("data").cloned().unwrap_or(serde_json::Value::Null))
  }

  /// Rebuild from the stored discriminant and payload.
  pub fn from_parts(discriminant: &str, data: serde_json::Value) -> Result<Self> {
    const KNOWN: &[&str] = &[
      "tag",
      "turtle_nest",
      "turtle_morphometric",
      "turtle_damage",
      "nest_disturbance",
      "track_tally",
      "media",
    ];
    if !KNOWN.contains(&discriminant) {
      return Err(Error::UnknownObservationType(discriminant.to_owned()));
    }
    let wrapped = serde_json::json!({ "type": discriminant, "data": data });
    Ok(serde_json::from_value(wrapped)?)
  }
}

// ─── Observation ─────────────────────────────────────────────────────────────

/// A persisted observation, owned by its encounter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
  pub observation_id: Uuid,
  pub encounter_id:   Uuid,
  pub value:          ObservationValue,
  pub recorded_at:    DateTime<Utc>,
}

/// Input to [`crate::store::RecordStore::record_observation`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewObservation {
  pub encounter_id: Uuid,
  pub value:        ObservationValue,
}

impl NewObservation {
  pub fn new(encounter_id: Uuid, value: ObservationValue) -> Self {
    Self { encounter_id, value }
  }

  /// Shorthand for a tag reading.
  pub fn tag(
    encounter_id: Uuid,
    tag_type: TagType,
    name: impl Into<String>,
    status: TagStatus,
  ) -> Self {
    Self::new(
      encounter_id,
      ObservationValue::Tag(TagValue {
        tag_type,
        tag_location: "L1".into(),
        name: name.into(),
        status,
        comments: None,
      }),
    )
  }
}
