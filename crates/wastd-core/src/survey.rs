//! Areas, surveys and the reconciliation of duplicate surveys.
//!
//! Field teams often start several surveys of the same site on the same
//! night. Reconciliation picks one survey as the production survey, moves
//! every encounter recorded within its site onto it, widens its time window
//! to cover those encounters and retires the rest. This module holds the pure
//! parts of that plan; the store applies it in a single transaction.

use chrono::{DateTime, Duration, FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{geo::Polygon, qa::QaStatus};

// ─── Areas ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AreaType {
  /// A larger region containing sites, e.g. a whole island.
  Locality,
  /// A surveyed stretch of beach.
  Site,
}

impl AreaType {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Locality => "locality",
      Self::Site => "site",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    match s {
      "locality" => Some(Self::Locality),
      "site" => Some(Self::Site),
      _ => None,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Area {
  pub area_id:   Uuid,
  pub area_type: AreaType,
  pub name:      String,
  pub geom:      Polygon,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewArea {
  pub area_type: AreaType,
  pub name:      String,
  pub geom:      Polygon,
}

// ─── Surveys ─────────────────────────────────────────────────────────────────

/// A bounded observation session at one site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Survey {
  pub survey_id:  Uuid,
  pub source:     String,
  pub source_id:  String,
  pub site_id:    Option<Uuid>,
  pub start_time: DateTime<Utc>,
  /// Unset while the survey is still running.
  pub end_time:   Option<DateTime<Utc>>,
  /// Whether this survey is the authoritative one for its site and night.
  pub production: bool,
  pub status:     QaStatus,
  pub reporter:   Option<String>,
  pub label:      Option<String>,
}

impl Survey {
  pub fn window(&self) -> Option<TimeWindow> {
    self
      .end_time
      .map(|end| TimeWindow { start: self.start_time, end })
  }
}

/// Input to [`crate::store::RecordStore::add_survey`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSurvey {
  pub source:     String,
  pub source_id:  String,
  #[serde(default)]
  pub site_id:    Option<Uuid>,
  pub start_time: DateTime<Utc>,
  #[serde(default)]
  pub end_time:   Option<DateTime<Utc>>,
  #[serde(default = "default_production")]
  pub production: bool,
  #[serde(default)]
  pub reporter:   Option<String>,
  #[serde(default)]
  pub label:      Option<String>,
}

fn default_production() -> bool { true }

impl NewSurvey {
  pub fn new(
    source: impl Into<String>,
    source_id: impl Into<String>,
    site_id: Option<Uuid>,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
  ) -> Self {
    Self {
      source: source.into(),
      source_id: source_id.into(),
      site_id,
      start_time,
      end_time,
      production: true,
      reporter: None,
      label: None,
    }
  }
}

/// Parameters for [`crate::store::RecordStore::list_surveys`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SurveyQuery {
  pub site_id:    Option<Uuid>,
  pub production: Option<bool>,
  pub limit:      Option<usize>,
  pub offset:     Option<usize>,
}

// ─── Reconciliation ──────────────────────────────────────────────────────────

/// A closed time interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
  pub start: DateTime<Utc>,
  pub end:   DateTime<Utc>,
}

/// Western Australian standard time, UTC+08:00.
const AWST_SECONDS: i32 = 8 * 3600;

/// Tunables for duplicate detection and reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOptions {
  /// Margin added around retained encounters when widening the window.
  pub buffer:       Duration,
  /// The local time zone whose calendar date groups surveys into nights.
  pub local_offset: FixedOffset,
}

impl Default for ReconcileOptions {
  fn default() -> Self {
    Self {
      buffer:       Duration::minutes(30),
      local_offset: FixedOffset::east_opt(AWST_SECONDS).unwrap_or(Utc.fix()),
    }
  }
}

impl ReconcileOptions {
  /// Options from plain numbers, as found in configuration files.
  ///
  /// Returns `None` when the offset is outside ±24 hours.
  pub fn from_minutes_and_hours(buffer_minutes: i64, utc_offset_hours: i32) -> Option<Self> {
    Some(Self {
      buffer:       Duration::minutes(buffer_minutes),
      local_offset: FixedOffset::east_opt(utc_offset_hours.checked_mul(3600)?)?,
    })
  }
}

/// Whether `other` duplicates `survey`: same site, same local start date and
/// overlapping intervals. A missing end time counts as open-ended. Surveys
/// without a site have no duplicates.
pub fn is_duplicate(survey: &Survey, other: &Survey, opts: &ReconcileOptions) -> bool {
  if other.survey_id == survey.survey_id
    || survey.site_id.is_none()
    || other.site_id != survey.site_id
  {
    return false;
  }
  let local_date = |t: DateTime<Utc>| t.with_timezone(&opts.local_offset).date_naive();
  if local_date(other.start_time) != local_date(survey.start_time) {
    return false;
  }
  let starts_before_end = survey.end_time.is_none_or(|end| other.start_time < end);
  let ends_after_start = other.end_time.is_none_or(|end| end > survey.start_time);
  starts_before_end && ends_after_start
}

/// Grow `window` to cover every time in `times` that falls outside it. An
/// edge only moves when a time lies beyond it, and then to `buffer` past the
/// furthest such time; times already inside leave the window alone. Returns
/// `None` when nothing changed.
pub fn expand_window(
  window: TimeWindow,
  times: impl IntoIterator<Item = DateTime<Utc>>,
  buffer: Duration,
) -> Option<TimeWindow> {
  let mut grown = window;
  for t in times {
    if t < window.start {
      grown.start = grown.start.min(t - buffer);
    }
    if t > window.end {
      grown.end = grown.end.max(t + buffer);
    }
  }
  (grown != window).then_some(grown)
}

/// The outcome of [`crate::store::RecordStore::reconcile_duplicates`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationReport {
  pub survey_id:         Uuid,
  pub closed_duplicates: Vec<Uuid>,
  /// Encounters now attached to the production survey that were not before.
  pub reassigned_count:  usize,
  /// Encounters detached because they lie outside the site.
  pub orphaned_count:    usize,
  /// The widened window, if it had to grow.
  pub adjusted_window:   Option<TimeWindow>,
  pub message:           String,
}

impl ReconciliationReport {
  pub fn summarize(&mut self) {
    let mut parts = vec![format!(
      "closed {} duplicate survey(s)",
      self.closed_duplicates.len()
    )];
    parts.push(format!("reassigned {} encounter(s)", self.reassigned_count));
    if self.orphaned_count > 0 {
      parts.push(format!(
        "orphaned {} encounter(s) outside the site",
        self.orphaned_count
      ));
    }
    if let Some(w) = self.adjusted_window {
      parts.push(format!(
        "adjusted window to {} .. {}",
        w.start.to_rfc3339(),
        w.end.to_rfc3339()
      ));
    }
    self.message = parts.join("; ");
  }
}
