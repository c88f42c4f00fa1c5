//! ETag computation for encounter resources.
//!
//! An encounter's ETag is a SHA-256 hash over its id, QA status, identity
//! name and the number of state-log entries. Any transition appends a log
//! entry, so the tag changes even when a CURATED → FLAGGED → CURATED round
//! trip restores the status.

use sha2::{Digest, Sha256};
use wastd_core::encounter::Encounter;

pub fn compute_etag(encounter: &Encounter, log_count: usize) -> String {
  let mut hasher = Sha256::new();
  hasher.update(encounter.encounter_id.as_bytes());
  hasher.update(encounter.status.as_str().as_bytes());
  hasher.update([0]);
  hasher.update(encounter.name.as_deref().unwrap_or_default().as_bytes());
  hasher.update([0]);
  hasher.update((log_count as u64).to_le_bytes());
  format!("\"{}\"", hex::encode(hasher.finalize()))
}

/// Whether an `If-Match` header value matches `etag`.
///
/// Clients send ETags with or without the surrounding `"`; `*` matches any
/// existing resource.
pub fn if_match_satisfied(header: &str, etag: &str) -> bool {
  header
    .split(',')
    .map(|candidate| candidate.trim().trim_start_matches("W/").trim_matches('"'))
    .any(|candidate| candidate == "*" || candidate == etag.trim_matches('"'))
}

#[cfg(test)]
mod tests {
  use chrono::{TimeZone, Utc};
  use uuid::Uuid;
  use wastd_core::{encounter::EncounterType, geo::Point, qa::QaStatus};

  use super::*;

  fn encounter(status: QaStatus) -> Encounter {
    let when = Utc.with_ymd_and_hms(2023, 11, 20, 12, 0, 0).unwrap();
    Encounter {
      encounter_id: Uuid::nil(),
      encounter_type: EncounterType::Tagging,
      when,
      location: Point::new(115.0, -21.0),
      status,
      source: "odk".into(),
      source_id: "1".into(),
      observer: "a".into(),
      reporter: "a".into(),
      name: None,
      campaign_id: None,
      survey_id: None,
      area_id: None,
      site_id: None,
      created_at: when,
    }
  }

  #[test]
  fn status_round_trip_still_changes_etag() {
    let curated = encounter(QaStatus::Curated);
    assert_ne!(compute_etag(&curated, 1), compute_etag(&curated, 3));
    assert_ne!(compute_etag(&curated, 1), compute_etag(&encounter(QaStatus::New), 1));
  }

  #[test]
  fn if_match_accepts_quoted_unquoted_and_wildcard() {
    let etag = compute_etag(&encounter(QaStatus::New), 0);
    let bare = etag.trim_matches('"').to_owned();
    assert!(if_match_satisfied(&etag, &etag));
    assert!(if_match_satisfied(&bare, &etag));
    assert!(if_match_satisfied("*", &etag));
    assert!(if_match_satisfied(&format!("\"other\", {etag}"), &etag));
    assert!(!if_match_satisfied("\"other\"", &etag));
  }
}
