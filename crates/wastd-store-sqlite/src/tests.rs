//! Integration tests for `SqliteStore` against an in-memory database.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;
use wastd_core::{
  Error as CoreError,
  encounter::{EncounterQuery, NewEncounter},
  geo::{Point, Polygon},
  identity::LinkScope,
  nest::NestValue,
  observation::{NewObservation, ObservationValue, TagStatus, TagType, TagValue},
  qa::{
    Actor, EntryState, GuardContext, QaStatus, SubjectKind, Transition, TransitionGuard,
    TransitionRequest,
  },
  store::RecordStore,
  survey::{AreaType, NewArea, NewSurvey},
};

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn actor(name: &str) -> Actor { Actor::new(name).unwrap() }

fn utc(h: u32, m: u32) -> DateTime<Utc> { Utc.with_ymd_and_hms(2023, 11, 20, h, m, 0).unwrap() }

const INSIDE: Point = Point::new(115.05, -20.95);
const OUTSIDE: Point = Point::new(116.0, -20.95);

async fn encounter_at(s: &SqliteStore, source_id: &str, when: DateTime<Utc>) -> Uuid {
  s.add_encounter(NewEncounter::new(when, INSIDE, "odk", source_id, "Tanya"))
    .await
    .unwrap()
    .encounter_id
}

async fn encounter(s: &SqliteStore, source_id: &str) -> Uuid {
  encounter_at(s, source_id, utc(10, 0)).await
}

async fn tag(s: &SqliteStore, encounter_id: Uuid, name: &str, status: TagStatus) {
  s.record_observation(NewObservation::tag(encounter_id, TagType::FlipperTag, name, status))
    .await
    .unwrap();
}

fn core(err: Error) -> CoreError {
  match err {
    Error::Core(e) => e,
    other => panic!("expected a core error, got {other}"),
  }
}

// ─── Encounters ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn add_and_get_encounter() {
  let s = store().await;
  let mut input = NewEncounter::new(utc(10, 15), INSIDE, "odk", "uuid:1", "Tanya");
  input.entry = EntryState::Imported;
  let added = s.add_encounter(input).await.unwrap();
  assert_eq!(added.status, QaStatus::Imported);
  assert_eq!(added.reporter, "Tanya");
  assert!(added.name.is_none());

  let fetched = s.get_encounter(added.encounter_id).await.unwrap().unwrap();
  assert_eq!(fetched.when, utc(10, 15));
  assert_eq!(fetched.location, INSIDE);
  assert_eq!(fetched.status, QaStatus::Imported);
  assert_eq!(fetched.source_id, "uuid:1");
}

#[tokio::test]
async fn get_encounter_missing_returns_none() {
  let s = store().await;
  assert!(s.get_encounter(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn source_and_source_id_are_unique() {
  let s = store().await;
  encounter(&s, "uuid:1").await;
  let err = s
    .add_encounter(NewEncounter::new(utc(11, 0), INSIDE, "odk", "uuid:1", "Sam"))
    .await
    .unwrap_err();
  assert!(matches!(core(err), CoreError::DuplicateSource { source_id, .. } if source_id == "uuid:1"));

  // The same source id from another source is fine.
  s.add_encounter(NewEncounter::new(utc(11, 0), INSIDE, "paper", "uuid:1", "Sam"))
    .await
    .unwrap();
}

#[tokio::test]
async fn encounter_with_unknown_survey_is_rejected() {
  let s = store().await;
  let mut input = NewEncounter::new(utc(10, 0), INSIDE, "odk", "uuid:1", "Tanya");
  input.survey_id = Some(Uuid::new_v4());
  let err = s.add_encounter(input).await.unwrap_err();
  assert!(core(err).is_not_found());
}

#[tokio::test]
async fn list_encounters_filters_by_status() {
  let s = store().await;
  let a = encounter(&s, "1").await;
  encounter(&s, "2").await;
  encounter(&s, "3").await;
  s.curate(a, actor("Florian"), None).await.unwrap();

  let curated = s
    .list_encounters(EncounterQuery { status: Some(QaStatus::Curated), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(curated.len(), 1);
  assert_eq!(curated[0].encounter_id, a);

  let all = s.list_encounters(EncounterQuery::default()).await.unwrap();
  assert_eq!(all.len(), 3);
}

// ─── QA transitions ──────────────────────────────────────────────────────────

#[tokio::test]
async fn curate_new_encounter_logs_once() {
  let s = store().await;
  let id = encounter(&s, "1").await;

  let (enc, log) = s
    .curate(id, actor("Florian"), Some("checked photos".into()))
    .await
    .unwrap();
  assert_eq!(enc.status, QaStatus::Curated);
  assert_eq!(log.source_state, QaStatus::New);
  assert_eq!(log.state, QaStatus::Curated);
  assert_eq!(log.transition, Transition::Curate);

  let logs = s.state_logs(id).await.unwrap();
  assert_eq!(logs.len(), 1);
  assert_eq!(logs[0].actor.as_str(), "Florian");
  assert_eq!(logs[0].description.as_deref(), Some("checked photos"));
  assert_eq!(logs[0].subject_kind, SubjectKind::Encounter);
}

#[tokio::test]
async fn curate_from_published_is_refused_without_side_effects() {
  let s = store().await;
  let id = encounter(&s, "1").await;
  s.force_status(id, QaStatus::Published).await.unwrap();

  let err = s.curate(id, actor("Florian"), None).await.unwrap_err();
  match core(err) {
    CoreError::InvalidTransition { current, attempted, .. } => {
      assert_eq!(current, QaStatus::Published);
      assert_eq!(attempted, Transition::Curate);
    }
    other => panic!("unexpected error: {other}"),
  }

  let enc = s.get_encounter(id).await.unwrap().unwrap();
  assert_eq!(enc.status, QaStatus::Published);
  assert!(s.state_logs(id).await.unwrap().is_empty());
}

#[tokio::test]
async fn curated_and_flagged_flip_flop() {
  let s = store().await;
  let id = encounter(&s, "1").await;

  s.curate(id, actor("A"), None).await.unwrap();
  s.flag(id, actor("B"), Some("wrong species".into())).await.unwrap();
  let (enc, _) = s.curate(id, actor("A"), None).await.unwrap();
  assert_eq!(enc.status, QaStatus::Curated);

  let states: Vec<_> = s
    .state_logs(id)
    .await
    .unwrap()
    .into_iter()
    .map(|l| (l.source_state, l.state))
    .collect();
  assert_eq!(
    states,
    vec![
      (QaStatus::New, QaStatus::Curated),
      (QaStatus::Curated, QaStatus::Flagged),
      (QaStatus::Flagged, QaStatus::Curated),
    ]
  );
}

#[tokio::test]
async fn rejected_cannot_be_curated() {
  let s = store().await;
  let id = encounter(&s, "1").await;
  s.reject(id, actor("A"), None).await.unwrap();
  let err = s.curate(id, actor("A"), None).await.unwrap_err();
  assert!(matches!(core(err), CoreError::InvalidTransition { .. }));
  assert_eq!(s.state_logs(id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn transition_on_missing_encounter_is_not_found() {
  let s = store().await;
  let missing = Uuid::new_v4();
  let err = s.curate(missing, actor("A"), None).await.unwrap_err();
  assert!(matches!(core(err), CoreError::EncounterNotFound(id) if id == missing));
}

#[tokio::test]
async fn expected_status_mismatch_is_stale() {
  let s = store().await;
  let id = encounter(&s, "1").await;
  s.curate(id, actor("A"), None).await.unwrap();

  let request =
    TransitionRequest::new(Transition::Flag, actor("B"), None).expecting(QaStatus::New);
  let err = s.transition(id, request).await.unwrap_err();
  assert!(matches!(
    core(err),
    CoreError::StaleStatus { expected: QaStatus::New, actual: QaStatus::Curated, .. }
  ));
  assert_eq!(s.state_logs(id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn history_mismatch_is_stale_even_when_status_matches() {
  let s = store().await;
  let id = encounter(&s, "1").await;
  s.curate(id, actor("A"), None).await.unwrap();
  let read_logs = s.state_logs(id).await.unwrap().len();

  // Someone else flags and re-curates in between.
  s.flag(id, actor("B"), None).await.unwrap();
  s.curate(id, actor("B"), None).await.unwrap();

  let request = TransitionRequest::new(Transition::Flag, actor("A"), None)
    .expecting(QaStatus::Curated)
    .expecting_logs(read_logs);
  let err = core(s.transition(id, request).await.unwrap_err());
  assert!(err.is_stale());
  assert!(matches!(err, CoreError::StaleHistory { expected: 1, actual: 3, .. }));
  assert_eq!(s.state_logs(id).await.unwrap().len(), 3);

  let current = TransitionRequest::new(Transition::Flag, actor("A"), None)
    .expecting(QaStatus::Curated)
    .expecting_logs(3);
  s.transition(id, current).await.unwrap();
}

struct FlaggingDisabled;

impl TransitionGuard for FlaggingDisabled {
  fn check(&self, transition: Transition, _ctx: &GuardContext<'_>) -> Result<(), String> {
    match transition {
      Transition::Flag => Err("flagging is disabled".into()),
      _ => Ok(()),
    }
  }
}

#[tokio::test]
async fn guard_refusal_leaves_no_trace() {
  let s = store().await.with_guard(Arc::new(FlaggingDisabled));
  let id = encounter(&s, "1").await;

  let err = s.flag(id, actor("A"), None).await.unwrap_err();
  assert!(matches!(core(err), CoreError::TransitionRefused { transition: Transition::Flag, .. }));
  assert_eq!(s.get_encounter(id).await.unwrap().unwrap().status, QaStatus::New);
  assert!(s.state_logs(id).await.unwrap().is_empty());

  s.curate(id, actor("A"), None).await.unwrap();
}

#[tokio::test]
async fn concurrent_curations_apply_once() {
  let s = store().await;
  let id = encounter(&s, "1").await;

  let (s1, s2) = (s.clone(), s.clone());
  let a = tokio::spawn(async move { s1.curate(id, actor("A"), None).await });
  let b = tokio::spawn(async move { s2.curate(id, actor("B"), None).await });
  let results = [a.await.unwrap(), b.await.unwrap()];

  assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
  let loser = results.into_iter().find_map(Result::err).unwrap();
  assert!(matches!(core(loser), CoreError::InvalidTransition { current: QaStatus::Curated, .. }));
  assert_eq!(s.state_logs(id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn state_logs_are_append_only() {
  let s = store().await;
  let id = encounter(&s, "1").await;
  s.curate(id, actor("A"), None).await.unwrap();

  assert!(s.raw_execute("UPDATE state_logs SET actor = 'Mallory'").await.is_err());
  assert!(s.raw_execute("DELETE FROM state_logs").await.is_err());
  assert_eq!(s.state_logs(id).await.unwrap()[0].actor.as_str(), "A");
}

#[tokio::test]
async fn transitions_leave_observations_alone() {
  let s = store().await;
  let id = encounter(&s, "1").await;
  tag(&s, id, "WA1", TagStatus::AppliedNew).await;
  s.reject(id, actor("A"), None).await.unwrap();
  assert_eq!(s.get_observations(id).await.unwrap().len(), 1);
}

// ─── Identity ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn shared_tag_links_encounters_and_names_them() {
  let s = store().await;
  let a = encounter_at(&s, "a", utc(10, 0)).await;
  let b = encounter_at(&s, "b", utc(11, 0)).await;
  let c = encounter_at(&s, "c", utc(12, 0)).await;
  tag(&s, a, "WA1234", TagStatus::AppliedNew).await;
  tag(&s, b, "WA1234", TagStatus::Resighted).await;

  let closure = s.resolve_identity(a).await.unwrap();
  assert_eq!(closure.encounters.len(), 2);
  assert!(closure.contains(b));

  let lone = s.resolve_identity(c).await.unwrap();
  assert_eq!(lone.encounters.into_iter().collect::<Vec<_>>(), vec![c]);

  for id in [a, b] {
    let enc = s.get_encounter(id).await.unwrap().unwrap();
    assert_eq!(enc.name.as_deref(), Some("WA1234"));
  }
  assert!(s.get_encounter(c).await.unwrap().unwrap().name.is_none());
}

#[tokio::test]
async fn closure_follows_chains_and_is_symmetric() {
  let s = store().await;
  let a = encounter_at(&s, "a", utc(10, 0)).await;
  let b = encounter_at(&s, "b", utc(11, 0)).await;
  let c = encounter_at(&s, "c", utc(12, 0)).await;
  tag(&s, a, "WA1", TagStatus::AppliedNew).await;
  tag(&s, b, "WA1", TagStatus::Resighted).await;
  tag(&s, b, "WA2", TagStatus::AppliedNew).await;
  tag(&s, c, "WA2", TagStatus::Resighted).await;

  let from_a = s.resolve_identity(a).await.unwrap().encounters;
  assert_eq!(from_a.len(), 3);
  assert_eq!(s.resolve_identity(c).await.unwrap().encounters, from_a);

  // WA1 was applied first, on the earliest encounter.
  let named = s
    .list_encounters(EncounterQuery { name: Some("WA1".into()), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(named.len(), 3);
}

#[tokio::test]
async fn link_scope_controls_cross_type_matches() {
  let s = store().await;
  let a = encounter(&s, "a").await;
  let b = encounter(&s, "b").await;
  tag(&s, a, "001", TagStatus::AppliedNew).await;
  s.record_observation(NewObservation::tag(b, TagType::PitTag, "001", TagStatus::AppliedNew))
    .await
    .unwrap();

  assert_eq!(s.resolve_identity(a).await.unwrap().encounters.len(), 1);

  let broad = s.clone().with_link_scope(LinkScope::NameOnly);
  assert_eq!(broad.resolve_identity(a).await.unwrap().encounters.len(), 2);
}

#[tokio::test]
async fn propagate_name_renames_the_whole_closure() {
  let s = store().await;
  let a = encounter(&s, "a").await;
  let b = encounter(&s, "b").await;
  tag(&s, a, "WA1", TagStatus::AppliedNew).await;
  tag(&s, b, "WA1", TagStatus::Resighted).await;

  let closure = s.propagate_name(b, "Myrtle".into()).await.unwrap();
  assert_eq!(closure.encounters.len(), 2);
  for id in [a, b] {
    assert_eq!(s.get_encounter(id).await.unwrap().unwrap().name.as_deref(), Some("Myrtle"));
  }

  // Refreshing goes back to the tag-derived name.
  assert_eq!(s.refresh_name(a).await.unwrap().as_deref(), Some("WA1"));
  assert_eq!(s.get_encounter(b).await.unwrap().unwrap().name.as_deref(), Some("WA1"));
}

#[tokio::test]
async fn blank_name_is_invalid() {
  let s = store().await;
  let a = encounter(&s, "a").await;
  let err = s.propagate_name(a, "  ".into()).await.unwrap_err();
  assert!(core(err).is_invalid_input());
}

#[tokio::test]
async fn identity_of_missing_encounter_is_not_found() {
  let s = store().await;
  let err = s.resolve_identity(Uuid::new_v4()).await.unwrap_err();
  assert!(core(err).is_not_found());
}

// ─── Observations ────────────────────────────────────────────────────────────

#[tokio::test]
async fn observations_roundtrip_in_order() {
  let s = store().await;
  let id = encounter(&s, "1").await;
  let nest = NestValue {
    no_egg_shells: Some(50),
    no_undeveloped_eggs: Some(5),
    no_unhatched_eggs: Some(3),
    no_unhatched_term: Some(2),
    ..Default::default()
  };
  s.record_observation(NewObservation::new(id, ObservationValue::TurtleNest(nest.clone())))
    .await
    .unwrap();
  s.record_observation(NewObservation::new(
    id,
    ObservationValue::Tag(TagValue {
      tag_type:     TagType::PitTag,
      tag_location: "R2".into(),
      name:         "900123".into(),
      status:       TagStatus::AppliedNew,
      comments:     Some("left shoulder".into()),
    }),
  ))
  .await
  .unwrap();

  let observations = s.get_observations(id).await.unwrap();
  assert_eq!(observations.len(), 2);
  let stored_nest = observations[0].value.as_nest().unwrap();
  assert_eq!(stored_nest, &nest);
  assert_eq!(stored_nest.hatching_success(), Some(83.3));
  assert_eq!(observations[1].value.as_tag().unwrap().name, "900123");
}

#[tokio::test]
async fn observation_for_missing_encounter_is_not_found() {
  let s = store().await;
  let err = s
    .record_observation(NewObservation::tag(
      Uuid::new_v4(),
      TagType::FlipperTag,
      "WA1",
      TagStatus::AppliedNew,
    ))
    .await
    .unwrap_err();
  assert!(core(err).is_not_found());
}

// ─── Surveys ─────────────────────────────────────────────────────────────────

struct Night {
  s1:      Uuid,
  s2:      Uuid,
  inside:  Uuid,
  late:    Uuid,
  outside: Uuid,
}

async fn survey_encounter(
  s: &SqliteStore,
  source_id: &str,
  when: DateTime<Utc>,
  location: Point,
  survey_id: Uuid,
  site_id: Uuid,
) -> Uuid {
  let mut input = NewEncounter::new(when, location, "odk", source_id, "Tanya");
  input.survey_id = Some(survey_id);
  input.site_id = Some(site_id);
  s.add_encounter(input).await.unwrap().encounter_id
}

async fn cable_beach(s: &SqliteStore) -> Uuid {
  s.add_area(NewArea {
    area_type: AreaType::Site,
    name:      "Cable Beach".into(),
    geom:      Polygon::rectangle(115.0, -21.0, 115.1, -20.9),
  })
  .await
  .unwrap()
  .area_id
}

async fn survey(
  s: &SqliteStore,
  source_id: &str,
  site_id: Uuid,
  start: DateTime<Utc>,
  end: DateTime<Utc>,
) -> Uuid {
  s.add_survey(NewSurvey::new("odk", source_id, Some(site_id), start, Some(end)))
    .await
    .unwrap()
    .survey_id
}

/// Two overlapping surveys of one site (18:00–20:00 and 19:00–21:00 AWST)
/// with three encounters, one of them off the site.
async fn night(s: &SqliteStore) -> Night {
  let site_id = cable_beach(s).await;
  let s1 = survey(s, "s1", site_id, utc(10, 0), utc(12, 0)).await;
  let s2 = survey(s, "s2", site_id, utc(11, 0), utc(13, 0)).await;

  let inside = survey_encounter(s, "e1", utc(10, 30), INSIDE, s1, site_id).await;
  let late = survey_encounter(s, "e2", utc(12, 40), INSIDE, s2, site_id).await;
  let outside = survey_encounter(s, "e3", utc(11, 30), OUTSIDE, s2, site_id).await;

  Night { s1, s2, inside, late, outside }
}

#[tokio::test]
async fn duplicates_are_previewed_without_changes() {
  let s = store().await;
  let n = night(&s).await;

  let dups = s.duplicate_surveys(n.s1).await.unwrap();
  assert_eq!(dups.len(), 1);
  assert_eq!(dups[0].survey_id, n.s2);

  let s2 = s.get_survey(n.s2).await.unwrap().unwrap();
  assert!(s2.production);
  assert_eq!(s2.status, QaStatus::New);
}

#[tokio::test]
async fn reconcile_absorbs_duplicate_survey() {
  let s = store().await;
  let n = night(&s).await;

  let report = s.reconcile_duplicates(n.s1, actor("Florian")).await.unwrap();
  assert_eq!(report.closed_duplicates, vec![n.s2]);
  assert_eq!(report.reassigned_count, 1);
  assert_eq!(report.orphaned_count, 1);
  let window = report.adjusted_window.unwrap();
  assert_eq!(window.start, utc(10, 0));
  assert_eq!(window.end, utc(13, 10));

  for id in [n.inside, n.late] {
    assert_eq!(s.get_encounter(id).await.unwrap().unwrap().survey_id, Some(n.s1));
  }
  let orphan = s.get_encounter(n.outside).await.unwrap().unwrap();
  assert_eq!(orphan.survey_id, None);
  assert_eq!(orphan.site_id, None);

  let s1 = s.get_survey(n.s1).await.unwrap().unwrap();
  assert!(s1.production);
  assert_eq!(s1.status, QaStatus::Curated);
  assert_eq!(s1.end_time, Some(utc(13, 10)));
  let s2 = s.get_survey(n.s2).await.unwrap().unwrap();
  assert!(!s2.production);
  assert_eq!(s2.status, QaStatus::Curated);

  let logs = s.state_logs(n.s2).await.unwrap();
  assert_eq!(logs.len(), 1);
  assert_eq!(logs[0].subject_kind, SubjectKind::Survey);
  assert_eq!(logs[0].actor.as_str(), "Florian");
}

#[tokio::test]
async fn reconcile_twice_changes_nothing_more() {
  let s = store().await;
  let n = night(&s).await;
  s.reconcile_duplicates(n.s1, actor("Florian")).await.unwrap();

  let again = s.reconcile_duplicates(n.s1, actor("Florian")).await.unwrap();
  assert_eq!(again.reassigned_count, 0);
  assert_eq!(again.orphaned_count, 0);
  assert_eq!(again.adjusted_window, None);
  assert_eq!(s.state_logs(n.s1).await.unwrap().len(), 1);
}

#[tokio::test]
async fn encounters_inside_the_window_do_not_move_it() {
  let s = store().await;
  let site_id = cable_beach(&s).await;
  let s1 = survey(&s, "s1", site_id, utc(10, 0), utc(12, 0)).await;
  survey_encounter(&s, "early", utc(10, 10), INSIDE, s1, site_id).await;
  survey_encounter(&s, "late", utc(11, 50), INSIDE, s1, site_id).await;

  let report = s.reconcile_duplicates(s1, actor("Florian")).await.unwrap();
  assert_eq!(report.adjusted_window, None);
  assert!(!report.message.contains("adjusted window"));

  let stored = s.get_survey(s1).await.unwrap().unwrap();
  assert_eq!(stored.start_time, utc(10, 0));
  assert_eq!(stored.end_time, Some(utc(12, 0)));
}

#[tokio::test]
async fn production_survey_adopts_duplicate_encounters_within_its_site() {
  let s = store().await;
  let site_id = cable_beach(&s).await;
  let s1 = survey(&s, "s1", site_id, utc(10, 0), utc(12, 0)).await;
  let s2 = survey(&s, "s2", site_id, utc(10, 30), utc(11, 30)).await;
  let a = survey_encounter(&s, "a", utc(10, 40), INSIDE, s2, site_id).await;
  let b = survey_encounter(&s, "b", utc(11, 0), INSIDE, s2, site_id).await;
  let off_site = survey_encounter(&s, "c", utc(11, 20), OUTSIDE, s2, site_id).await;

  let report = s.reconcile_duplicates(s1, actor("Florian")).await.unwrap();
  assert_eq!(report.closed_duplicates, vec![s2]);
  assert_eq!(report.reassigned_count, 2);
  assert_eq!(report.orphaned_count, 1);
  assert_eq!(report.adjusted_window, None);

  let owned = s
    .list_encounters(EncounterQuery { survey_id: Some(s1), ..Default::default() })
    .await
    .unwrap();
  let mut owned: Vec<_> = owned.into_iter().map(|e| e.encounter_id).collect();
  owned.sort();
  let mut expected = vec![a, b];
  expected.sort();
  assert_eq!(owned, expected);

  let left_over = s
    .list_encounters(EncounterQuery { survey_id: Some(s2), ..Default::default() })
    .await
    .unwrap();
  assert!(left_over.is_empty());
  assert_eq!(s.get_encounter(off_site).await.unwrap().unwrap().survey_id, None);
}

#[tokio::test]
async fn reconcile_requires_an_end_time() {
  let s = store().await;
  let running = s
    .add_survey(NewSurvey::new("odk", "open", None, utc(10, 0), None))
    .await
    .unwrap();
  let err = s
    .reconcile_duplicates(running.survey_id, actor("Florian"))
    .await
    .unwrap_err();
  assert!(matches!(core(err), CoreError::IncompleteSurvey(id) if id == running.survey_id));
}

#[tokio::test]
async fn reconcile_unknown_survey_is_not_found() {
  let s = store().await;
  let err = s.reconcile_duplicates(Uuid::new_v4(), actor("A")).await.unwrap_err();
  assert!(core(err).is_not_found());
}
