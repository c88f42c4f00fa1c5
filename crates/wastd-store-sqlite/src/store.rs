//! [`SqliteStore`], the SQLite implementation of [`RecordStore`].

use std::{path::Path, sync::Arc};

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension as _, TransactionBehavior};
use uuid::Uuid;
use wastd_core::{
  Error as CoreError,
  encounter::{Encounter, EncounterQuery, NewEncounter},
  identity::{
    IdentityClosure, LinkScope, TagGraph, TagKey, TagSighting, infer_name,
    resolve_closure,
  },
  observation::{NewObservation, Observation, TagType, TagValue},
  qa::{
    Actor, GuardContext, QaStatus, StateLog, SubjectKind, Transition, TransitionGuard,
    TransitionRequest, Unguarded, plan_transition,
  },
  store::RecordStore,
  survey::{
    Area, NewArea, NewSurvey, ReconcileOptions, ReconciliationReport, Survey, SurveyQuery,
    expand_window, is_duplicate,
  },
};

use crate::{
  Error, Result,
  encode::{
    AREA_COLUMNS, ENCOUNTER_COLUMNS, OBSERVATION_COLUMNS, RawArea, RawEncounter,
    RawObservation, RawStateLog, RawSurvey, STATE_LOG_COLUMNS, SURVEY_COLUMNS, decode_dt,
    decode_uuid, encode_dt, encode_uuid,
  },
  schema::SCHEMA,
};

const RECONCILE_DESCRIPTION: &str = "Reconciled duplicate surveys";

// ─── Store ───────────────────────────────────────────────────────────────────

/// A WAStD record store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn:       tokio_rusqlite::Connection,
  link_scope: LinkScope,
  reconcile:  ReconcileOptions,
  guard:      Arc<dyn TransitionGuard>,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::init(conn).await
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::init(conn).await
  }

  async fn init(conn: tokio_rusqlite::Connection) -> Result<Self> {
    conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(Self {
      conn,
      link_scope: LinkScope::default(),
      reconcile: ReconcileOptions::default(),
      guard: Arc::new(Unguarded),
    })
  }

  /// How tag readings are matched when resolving identities.
  pub fn with_link_scope(mut self, scope: LinkScope) -> Self {
    self.link_scope = scope;
    self
  }

  pub fn with_reconcile_options(mut self, options: ReconcileOptions) -> Self {
    self.reconcile = options;
    self
  }

  /// Install a guard consulted before every QA transition.
  pub fn with_guard(mut self, guard: Arc<dyn TransitionGuard>) -> Self {
    self.guard = guard;
    self
  }

  pub fn link_scope(&self) -> LinkScope { self.link_scope }

  /// Run `f` on the connection thread.
  async fn with_conn<T, F>(&self, f: F) -> Result<T>
  where
    F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    T: Send + 'static,
  {
    self.conn.call(move |conn| Ok(f(conn))).await?
  }

  /// Overwrite a status without a transition. Only tests need records in
  /// states no transition leads to.
  #[cfg(test)]
  pub(crate) async fn force_status(&self, encounter_id: Uuid, status: QaStatus) -> Result<()> {
    self
      .with_conn(move |conn| {
        conn.execute(
          "UPDATE encounters SET status = ?1 WHERE encounter_id = ?2",
          rusqlite::params![status.as_str(), encode_uuid(encounter_id)],
        )?;
        Ok(())
      })
      .await
  }

  #[cfg(test)]
  pub(crate) async fn raw_execute(&self, sql: &'static str) -> Result<usize> {
    self.with_conn(move |conn| Ok(conn.execute(sql, [])?)).await
  }
}

// ─── Row access ──────────────────────────────────────────────────────────────

fn area_by_id(conn: &Connection, id: Uuid) -> Result<Option<Area>> {
  conn
    .query_row(
      &format!("SELECT {AREA_COLUMNS} FROM areas WHERE area_id = ?1"),
      rusqlite::params![encode_uuid(id)],
      RawArea::from_row,
    )
    .optional()?
    .map(RawArea::into_area)
    .transpose()
}

fn survey_by_id(conn: &Connection, id: Uuid) -> Result<Option<Survey>> {
  conn
    .query_row(
      &format!("SELECT {SURVEY_COLUMNS} FROM surveys WHERE survey_id = ?1"),
      rusqlite::params![encode_uuid(id)],
      RawSurvey::from_row,
    )
    .optional()?
    .map(RawSurvey::into_survey)
    .transpose()
}

fn encounter_by_id(conn: &Connection, id: Uuid) -> Result<Option<Encounter>> {
  conn
    .query_row(
      &format!("SELECT {ENCOUNTER_COLUMNS} FROM encounters WHERE encounter_id = ?1"),
      rusqlite::params![encode_uuid(id)],
      RawEncounter::from_row,
    )
    .optional()?
    .map(RawEncounter::into_encounter)
    .transpose()
}

fn require_encounter(conn: &Connection, id: Uuid) -> Result<Encounter> {
  encounter_by_id(conn, id)?.ok_or_else(|| CoreError::EncounterNotFound(id).into())
}

fn encounters_of_survey(conn: &Connection, survey_id: Uuid) -> Result<Vec<Encounter>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {ENCOUNTER_COLUMNS} FROM encounters WHERE survey_id = ?1 ORDER BY when_at"
  ))?;
  let raws = stmt
    .query_map(rusqlite::params![encode_uuid(survey_id)], RawEncounter::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawEncounter::into_encounter).collect()
}

fn source_taken(conn: &Connection, table: &str, source: &str, source_id: &str) -> Result<bool> {
  Ok(
    conn
      .query_row(
        &format!("SELECT 1 FROM {table} WHERE source = ?1 AND source_id = ?2"),
        rusqlite::params![source, source_id],
        |_| Ok(()),
      )
      .optional()?
      .is_some(),
  )
}

fn ensure_area(conn: &Connection, id: Option<Uuid>) -> Result<()> {
  match id {
    Some(id) if area_by_id(conn, id)?.is_none() => Err(CoreError::AreaNotFound(id).into()),
    _ => Ok(()),
  }
}

// ─── QA transitions ──────────────────────────────────────────────────────────

fn subject_table(kind: SubjectKind) -> (&'static str, &'static str) {
  match kind {
    SubjectKind::Encounter => ("encounters", "encounter_id"),
    SubjectKind::Survey => ("surveys", "survey_id"),
  }
}

fn not_found(kind: SubjectKind, id: Uuid) -> Error {
  match kind {
    SubjectKind::Encounter => CoreError::EncounterNotFound(id),
    SubjectKind::Survey => CoreError::SurveyNotFound(id),
  }
  .into()
}

fn current_status(conn: &Connection, kind: SubjectKind, id: Uuid) -> Result<QaStatus> {
  let (table, key) = subject_table(kind);
  let stored: Option<String> = conn
    .query_row(
      &format!("SELECT status FROM {table} WHERE {key} = ?1"),
      rusqlite::params![encode_uuid(id)],
      |row| row.get(0),
    )
    .optional()?;
  let stored = stored.ok_or_else(|| not_found(kind, id))?;
  Ok(QaStatus::parse(&stored)?)
}

fn log_count(conn: &Connection, subject_id: Uuid) -> Result<usize> {
  let count: i64 = conn.query_row(
    "SELECT COUNT(*) FROM state_logs WHERE subject_id = ?1",
    rusqlite::params![encode_uuid(subject_id)],
    |row| row.get(0),
  )?;
  Ok(count as usize)
}

/// Apply one transition inside an open write transaction: re-read the status,
/// plan, compare-and-swap the status and append the log entry.
fn apply_transition(
  conn: &Connection,
  guard: &dyn TransitionGuard,
  kind: SubjectKind,
  subject_id: Uuid,
  request: &TransitionRequest,
) -> Result<StateLog> {
  let current = current_status(conn, kind, subject_id)?;
  if let Some(expected) = request.expected_status
    && expected != current
  {
    return Err(CoreError::StaleStatus { subject_id, expected, actual: current }.into());
  }
  if let Some(expected) = request.expected_logs {
    let actual = log_count(conn, subject_id)?;
    if actual != expected {
      return Err(CoreError::StaleHistory { subject_id, expected, actual }.into());
    }
  }

  let ctx = GuardContext {
    subject_id,
    subject_kind: kind,
    current,
    actor: &request.actor,
  };
  let target = plan_transition(request.transition, &ctx, guard)?;

  let (table, key) = subject_table(kind);
  let updated = conn.execute(
    &format!("UPDATE {table} SET status = ?1 WHERE {key} = ?2 AND status = ?3"),
    rusqlite::params![target.as_str(), encode_uuid(subject_id), current.as_str()],
  )?;
  if updated != 1 {
    let actual = current_status(conn, kind, subject_id)?;
    return Err(
      CoreError::StaleStatus { subject_id, expected: current, actual }.into(),
    );
  }

  let log = StateLog {
    log_id: Uuid::new_v4(),
    subject_id,
    subject_kind: kind,
    transition: request.transition,
    source_state: current,
    state: target,
    actor: request.actor.clone(),
    description: request.description.clone(),
    timestamp: Utc::now(),
  };
  conn.execute(
    &format!("INSERT INTO state_logs ({STATE_LOG_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"),
    rusqlite::params![
      encode_uuid(log.log_id),
      encode_uuid(log.subject_id),
      log.subject_kind.as_str(),
      log.transition.as_str(),
      log.source_state.as_str(),
      log.state.as_str(),
      log.actor.as_str(),
      log.description,
      encode_dt(log.timestamp),
    ],
  )?;

  tracing::info!(
    subject = %subject_id,
    kind = kind.as_str(),
    transition = %request.transition,
    from = %current,
    to = %target,
    actor = %request.actor,
    "QA transition applied"
  );
  Ok(log)
}

// ─── Identity ────────────────────────────────────────────────────────────────

/// The encounter/tag join, read through the `observations` tag columns.
struct SqlTagGraph<'c> {
  conn: &'c Connection,
}

impl TagGraph for SqlTagGraph<'_> {
  type Error = Error;

  fn tags_of(&mut self, encounter_id: Uuid) -> Result<Vec<TagKey>> {
    let mut stmt = self.conn.prepare_cached(
      "SELECT DISTINCT tag_type, tag_name FROM observations
       WHERE encounter_id = ?1 AND observation_type = 'tag'",
    )?;
    let rows = stmt
      .query_map(rusqlite::params![encode_uuid(encounter_id)], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
      })?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    rows
      .into_iter()
      .map(|(tag_type, name)| {
        let tag_type = TagType::parse(&tag_type)
          .ok_or_else(|| Error::Decode(format!("unknown tag type: {tag_type:?}")))?;
        Ok(TagKey::new(tag_type, name))
      })
      .collect()
  }

  fn encounters_with(&mut self, tag: &TagKey, scope: LinkScope) -> Result<Vec<Uuid>> {
    let mut stmt = self.conn.prepare_cached(
      "SELECT DISTINCT encounter_id FROM observations
       WHERE observation_type = 'tag'
         AND tag_name = ?1
         AND (?2 IS NULL OR tag_type = ?2)",
    )?;
    let tag_type = match scope {
      LinkScope::TypeAndName => Some(tag.tag_type.as_str()),
      LinkScope::NameOnly => None,
    };
    let ids = stmt
      .query_map(rusqlite::params![tag.name, tag_type], |row| row.get::<_, String>(0))?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    ids.iter().map(|s| decode_uuid(s)).collect()
  }
}

fn closure_of(conn: &Connection, encounter_id: Uuid, scope: LinkScope) -> Result<IdentityClosure> {
  require_encounter(conn, encounter_id)?;
  resolve_closure(&mut SqlTagGraph { conn }, encounter_id, scope)
}

fn write_name(conn: &Connection, closure: &IdentityClosure, name: &str) -> Result<()> {
  let mut stmt = conn.prepare_cached("UPDATE encounters SET name = ?1 WHERE encounter_id = ?2")?;
  for id in &closure.encounters {
    stmt.execute(rusqlite::params![name, encode_uuid(*id)])?;
  }
  Ok(())
}

fn tag_sightings(conn: &Connection, closure: &IdentityClosure) -> Result<Vec<TagSighting>> {
  let mut stmt = conn.prepare_cached(
    "SELECT o.encounter_id, e.when_at, o.value_json
     FROM observations o
     JOIN encounters e ON e.encounter_id = o.encounter_id
     WHERE o.observation_type = 'tag' AND o.encounter_id = ?1",
  )?;
  let mut sightings = Vec::new();
  for id in &closure.encounters {
    let rows = stmt
      .query_map(rusqlite::params![encode_uuid(*id)], |row| {
        Ok((
          row.get::<_, String>(0)?,
          row.get::<_, String>(1)?,
          row.get::<_, String>(2)?,
        ))
      })?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    for (encounter_id, when, value_json) in rows {
      sightings.push(TagSighting {
        encounter_id: decode_uuid(&encounter_id)?,
        when:         decode_dt(&when)?,
        tag:          serde_json::from_str::<TagValue>(&value_json)?,
      });
    }
  }
  Ok(sightings)
}

fn refresh_name_in(conn: &Connection, encounter_id: Uuid, scope: LinkScope) -> Result<Option<String>> {
  let closure = closure_of(conn, encounter_id, scope)?;
  let name = infer_name(&tag_sightings(conn, &closure)?);
  if let Some(name) = &name {
    write_name(conn, &closure, name)?;
    tracing::debug!(
      encounter = %encounter_id,
      %name,
      encounters = closure.encounters.len(),
      "identity name refreshed"
    );
  }
  Ok(name)
}

// ─── Reconciliation ──────────────────────────────────────────────────────────

fn duplicates_of(conn: &Connection, survey: &Survey, opts: &ReconcileOptions) -> Result<Vec<Survey>> {
  let Some(site_id) = survey.site_id else {
    return Ok(Vec::new());
  };
  let mut stmt = conn.prepare(&format!(
    "SELECT {SURVEY_COLUMNS} FROM surveys
     WHERE site_id = ?1 AND survey_id != ?2
     ORDER BY start_time"
  ))?;
  let raws = stmt
    .query_map(
      rusqlite::params![encode_uuid(site_id), encode_uuid(survey.survey_id)],
      RawSurvey::from_row,
    )?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  let mut duplicates = Vec::new();
  for raw in raws {
    let other = raw.into_survey()?;
    if is_duplicate(survey, &other, opts) {
      duplicates.push(other);
    }
  }
  Ok(duplicates)
}

fn reconcile_in(
  conn: &Connection,
  guard: &dyn TransitionGuard,
  opts: &ReconcileOptions,
  survey_id: Uuid,
  actor: &Actor,
) -> Result<ReconciliationReport> {
  let survey = survey_by_id(conn, survey_id)?.ok_or(CoreError::SurveyNotFound(survey_id))?;
  let window = survey.window().ok_or(CoreError::IncompleteSurvey(survey_id))?;
  let duplicates = duplicates_of(conn, &survey, opts)?;
  let site = match survey.site_id {
    Some(id) => area_by_id(conn, id)?,
    None => None,
  };

  let mut encounters = encounters_of_survey(conn, survey_id)?;
  for dup in &duplicates {
    encounters.extend(encounters_of_survey(conn, dup.survey_id)?);
  }
  let (retained, orphaned): (Vec<Encounter>, Vec<Encounter>) = encounters
    .into_iter()
    .partition(|e| site.as_ref().is_none_or(|a| a.geom.covers(e.location)));

  let adjusted_window = expand_window(window, retained.iter().map(|e| e.when), opts.buffer);
  if let Some(w) = adjusted_window {
    conn.execute(
      "UPDATE surveys SET start_time = ?1, end_time = ?2 WHERE survey_id = ?3",
      rusqlite::params![encode_dt(w.start), encode_dt(w.end), encode_uuid(survey_id)],
    )?;
  }

  let survey_key = encode_uuid(survey_id);
  let site_key = survey.site_id.map(encode_uuid);
  let mut reassigned_count = 0;
  for e in &retained {
    if e.survey_id != Some(survey_id) {
      reassigned_count += 1;
    }
    conn.execute(
      "UPDATE encounters SET survey_id = ?1, site_id = ?2 WHERE encounter_id = ?3",
      rusqlite::params![survey_key, site_key, encode_uuid(e.encounter_id)],
    )?;
  }
  for e in &orphaned {
    conn.execute(
      "UPDATE encounters SET survey_id = NULL, site_id = NULL WHERE encounter_id = ?1",
      rusqlite::params![encode_uuid(e.encounter_id)],
    )?;
  }

  conn.execute(
    "UPDATE surveys SET production = 1 WHERE survey_id = ?1",
    rusqlite::params![survey_key],
  )?;
  for dup in &duplicates {
    conn.execute(
      "UPDATE surveys SET production = 0 WHERE survey_id = ?1",
      rusqlite::params![encode_uuid(dup.survey_id)],
    )?;
  }

  let request = TransitionRequest::new(
    Transition::Curate,
    actor.clone(),
    Some(RECONCILE_DESCRIPTION.to_owned()),
  );
  for id in std::iter::once(survey_id).chain(duplicates.iter().map(|d| d.survey_id)) {
    let status = current_status(conn, SubjectKind::Survey, id)?;
    if status == QaStatus::Curated {
      continue;
    }
    if !Transition::Curate.allowed_from(status) {
      tracing::warn!(survey = %id, %status, "survey cannot be curated, left as is");
      continue;
    }
    match apply_transition(conn, guard, SubjectKind::Survey, id, &request) {
      Ok(_) => {}
      Err(Error::Core(CoreError::TransitionRefused { reason, .. })) => {
        tracing::warn!(survey = %id, %reason, "survey curation refused, left as is");
      }
      Err(e) => return Err(e),
    }
  }

  let mut report = ReconciliationReport {
    survey_id,
    closed_duplicates: duplicates.iter().map(|d| d.survey_id).collect(),
    reassigned_count,
    orphaned_count: orphaned.len(),
    adjusted_window,
    message: String::new(),
  };
  report.summarize();
  tracing::info!(survey = %survey_id, %actor, "{}", report.message);
  Ok(report)
}

// ─── RecordStore impl ────────────────────────────────────────────────────────

impl RecordStore for SqliteStore {
  type Error = Error;

  // ── Areas ─────────────────────────────────────────────────────────────────

  async fn add_area(&self, input: NewArea) -> Result<Area> {
    let area = Area {
      area_id:   Uuid::new_v4(),
      area_type: input.area_type,
      name:      input.name,
      geom:      input.geom,
    };

    let id_str    = encode_uuid(area.area_id);
    let type_str  = area.area_type.as_str();
    let name      = area.name.clone();
    let geom_json = serde_json::to_string(&area.geom)?;

    self
      .with_conn(move |conn| {
        conn.execute(
          &format!("INSERT INTO areas ({AREA_COLUMNS}) VALUES (?1, ?2, ?3, ?4)"),
          rusqlite::params![id_str, type_str, name, geom_json],
        )?;
        Ok(())
      })
      .await?;

    Ok(area)
  }

  async fn get_area(&self, id: Uuid) -> Result<Option<Area>> {
    self.with_conn(move |conn| area_by_id(conn, id)).await
  }

  async fn list_areas(&self) -> Result<Vec<Area>> {
    self
      .with_conn(|conn| {
        let mut stmt =
          conn.prepare(&format!("SELECT {AREA_COLUMNS} FROM areas ORDER BY name"))?;
        let raws = stmt
          .query_map([], RawArea::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        raws.into_iter().map(RawArea::into_area).collect()
      })
      .await
  }

  // ── Surveys ───────────────────────────────────────────────────────────────

  async fn add_survey(&self, input: NewSurvey) -> Result<Survey> {
    if input.end_time.is_some_and(|end| end < input.start_time) {
      return Err(CoreError::InvalidInput("survey ends before it starts".into()).into());
    }

    let survey = Survey {
      survey_id:  Uuid::new_v4(),
      source:     input.source,
      source_id:  input.source_id,
      site_id:    input.site_id,
      start_time: input.start_time,
      end_time:   input.end_time,
      production: input.production,
      status:     QaStatus::New,
      reporter:   input.reporter,
      label:      input.label,
    };

    let row = survey.clone();
    self
      .with_conn(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if source_taken(&tx, "surveys", &row.source, &row.source_id)? {
          return Err(
            CoreError::DuplicateSource {
              data_source: row.source,
              source_id:   row.source_id,
            }
            .into(),
          );
        }
        ensure_area(&tx, row.site_id)?;
        tx.execute(
          &format!(
            "INSERT INTO surveys ({SURVEY_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
          ),
          rusqlite::params![
            encode_uuid(row.survey_id),
            row.source,
            row.source_id,
            row.site_id.map(encode_uuid),
            encode_dt(row.start_time),
            row.end_time.map(encode_dt),
            row.production,
            row.status.as_str(),
            row.reporter,
            row.label,
          ],
        )?;
        tx.commit()?;
        Ok(())
      })
      .await?;

    Ok(survey)
  }

  async fn get_survey(&self, id: Uuid) -> Result<Option<Survey>> {
    self.with_conn(move |conn| survey_by_id(conn, id)).await
  }

  async fn list_surveys(&self, query: SurveyQuery) -> Result<Vec<Survey>> {
    let site_str   = query.site_id.map(encode_uuid);
    let production = query.production;
    let limit_val  = query.limit.unwrap_or(100) as i64;
    let offset_val = query.offset.unwrap_or(0) as i64;

    self
      .with_conn(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {SURVEY_COLUMNS} FROM surveys
           WHERE (?1 IS NULL OR site_id = ?1)
             AND (?2 IS NULL OR production = ?2)
           ORDER BY start_time, survey_id
           LIMIT ?3 OFFSET ?4"
        ))?;
        let raws = stmt
          .query_map(
            rusqlite::params![site_str, production, limit_val, offset_val],
            RawSurvey::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        raws.into_iter().map(RawSurvey::into_survey).collect()
      })
      .await
  }

  async fn duplicate_surveys(&self, survey_id: Uuid) -> Result<Vec<Survey>> {
    let opts = self.reconcile;
    self
      .with_conn(move |conn| {
        let survey =
          survey_by_id(conn, survey_id)?.ok_or(CoreError::SurveyNotFound(survey_id))?;
        duplicates_of(conn, &survey, &opts)
      })
      .await
  }

  async fn reconcile_duplicates(
    &self,
    survey_id: Uuid,
    actor: Actor,
  ) -> Result<ReconciliationReport> {
    let guard = Arc::clone(&self.guard);
    let opts = self.reconcile;
    self
      .with_conn(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let report = reconcile_in(&tx, guard.as_ref(), &opts, survey_id, &actor)?;
        tx.commit()?;
        Ok(report)
      })
      .await
  }

  // ── Encounters ────────────────────────────────────────────────────────────

  async fn add_encounter(&self, input: NewEncounter) -> Result<Encounter> {
    let encounter = Encounter {
      encounter_id:   Uuid::new_v4(),
      encounter_type: input.encounter_type,
      when:           input.when,
      location:       input.location,
      status:         input.entry.into(),
      source:         input.source,
      source_id:      input.source_id,
      observer:       input.observer,
      reporter:       input.reporter,
      name:           None,
      campaign_id:    input.campaign_id,
      survey_id:      input.survey_id,
      area_id:        input.area_id,
      site_id:        input.site_id,
      created_at:     Utc::now(),
    };

    let row = encounter.clone();
    self
      .with_conn(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if source_taken(&tx, "encounters", &row.source, &row.source_id)? {
          return Err(
            CoreError::DuplicateSource {
              data_source: row.source,
              source_id:   row.source_id,
            }
            .into(),
          );
        }
        if let Some(survey_id) = row.survey_id
          && survey_by_id(&tx, survey_id)?.is_none()
        {
          return Err(CoreError::SurveyNotFound(survey_id).into());
        }
        ensure_area(&tx, row.area_id)?;
        ensure_area(&tx, row.site_id)?;

        tx.execute(
          &format!(
            "INSERT INTO encounters ({ENCOUNTER_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)"
          ),
          rusqlite::params![
            encode_uuid(row.encounter_id),
            row.encounter_type.as_str(),
            encode_dt(row.when),
            row.location.longitude,
            row.location.latitude,
            row.status.as_str(),
            row.source,
            row.source_id,
            row.observer,
            row.reporter,
            row.name,
            row.campaign_id.map(encode_uuid),
            row.survey_id.map(encode_uuid),
            row.area_id.map(encode_uuid),
            row.site_id.map(encode_uuid),
            encode_dt(row.created_at),
          ],
        )?;
        tx.commit()?;
        Ok(())
      })
      .await?;

    tracing::debug!(encounter = %encounter.encounter_id, status = %encounter.status, "encounter added");
    Ok(encounter)
  }

  async fn get_encounter(&self, id: Uuid) -> Result<Option<Encounter>> {
    self.with_conn(move |conn| encounter_by_id(conn, id)).await
  }

  async fn list_encounters(&self, query: EncounterQuery) -> Result<Vec<Encounter>> {
    let status_str = query.status.map(|s| s.as_str());
    let survey_str = query.survey_id.map(encode_uuid);
    let name       = query.name;
    let limit_val  = query.limit.unwrap_or(100) as i64;
    let offset_val = query.offset.unwrap_or(0) as i64;

    self
      .with_conn(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {ENCOUNTER_COLUMNS} FROM encounters
           WHERE (?1 IS NULL OR status = ?1)
             AND (?2 IS NULL OR survey_id = ?2)
             AND (?3 IS NULL OR name = ?3)
           ORDER BY when_at, encounter_id
           LIMIT ?4 OFFSET ?5"
        ))?;
        let raws = stmt
          .query_map(
            rusqlite::params![status_str, survey_str, name, limit_val, offset_val],
            RawEncounter::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        raws.into_iter().map(RawEncounter::into_encounter).collect()
      })
      .await
  }

  // ── Observations ──────────────────────────────────────────────────────────

  async fn record_observation(&self, input: NewObservation) -> Result<Observation> {
    let observation = Observation {
      observation_id: Uuid::new_v4(),
      encounter_id:   input.encounter_id,
      value:          input.value,
      recorded_at:    Utc::now(),
    };

    let obs_type   = observation.value.discriminant();
    let value_json = observation.value.to_json()?.to_string();
    let tag        = observation.value.as_tag().map(|t| (t.tag_type.as_str(), t.name.clone()));
    let id_str     = encode_uuid(observation.observation_id);
    let enc_id     = observation.encounter_id;
    let at_str     = encode_dt(observation.recorded_at);
    let scope      = self.link_scope;

    self
      .with_conn(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        require_encounter(&tx, enc_id)?;
        let (tag_type, tag_name) = match &tag {
          Some((t, n)) => (Some(*t), Some(n.as_str())),
          None => (None, None),
        };
        tx.execute(
          "INSERT INTO observations (
             observation_id, encounter_id, observation_type, value_json,
             tag_type, tag_name, recorded_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          rusqlite::params![
            id_str,
            encode_uuid(enc_id),
            obs_type,
            value_json,
            tag_type,
            tag_name,
            at_str,
          ],
        )?;
        if tag.is_some() {
          refresh_name_in(&tx, enc_id, scope)?;
        }
        tx.commit()?;
        Ok(())
      })
      .await?;

    Ok(observation)
  }

  async fn get_observations(&self, encounter_id: Uuid) -> Result<Vec<Observation>> {
    self
      .with_conn(move |conn| {
        require_encounter(conn, encounter_id)?;
        let mut stmt = conn.prepare(&format!(
          "SELECT {OBSERVATION_COLUMNS} FROM observations
           WHERE encounter_id = ?1
           ORDER BY recorded_at, rowid"
        ))?;
        let raws = stmt
          .query_map(rusqlite::params![encode_uuid(encounter_id)], RawObservation::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        raws.into_iter().map(RawObservation::into_observation).collect()
      })
      .await
  }

  // ── Quality control ───────────────────────────────────────────────────────

  async fn transition(
    &self,
    encounter_id: Uuid,
    request: TransitionRequest,
  ) -> Result<(Encounter, StateLog)> {
    let guard = Arc::clone(&self.guard);
    self
      .with_conn(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let log = apply_transition(
          &tx,
          guard.as_ref(),
          SubjectKind::Encounter,
          encounter_id,
          &request,
        )?;
        let encounter = require_encounter(&tx, encounter_id)?;
        tx.commit()?;
        Ok((encounter, log))
      })
      .await
  }

  async fn state_logs(&self, subject_id: Uuid) -> Result<Vec<StateLog>> {
    self
      .with_conn(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {STATE_LOG_COLUMNS} FROM state_logs
           WHERE subject_id = ?1
           ORDER BY timestamp, rowid"
        ))?;
        let raws = stmt
          .query_map(rusqlite::params![encode_uuid(subject_id)], RawStateLog::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        raws.into_iter().map(RawStateLog::into_state_log).collect()
      })
      .await
  }

  // ── Identity ──────────────────────────────────────────────────────────────

  async fn resolve_identity(&self, encounter_id: Uuid) -> Result<IdentityClosure> {
    let scope = self.link_scope;
    self
      .with_conn(move |conn| closure_of(conn, encounter_id, scope))
      .await
  }

  async fn propagate_name(&self, encounter_id: Uuid, name: String) -> Result<IdentityClosure> {
    let name = name.trim().to_owned();
    if name.is_empty() {
      return Err(CoreError::InvalidInput("name must not be empty".into()).into());
    }
    let scope = self.link_scope;
    self
      .with_conn(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let closure = closure_of(&tx, encounter_id, scope)?;
        write_name(&tx, &closure, &name)?;
        tx.commit()?;
        tracing::info!(
          encounter = %encounter_id,
          %name,
          encounters = closure.encounters.len(),
          "name propagated"
        );
        Ok(closure)
      })
      .await
  }

  async fn refresh_name(&self, encounter_id: Uuid) -> Result<Option<String>> {
    let scope = self.link_scope;
    self
      .with_conn(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let name = refresh_name_in(&tx, encounter_id, scope)?;
        tx.commit()?;
        Ok(name)
      })
      .await
  }
}
