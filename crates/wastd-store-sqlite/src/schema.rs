//! SQL schema for the WAStD SQLite store.
//!
//! Executed once at connection startup; idempotent thanks to
//! `CREATE ... IF NOT EXISTS`. `PRAGMA user_version` records the layout.

pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS areas (
    area_id    TEXT PRIMARY KEY,
    area_type  TEXT NOT NULL CHECK (area_type IN ('locality', 'site')),
    name       TEXT NOT NULL,
    geom_json  TEXT NOT NULL    -- JSON-encoded Polygon
);

CREATE TABLE IF NOT EXISTS surveys (
    survey_id   TEXT PRIMARY KEY,
    source      TEXT NOT NULL,
    source_id   TEXT NOT NULL,
    site_id     TEXT REFERENCES areas(area_id),
    start_time  TEXT NOT NULL,
    end_time    TEXT,
    production  INTEGER NOT NULL DEFAULT 1,
    status      TEXT NOT NULL DEFAULT 'new' CHECK (status IN (
                  'new', 'imported', 'manual input', 'proofread',
                  'curated', 'published', 'flagged', 'rejected')),
    reporter    TEXT,
    label       TEXT,
    UNIQUE (source, source_id)
);

CREATE TABLE IF NOT EXISTS encounters (
    encounter_id    TEXT PRIMARY KEY,
    encounter_type  TEXT NOT NULL,
    when_at         TEXT NOT NULL,   -- RFC 3339 UTC, microseconds
    longitude       REAL NOT NULL,
    latitude        REAL NOT NULL,
    status          TEXT NOT NULL DEFAULT 'new' CHECK (status IN (
                      'new', 'imported', 'manual input', 'proofread',
                      'curated', 'published', 'flagged', 'rejected')),
    source          TEXT NOT NULL,
    source_id       TEXT NOT NULL,
    observer        TEXT NOT NULL,
    reporter        TEXT NOT NULL,
    name            TEXT,            -- identity cache, see propagate_name
    campaign_id     TEXT,
    survey_id       TEXT REFERENCES surveys(survey_id) ON DELETE SET NULL,
    area_id         TEXT REFERENCES areas(area_id),
    site_id         TEXT REFERENCES areas(area_id),
    created_at      TEXT NOT NULL,
    UNIQUE (source, source_id)
);

-- tag_type and tag_name duplicate the payload of tag observations so the
-- identity closure can look tags up by index.
CREATE TABLE IF NOT EXISTS observations (
    observation_id    TEXT PRIMARY KEY,
    encounter_id      TEXT NOT NULL REFERENCES encounters(encounter_id) ON DELETE CASCADE,
    observation_type  TEXT NOT NULL,
    value_json        TEXT NOT NULL,
    tag_type          TEXT,
    tag_name          TEXT,
    recorded_at       TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS state_logs (
    log_id        TEXT PRIMARY KEY,
    subject_id    TEXT NOT NULL,
    subject_kind  TEXT NOT NULL CHECK (subject_kind IN ('encounter', 'survey')),
    transition    TEXT NOT NULL,
    source_state  TEXT NOT NULL,
    state         TEXT NOT NULL,
    actor         TEXT NOT NULL,
    description   TEXT,
    timestamp     TEXT NOT NULL
);

CREATE TRIGGER IF NOT EXISTS state_logs_no_update
BEFORE UPDATE ON state_logs
BEGIN
    SELECT RAISE(ABORT, 'state logs are append-only');
END;

CREATE TRIGGER IF NOT EXISTS state_logs_no_delete
BEFORE DELETE ON state_logs
BEGIN
    SELECT RAISE(ABORT, 'state logs are append-only');
END;

CREATE INDEX IF NOT EXISTS surveys_site_idx          ON surveys(site_id, start_time);
CREATE INDEX IF NOT EXISTS encounters_survey_idx     ON encounters(survey_id);
CREATE INDEX IF NOT EXISTS encounters_name_idx       ON encounters(name);
CREATE INDEX IF NOT EXISTS observations_encounter_idx ON observations(encounter_id);
CREATE INDEX IF NOT EXISTS observations_tag_idx      ON observations(tag_name, tag_type);
CREATE INDEX IF NOT EXISTS state_logs_subject_idx    ON state_logs(subject_id, timestamp);

PRAGMA user_version = 1;
";
