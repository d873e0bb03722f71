//! SQL schema for the CBME SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
PRAGMA synchronous = NORMAL;

CREATE TABLE IF NOT EXISTS subjects (
    subject_id    INTEGER PRIMARY KEY AUTOINCREMENT,
    code          TEXT NOT NULL UNIQUE,
    name          TEXT NOT NULL,
    display_order INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS topics (
    topic_id      INTEGER PRIMARY KEY AUTOINCREMENT,
    subject_id    INTEGER NOT NULL REFERENCES subjects(subject_id) ON DELETE CASCADE,
    name          TEXT NOT NULL,
    display_order INTEGER NOT NULL DEFAULT 0,
    UNIQUE (subject_id, name)
);

-- Rows are never removed; deletion sets deleted_at.
CREATE TABLE IF NOT EXISTS competencies (
    competency_id      INTEGER PRIMARY KEY AUTOINCREMENT,
    code               TEXT NOT NULL UNIQUE,
    topic_id           INTEGER NOT NULL REFERENCES topics(topic_id) ON DELETE CASCADE,
    text               TEXT NOT NULL,
    domain             TEXT NOT NULL,   -- 'K' | 'S' | 'A' | 'K/S' | 'K/A' | 'S/A' | 'K/S/A'
    level              TEXT NOT NULL DEFAULT '',
    is_core            INTEGER NOT NULL DEFAULT 0,
    teaching_methods   TEXT,
    assessment_methods TEXT,
    integrations       TEXT,
    created_at         TEXT NOT NULL,   -- RFC 3339 UTC
    updated_at         TEXT NOT NULL,
    deleted_at         TEXT
);

-- Search index: one row per non-deleted competency, rowid = competency_id.
-- Written only by the synchronizer; there are no triggers.
CREATE VIRTUAL TABLE IF NOT EXISTS competencies_fts USING fts5(
    code,
    text,
    topic_name,
    subject_name,
    tokenize = 'porter unicode61'
);

CREATE INDEX IF NOT EXISTS subjects_order_idx         ON subjects(display_order);
CREATE INDEX IF NOT EXISTS topics_subject_idx         ON topics(subject_id);
CREATE INDEX IF NOT EXISTS topics_order_idx           ON topics(display_order);
CREATE INDEX IF NOT EXISTS competencies_topic_idx     ON competencies(topic_id);
CREATE INDEX IF NOT EXISTS competencies_domain_idx    ON competencies(domain);
CREATE INDEX IF NOT EXISTS competencies_core_idx      ON competencies(is_core);
CREATE INDEX IF NOT EXISTS competencies_deleted_idx   ON competencies(deleted_at);

PRAGMA user_version = 1;
";
