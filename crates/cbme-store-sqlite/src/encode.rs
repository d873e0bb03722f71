//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. Domains are stored as their
//! code (`"K/S"`), which is also what search filters compare against.

use std::str::FromStr as _;

use cbme_core::model::{Competency, CompetencyDetails, Domain, Subject, Topic};
use chrono::{DateTime, Utc};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Domain ──────────────────────────────────────────────────────────────────

pub fn encode_domain(d: Domain) -> &'static str { d.into() }

pub fn decode_domain(s: &str) -> Result<Domain> {
  Domain::from_str(s).map_err(|_| cbme_core::Error::UnknownDomain(s.to_owned()).into())
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawCompetency::from_row`]. Expects the aliases
/// `c` (competencies), `t` (topics) and `s` (subjects).
pub const DETAILS_COLUMNS: &str = "
  c.competency_id, c.code, c.topic_id, c.text, c.domain, c.level, c.is_core,
  c.teaching_methods, c.assessment_methods, c.integrations,
  c.created_at, c.updated_at, c.deleted_at,
  t.name, s.code, s.name";

/// `FROM` clause joining a competency to its topic and subject.
pub const DETAILS_FROM: &str = "
  FROM competencies c
  JOIN topics   t ON t.topic_id   = c.topic_id
  JOIN subjects s ON s.subject_id = t.subject_id";

/// Raw values read directly from a competency row joined with its topic and
/// subject.
pub struct RawCompetency {
  // competencies columns
  pub competency_id:      i64,
  pub code:               String,
  pub topic_id:           i64,
  pub text:               String,
  pub domain:             String,
  pub level:              String,
  pub is_core:            bool,
  pub teaching_methods:   Option<String>,
  pub assessment_methods: Option<String>,
  pub integrations:       Option<String>,
  pub created_at:         String,
  pub updated_at:         String,
  pub deleted_at:         Option<String>,
  // joins
  pub topic_name:         String,
  pub subject_code:       String,
  pub subject_name:       String,
}

impl RawCompetency {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      competency_id:      row.get(0)?,
      code:               row.get(1)?,
      topic_id:           row.get(2)?,
      text:               row.get(3)?,
      domain:             row.get(4)?,
      level:              row.get(5)?,
      is_core:            row.get(6)?,
      teaching_methods:   row.get(7)?,
      assessment_methods: row.get(8)?,
      integrations:       row.get(9)?,
      created_at:         row.get(10)?,
      updated_at:         row.get(11)?,
      deleted_at:         row.get(12)?,
      topic_name:         row.get(13)?,
      subject_code:       row.get(14)?,
      subject_name:       row.get(15)?,
    })
  }

  pub fn into_details(self) -> Result<CompetencyDetails> {
    let competency = Competency {
      competency_id:      self.competency_id,
      code:               self.code,
      topic_id:           self.topic_id,
      text:               self.text,
      domain:             decode_domain(&self.domain)?,
      level:              self.level,
      is_core:            self.is_core,
      teaching_methods:   self.teaching_methods,
      assessment_methods: self.assessment_methods,
      integrations:       self.integrations,
      created_at:         decode_dt(&self.created_at)?,
      updated_at:         decode_dt(&self.updated_at)?,
      deleted_at:         self.deleted_at.as_deref().map(decode_dt).transpose()?,
    };

    Ok(CompetencyDetails {
      competency,
      topic_name: self.topic_name,
      subject_code: self.subject_code,
      subject_name: self.subject_name,
    })
  }
}

pub const SUBJECT_COLUMNS: &str = "subject_id, code, name, display_order";

pub fn subject_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Subject> {
  Ok(Subject {
    subject_id:    row.get(0)?,
    code:          row.get(1)?,
    name:          row.get(2)?,
    display_order: row.get(3)?,
  })
}

pub const TOPIC_COLUMNS: &str = "t.topic_id, t.subject_id, t.name, t.display_order";

pub fn topic_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Topic> {
  Ok(Topic {
    topic_id:      row.get(0)?,
    subject_id:    row.get(1)?,
    name:          row.get(2)?,
    display_order: row.get(3)?,
  })
}
