//! [`Fts5Index`]: the FTS5 table as a [`TextIndex`].
//!
//! Borrows a connection (usually an open transaction) so that index writes
//! commit or roll back together with the row mutation that caused them.

use cbme_core::{
  index::{IndexEntry, RankedHit, TextIndex},
  query::{MAX_LIMIT, MatchExpression},
};
use rusqlite::Connection;

use crate::{Error, Result};

pub struct Fts5Index<'c> {
  conn: &'c Connection,
}

impl<'c> Fts5Index<'c> {
  pub fn new(conn: &'c Connection) -> Self { Self { conn } }
}

impl TextIndex for Fts5Index<'_> {
  type Error = Error;

  fn insert(&mut self, entry: &IndexEntry) -> Result<()> {
    let existing = self.entry_count(entry.competency_id)?;
    if existing > 0 {
      return Err(
        cbme_core::Error::Consistency {
          competency_id: entry.competency_id,
          entries:       existing + 1,
        }
        .into(),
      );
    }
    self.conn.execute(
      "INSERT INTO competencies_fts (rowid, code, text, topic_name, subject_name)
       VALUES (?1, ?2, ?3, ?4, ?5)",
      rusqlite::params![
        entry.competency_id,
        entry.code,
        entry.text,
        entry.topic_name,
        entry.subject_name,
      ],
    )?;
    Ok(())
  }

  fn remove(&mut self, competency_id: i64) -> Result<usize> {
    Ok(self.conn.execute(
      "DELETE FROM competencies_fts WHERE rowid = ?1",
      rusqlite::params![competency_id],
    )?)
  }

  fn entry_count(&self, competency_id: i64) -> Result<usize> {
    let n: i64 = self.conn.query_row(
      "SELECT COUNT(*) FROM competencies_fts WHERE rowid = ?1",
      rusqlite::params![competency_id],
      |r| r.get(0),
    )?;
    Ok(n as usize)
  }

  fn clear(&mut self) -> Result<usize> {
    Ok(self.conn.execute("DELETE FROM competencies_fts", [])?)
  }

  fn total_entries(&self) -> Result<usize> {
    let n: i64 =
      self.conn.query_row("SELECT COUNT(*) FROM competencies_fts", [], |r| r.get(0))?;
    Ok(n as usize)
  }

  fn match_prefix(&self, expr: &MatchExpression, limit: usize) -> Result<Vec<RankedHit>> {
    // A negative LIMIT means unbounded to SQLite, so never let the cast wrap.
    let limit = limit.min(MAX_LIMIT) as i64;
    // bm25() is lower-is-better; negate so callers see higher-is-better.
    let mut stmt = self.conn.prepare(
      "SELECT rowid, code, -bm25(competencies_fts)
       FROM competencies_fts
       WHERE competencies_fts MATCH ?1
       ORDER BY rank, code
       LIMIT ?2",
    )?;
    let hits = stmt
      .query_map(rusqlite::params![expr.to_fts5(), limit], |row| {
        Ok(RankedHit {
          competency_id: row.get(0)?,
          code:          row.get(1)?,
          score:         row.get(2)?,
        })
      })?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(hits)
  }
}

#[cfg(test)]
mod tests {
  use cbme_core::sync::Synchronizer;

  use super::*;
  use crate::schema::SCHEMA;

  fn connection() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(SCHEMA).unwrap();
    conn
  }

  fn entry(id: i64, code: &str, text: &str, topic: &str) -> IndexEntry {
    IndexEntry {
      competency_id: id,
      code:          code.into(),
      text:          text.into(),
      topic_name:    topic.into(),
      subject_name:  "Anatomy".into(),
    }
  }

  fn hits(conn: &Connection, q: &str, limit: usize) -> Vec<(i64, String)> {
    let expr = MatchExpression::parse(q).unwrap();
    Fts5Index::new(conn)
      .match_prefix(&expr, limit)
      .unwrap()
      .into_iter()
      .map(|h| (h.competency_id, h.code))
      .collect()
  }

  fn search(conn: &Connection, q: &str) -> Vec<i64> {
    hits(conn, q, 50).into_iter().map(|(id, _)| id).collect()
  }

  // ─── Matching ────────────────────────────────────────────────────────────

  #[test]
  fn every_term_must_match_as_a_prefix() {
    let conn = connection();
    let mut index = Fts5Index::new(&conn);
    index.insert(&entry(1, "AN2.1", "Describe the aorta and heart", "Thorax")).unwrap();
    index.insert(&entry(2, "AN2.2", "General aorta", "Intro")).unwrap();
    index.insert(&entry(3, "PY1.2", "Cardiac rhythm", "Conduction")).unwrap();

    assert_eq!(search(&conn, "aorta heart"), [1]);
    assert_eq!(search(&conn, "cardi"), [3]);
    assert_eq!(search(&conn, "AN2.1"), [1]);
  }

  #[test]
  fn more_occurrences_rank_higher_and_ties_break_by_code() {
    let conn = connection();
    let mut index = Fts5Index::new(&conn);
    index.insert(&entry(1, "B1", "renal", "x")).unwrap();
    index.insert(&entry(2, "A1", "renal", "x")).unwrap();
    index.insert(&entry(3, "C1", "renal renal renal", "x")).unwrap();

    assert_eq!(search(&conn, "renal"), [3, 2, 1]);
  }

  #[test]
  fn limit_is_capped_and_never_unbounded() {
    let conn = connection();
    let mut index = Fts5Index::new(&conn);
    for i in 1..=(MAX_LIMIT as i64 + 5) {
      index.insert(&entry(i, &format!("X{i}"), "common text", "t")).unwrap();
    }

    assert_eq!(hits(&conn, "common", 2).len(), 2);
    assert_eq!(hits(&conn, "common", usize::MAX).len(), MAX_LIMIT);
  }

  // ─── Synchronizer over FTS5 ──────────────────────────────────────────────

  #[test]
  fn update_replaces_entry_with_new_topic() {
    let conn = connection();
    let mut index = Fts5Index::new(&conn);
    let mut sync = Synchronizer::new(&mut index);
    sync.on_create(&entry(1, "AN1.1", "Describe bones", "Thorax")).unwrap();
    sync.on_update(&entry(1, "AN1.1", "Describe bones", "Abdomen")).unwrap();

    assert_eq!(index.entry_count(1).unwrap(), 1);
    assert_eq!(search(&conn, "abdomen"), [1]);
    assert!(search(&conn, "thorax").is_empty());
  }

  #[test]
  fn update_of_unindexed_entry_inserts_it() {
    let conn = connection();
    let mut index = Fts5Index::new(&conn);
    Synchronizer::new(&mut index)
      .on_update(&entry(4, "AN4", "text", "topic"))
      .unwrap();
    assert_eq!(index.entry_count(4).unwrap(), 1);
  }

  #[test]
  fn delete_is_idempotent() {
    let conn = connection();
    let mut index = Fts5Index::new(&conn);
    let mut sync = Synchronizer::new(&mut index);
    sync.on_create(&entry(1, "AN1.1", "text", "topic")).unwrap();
    sync.on_delete(1).unwrap();
    sync.on_delete(1).unwrap();
    sync.on_delete(99).unwrap();
    assert_eq!(index.entry_count(1).unwrap(), 0);
  }

  #[test]
  fn create_twice_is_a_consistency_error() {
    let conn = connection();
    let mut index = Fts5Index::new(&conn);
    let mut sync = Synchronizer::new(&mut index);
    sync.on_create(&entry(1, "AN1.1", "text", "topic")).unwrap();
    let err = sync.on_create(&entry(1, "AN1.1", "text", "topic")).unwrap_err();
    assert!(matches!(
      err,
      Error::Core(cbme_core::Error::Consistency { competency_id: 1, entries: 2 })
    ));
    assert_eq!(index.entry_count(1).unwrap(), 1);
  }

  #[test]
  fn rebuild_discards_stale_entries() {
    let conn = connection();
    let mut index = Fts5Index::new(&conn);
    let mut sync = Synchronizer::new(&mut index);
    sync.on_create(&entry(1, "AN1.1", "draft text", "topic")).unwrap();
    sync.on_create(&entry(2, "AN1.2", "lost", "topic")).unwrap();

    let written = sync
      .rebuild_all(vec![entry(1, "AN1.1", "fresh text", "topic")])
      .unwrap();
    assert_eq!(written, 1);
    assert_eq!(index.total_entries().unwrap(), 1);
    assert!(search(&conn, "draft").is_empty());
    assert!(search(&conn, "lost").is_empty());
    assert_eq!(search(&conn, "fresh"), [1]);
  }

  #[test]
  fn rebuild_matches_incremental_maintenance() {
    let incremental = connection();
    let mut index = Fts5Index::new(&incremental);
    let mut sync = Synchronizer::new(&mut index);
    sync.on_create(&entry(1, "AN1.1", "heart chambers", "Thorax")).unwrap();
    sync.on_create(&entry(2, "AN1.2", "heart valves", "Thorax")).unwrap();
    sync.on_create(&entry(3, "AN1.3", "lung lobes", "Thorax")).unwrap();
    sync.on_update(&entry(2, "AN1.2", "heart valves and vessels", "Cardiology")).unwrap();
    sync.on_delete(3).unwrap();

    // The record store's final state, rebuilt from scratch.
    let rebuilt = connection();
    let mut index = Fts5Index::new(&rebuilt);
    Synchronizer::new(&mut index)
      .rebuild_all(vec![
        entry(1, "AN1.1", "heart chambers", "Thorax"),
        entry(2, "AN1.2", "heart valves and vessels", "Cardiology"),
      ])
      .unwrap();

    for q in ["heart", "cardio", "thorax", "lung", "AN1", "valves vessels"] {
      assert_eq!(hits(&incremental, q, 50), hits(&rebuilt, q, 50), "query {q:?}");
    }
  }
}
