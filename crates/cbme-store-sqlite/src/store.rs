//! [`SqliteStore`]: the SQLite implementation of [`CatalogStore`].

use std::path::Path;

use cbme_core::{
  group::{GroupedResults, group_by_subject},
  import::{FIRST_DATA_ROW, ImportBatch, ImportReport, NormalizedRow, RowError},
  index::{IndexEntry, TextIndex},
  model::{
    CatalogStats, CompetencyDetails, CompetencyPatch, IMPORTED_SUBJECT_ORDER, NewCompetency,
    NewSubject, Page, PageRequest, Subject, Topic,
  },
  query::{MatchExpression, SearchRequest},
  store::CatalogStore,
  sync::Synchronizer,
};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension as _, Transaction, TransactionBehavior};

use crate::{
  Error, Result,
  encode::{
    DETAILS_COLUMNS, DETAILS_FROM, RawCompetency, SUBJECT_COLUMNS, TOPIC_COLUMNS, encode_domain,
    encode_dt, subject_from_row, topic_from_row,
  },
  fts::Fts5Index,
  schema::SCHEMA,
  search,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A competency catalog backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted. The handle
/// is owned by whoever opened it and passed explicitly to the API layer.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Close the underlying connection. Every clone of this store becomes
  /// unusable afterwards.
  pub async fn close(self) -> Result<()> {
    self.conn.close().await?;
    Ok(())
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run `f` against the connection on its worker thread.
  async fn read<T, F>(&self, f: F) -> Result<T>
  where
    F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    T: Send + 'static,
  {
    self.conn.call(move |conn| Ok(f(conn))).await?
  }

  /// Run `f` inside one immediate write transaction. It commits only when `f`
  /// succeeds; on error every row and index change made by `f` is rolled
  /// back.
  async fn write<T, F>(&self, f: F) -> Result<T>
  where
    F: FnOnce(&mut Transaction<'_>) -> Result<T> + Send + 'static,
    T: Send + 'static,
  {
    self
      .conn
      .call(move |conn| {
        let mut tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let out = f(&mut tx);
        match &out {
          Ok(_) => tx.commit()?,
          Err(Error::Core(e @ cbme_core::Error::Consistency { .. })) => {
            tracing::error!(error = %e, "search index inconsistent; rolled back, rebuild required");
          }
          Err(_) => {}
        }
        Ok(out)
      })
      .await?
  }
}

// ─── Blocking helpers (run on the connection thread) ─────────────────────────

fn fetch_details(conn: &Connection, competency_id: i64) -> Result<Option<CompetencyDetails>> {
  let raw = conn
    .query_row(
      &format!("SELECT {DETAILS_COLUMNS} {DETAILS_FROM} WHERE c.competency_id = ?1"),
      rusqlite::params![competency_id],
      RawCompetency::from_row,
    )
    .optional()?;
  raw.map(RawCompetency::into_details).transpose()
}

/// Like [`fetch_details`] but soft-deleted rows count as missing.
fn fetch_live(conn: &Connection, competency_id: i64) -> Result<CompetencyDetails> {
  fetch_details(conn, competency_id)?
    .filter(|d| !d.competency.is_deleted())
    .ok_or_else(|| cbme_core::Error::CompetencyNotFound(competency_id).into())
}

fn query_details(
  conn: &Connection,
  sql: &str,
  params: impl rusqlite::Params,
) -> Result<Vec<CompetencyDetails>> {
  let mut stmt = conn.prepare(sql)?;
  let raws = stmt
    .query_map(params, RawCompetency::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawCompetency::into_details).collect()
}

fn topic_exists(conn: &Connection, topic_id: i64) -> Result<bool> {
  Ok(
    conn
      .query_row(
        "SELECT 1 FROM topics WHERE topic_id = ?1",
        rusqlite::params![topic_id],
        |_| Ok(true),
      )
      .optional()?
      .unwrap_or(false),
  )
}

fn ensure_topic_in(conn: &Connection, subject_id: i64, name: &str) -> Result<Topic> {
  let name = name.trim();
  conn.execute(
    "INSERT OR IGNORE INTO topics (subject_id, name, display_order) VALUES (?1, ?2, 0)",
    rusqlite::params![subject_id, name],
  )?;
  Ok(conn.query_row(
    &format!("SELECT {TOPIC_COLUMNS} FROM topics t WHERE t.subject_id = ?1 AND t.name = ?2"),
    rusqlite::params![subject_id, name],
    topic_from_row,
  )?)
}

/// Every live competency as an index entry, joined with current names.
fn load_index_entries(conn: &Connection) -> Result<Vec<IndexEntry>> {
  let mut stmt = conn.prepare(
    "SELECT c.competency_id, c.code, c.text, t.name, s.name
     FROM competencies c
     JOIN topics   t ON t.topic_id   = c.topic_id
     JOIN subjects s ON s.subject_id = t.subject_id
     WHERE c.deleted_at IS NULL",
  )?;
  let entries = stmt
    .query_map([], |row| {
      Ok(IndexEntry {
        competency_id: row.get(0)?,
        code:          row.get(1)?,
        text:          row.get(2)?,
        topic_name:    row.get(3)?,
        subject_name:  row.get(4)?,
      })
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(entries)
}

fn rebuild_in(conn: &Connection) -> Result<usize> {
  let entries = load_index_entries(conn)?;
  let mut index = Fts5Index::new(conn);
  Synchronizer::new(&mut index).rebuild_all(entries)
}

fn count(conn: &Connection, sql: &str) -> Result<usize> {
  let n: i64 = conn.query_row(sql, [], |r| r.get(0))?;
  Ok(n as usize)
}

enum Upserted {
  Inserted,
  Updated,
}

/// Write one imported row without touching the search index.
fn upsert_row(conn: &Connection, subject_id: i64, row: &NormalizedRow) -> Result<Upserted> {
  let topic = ensure_topic_in(conn, subject_id, &row.topic)?;
  let now = encode_dt(Utc::now());
  let domain = encode_domain(row.domain);

  let existing: Option<i64> = conn
    .query_row(
      "SELECT competency_id FROM competencies WHERE code = ?1",
      rusqlite::params![row.code],
      |r| r.get(0),
    )
    .optional()?;

  if let Some(id) = existing {
    conn.execute(
      "UPDATE competencies SET
         topic_id = ?1, text = ?2, domain = ?3, level = ?4, is_core = ?5,
         teaching_methods = ?6, assessment_methods = ?7, integrations = ?8,
         updated_at = ?9
       WHERE competency_id = ?10",
      rusqlite::params![
        topic.topic_id,
        row.text,
        domain,
        row.level,
        row.is_core,
        row.teaching_methods,
        row.assessment_methods,
        row.integrations,
        now,
        id,
      ],
    )?;
    Ok(Upserted::Updated)
  } else {
    conn.execute(
      "INSERT INTO competencies (
         code, topic_id, text, domain, level, is_core,
         teaching_methods, assessment_methods, integrations,
         created_at, updated_at
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
      rusqlite::params![
        row.code,
        topic.topic_id,
        row.text,
        domain,
        row.level,
        row.is_core,
        row.teaching_methods,
        row.assessment_methods,
        row.integrations,
        now,
      ],
    )?;
    Ok(Upserted::Inserted)
  }
}

// ─── CatalogStore impl ───────────────────────────────────────────────────────

impl CatalogStore for SqliteStore {
  type Error = Error;

  // ── Subjects ──────────────────────────────────────────────────────────────

  async fn list_subjects(&self) -> Result<Vec<Subject>> {
    self
      .read(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {SUBJECT_COLUMNS} FROM subjects ORDER BY display_order, name"
        ))?;
        let rows = stmt
          .query_map([], subject_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
  }

  async fn get_subject(&self, code: &str) -> Result<Option<Subject>> {
    let code = code.to_owned();
    self
      .read(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {SUBJECT_COLUMNS} FROM subjects WHERE code = ?1"),
              rusqlite::params![code],
              subject_from_row,
            )
            .optional()?,
        )
      })
      .await
  }

  async fn create_subject(&self, input: NewSubject) -> Result<Subject> {
    self
      .write(move |tx| {
        let taken = tx
          .query_row(
            "SELECT 1 FROM subjects WHERE code = ?1",
            rusqlite::params![input.code],
            |_| Ok(()),
          )
          .optional()?
          .is_some();
        if taken {
          return Err(cbme_core::Error::DuplicateSubject(input.code).into());
        }
        tx.execute(
          "INSERT INTO subjects (code, name, display_order) VALUES (?1, ?2, ?3)",
          rusqlite::params![input.code, input.name, input.display_order],
        )?;
        Ok(Subject {
          subject_id:    tx.last_insert_rowid(),
          code:          input.code,
          name:          input.name,
          display_order: input.display_order,
        })
      })
      .await
  }

  async fn seed_subjects(&self, subjects: Vec<NewSubject>) -> Result<usize> {
    self
      .write(move |tx| {
        let mut stmt = tx.prepare(
          "INSERT OR IGNORE INTO subjects (code, name, display_order) VALUES (?1, ?2, ?3)",
        )?;
        let mut inserted = 0;
        for s in &subjects {
          inserted += stmt.execute(rusqlite::params![s.code, s.name, s.display_order])?;
        }
        Ok(inserted)
      })
      .await
  }

  // ── Topics ────────────────────────────────────────────────────────────────

  async fn list_topics(&self, subject_code: &str) -> Result<Vec<Topic>> {
    let code = subject_code.to_owned();
    self
      .read(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {TOPIC_COLUMNS}
           FROM topics t
           JOIN subjects s ON s.subject_id = t.subject_id
           WHERE s.code = ?1
           ORDER BY t.display_order, t.name"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![code], topic_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
  }

  async fn ensure_topic(&self, subject_id: i64, name: String) -> Result<Topic> {
    self
      .write(move |tx| {
        let exists = tx
          .query_row(
            "SELECT 1 FROM subjects WHERE subject_id = ?1",
            rusqlite::params![subject_id],
            |_| Ok(()),
          )
          .optional()?
          .is_some();
        if !exists {
          return Err(cbme_core::Error::SubjectNotFound(subject_id.to_string()).into());
        }
        ensure_topic_in(tx, subject_id, &name)
      })
      .await
  }

  // ── Competencies: reads ──────────────────────────────────────────────────

  async fn get_competency(&self, competency_id: i64) -> Result<Option<CompetencyDetails>> {
    self
      .read(move |conn| {
        Ok(fetch_details(conn, competency_id)?.filter(|d| !d.competency.is_deleted()))
      })
      .await
  }

  async fn get_competency_by_code(&self, code: &str) -> Result<Option<CompetencyDetails>> {
    let code = code.to_owned();
    self
      .read(move |conn| {
        let mut rows = query_details(
          conn,
          &format!(
            "SELECT {DETAILS_COLUMNS} {DETAILS_FROM}
             WHERE c.code = ?1 AND c.deleted_at IS NULL"
          ),
          rusqlite::params![code],
        )?;
        Ok(rows.pop())
      })
      .await
  }

  async fn get_competencies_by_codes(&self, codes: &[String]) -> Result<Vec<CompetencyDetails>> {
    if codes.is_empty() {
      return Ok(Vec::new());
    }
    let codes = codes.to_vec();
    self
      .read(move |conn| {
        let placeholders = vec!["?"; codes.len()].join(", ");
        query_details(
          conn,
          &format!(
            "SELECT {DETAILS_COLUMNS} {DETAILS_FROM}
             WHERE c.code IN ({placeholders}) AND c.deleted_at IS NULL
             ORDER BY c.code"
          ),
          rusqlite::params_from_iter(codes.iter()),
        )
      })
      .await
  }

  async fn list_competencies_by_topic(&self, topic_id: i64) -> Result<Vec<CompetencyDetails>> {
    self
      .read(move |conn| {
        query_details(
          conn,
          &format!(
            "SELECT {DETAILS_COLUMNS} {DETAILS_FROM}
             WHERE c.topic_id = ?1 AND c.deleted_at IS NULL
             ORDER BY c.code"
          ),
          rusqlite::params![topic_id],
        )
      })
      .await
  }

  async fn list_competencies(&self, request: &PageRequest) -> Result<Page<CompetencyDetails>> {
    request.validate()?;
    let request = request.clone();
    let limit = request.page_size as i64;
    let offset = request.offset().map_or(i64::MAX, |o| o as i64);
    self
      .read(move |conn| {
        let mut conds = String::from("WHERE c.deleted_at IS NULL");
        let mut params: Vec<rusqlite::types::Value> = Vec::new();
        if let Some(subject) = &request.subject {
          conds.push_str(" AND s.code = ?");
          params.push(subject.clone().into());
        }
        if let Some(term) = request.search.as_deref().filter(|t| !t.is_empty()) {
          conds.push_str(" AND (c.code LIKE ? OR c.text LIKE ?)");
          let pattern = format!("%{term}%");
          params.push(pattern.clone().into());
          params.push(pattern.into());
        }

        let total: i64 = conn.query_row(
          &format!("SELECT COUNT(*) {DETAILS_FROM} {conds}"),
          rusqlite::params_from_iter(params.iter()),
          |r| r.get(0),
        )?;

        params.push(limit.into());
        params.push(offset.into());
        let data = query_details(
          conn,
          &format!(
            "SELECT {DETAILS_COLUMNS} {DETAILS_FROM} {conds}
             ORDER BY s.display_order, c.code
             LIMIT ? OFFSET ?"
          ),
          rusqlite::params_from_iter(params.iter()),
        )?;

        Ok(Page::new(data, total as usize, &request))
      })
      .await
  }

  // ── Competencies: writes ─────────────────────────────────────────────────

  async fn create_competency(&self, input: NewCompetency) -> Result<CompetencyDetails> {
    let now = encode_dt(Utc::now());

    let details = self
      .write(move |tx| {
        let taken = tx
          .query_row(
            "SELECT 1 FROM competencies WHERE code = ?1",
            rusqlite::params![input.code],
            |_| Ok(()),
          )
          .optional()?
          .is_some();
        if taken {
          return Err(cbme_core::Error::DuplicateCode(input.code).into());
        }
        if !topic_exists(tx, input.topic_id)? {
          return Err(cbme_core::Error::TopicNotFound(input.topic_id).into());
        }

        tx.execute(
          "INSERT INTO competencies (
             code, topic_id, text, domain, level, is_core,
             teaching_methods, assessment_methods, integrations,
             created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
          rusqlite::params![
            input.code,
            input.topic_id,
            input.text,
            encode_domain(input.domain),
            input.level,
            input.is_core,
            input.teaching_methods,
            input.assessment_methods,
            input.integrations,
            now,
          ],
        )?;
        let details = fetch_live(tx, tx.last_insert_rowid())?;

        let mut index = Fts5Index::new(tx);
        Synchronizer::new(&mut index).on_create(&IndexEntry::from(&details))?;
        Ok(details)
      })
      .await?;

    tracing::debug!(code = %details.competency.code, "competency created");
    Ok(details)
  }

  async fn update_competency(
    &self,
    competency_id: i64,
    patch: CompetencyPatch,
  ) -> Result<CompetencyDetails> {
    self
      .write(move |tx| {
        let current = fetch_live(tx, competency_id)?;
        if patch.is_empty() {
          return Ok(current);
        }
        if let Some(topic_id) = patch.topic_id {
          if !topic_exists(tx, topic_id)? {
            return Err(cbme_core::Error::TopicNotFound(topic_id).into());
          }
        }

        let mut c = current.competency;
        patch.apply(&mut c);
        c.updated_at = Utc::now();

        tx.execute(
          "UPDATE competencies SET
             topic_id = ?1, text = ?2, domain = ?3, level = ?4, is_core = ?5,
             teaching_methods = ?6, assessment_methods = ?7, integrations = ?8,
             updated_at = ?9
           WHERE competency_id = ?10",
          rusqlite::params![
            c.topic_id,
            c.text,
            encode_domain(c.domain),
            c.level,
            c.is_core,
            c.teaching_methods,
            c.assessment_methods,
            c.integrations,
            encode_dt(c.updated_at),
            competency_id,
          ],
        )?;
        let details = fetch_live(tx, competency_id)?;

        let mut index = Fts5Index::new(tx);
        Synchronizer::new(&mut index).on_update(&IndexEntry::from(&details))?;
        Ok(details)
      })
      .await
  }

  async fn delete_competency(&self, competency_id: i64) -> Result<()> {
    let now = encode_dt(Utc::now());
    self
      .write(move |tx| {
        let state: Option<Option<String>> = tx
          .query_row(
            "SELECT deleted_at FROM competencies WHERE competency_id = ?1",
            rusqlite::params![competency_id],
            |r| r.get(0),
          )
          .optional()?;
        match state {
          None => return Err(cbme_core::Error::CompetencyNotFound(competency_id).into()),
          Some(None) => {
            tx.execute(
              "UPDATE competencies SET deleted_at = ?1 WHERE competency_id = ?2",
              rusqlite::params![now, competency_id],
            )?;
          }
          Some(Some(_)) => {}
        }

        let mut index = Fts5Index::new(tx);
        Synchronizer::new(&mut index).on_delete(competency_id)
      })
      .await
  }

  async fn restore_competency(&self, competency_id: i64) -> Result<CompetencyDetails> {
    self
      .write(move |tx| {
        let restored = tx.execute(
          "UPDATE competencies SET deleted_at = NULL WHERE competency_id = ?1",
          rusqlite::params![competency_id],
        )?;
        if restored == 0 {
          return Err(cbme_core::Error::CompetencyNotFound(competency_id).into());
        }
        let details = fetch_live(tx, competency_id)?;

        let mut index = Fts5Index::new(tx);
        Synchronizer::new(&mut index).on_update(&IndexEntry::from(&details))?;
        Ok(details)
      })
      .await
  }

  // ── Search ────────────────────────────────────────────────────────────────

  async fn search(&self, request: &SearchRequest) -> Result<GroupedResults> {
    let Some(expr) = request.expression() else {
      return Ok(GroupedResults::empty(request.query.as_str()));
    };
    let filters = request.filters.clone();
    let limit = request.effective_limit();

    let ranked = self
      .read(move |conn| search::execute(conn, &expr, &filters, limit))
      .await?;
    Ok(group_by_subject(ranked, &request.query))
  }

  async fn suggestions(&self, query: &str, limit: usize) -> Result<Vec<String>> {
    let Some(expr) = MatchExpression::parse(query) else {
      return Ok(Vec::new());
    };
    self
      .read(move |conn| {
        let hits = Fts5Index::new(conn).match_prefix(&expr, limit)?;
        Ok(hits.into_iter().map(|h| h.code).collect())
      })
      .await
  }

  // ── Index maintenance & bulk import ───────────────────────────────────────

  async fn rebuild_index(&self) -> Result<usize> {
    let written = self.write(|tx| rebuild_in(tx)).await?;
    tracing::info!(entries = written, "search index rebuilt");
    Ok(written)
  }

  async fn index_entry_count(&self, competency_id: i64) -> Result<usize> {
    self
      .read(move |conn| Fts5Index::new(conn).entry_count(competency_id))
      .await
  }

  async fn import_batch(&self, batch: ImportBatch) -> Result<ImportReport> {
    let subject_code = batch.subject_code.clone();

    let report = self
      .write(move |tx| {
        tx.execute(
          "INSERT OR IGNORE INTO subjects (code, name, display_order) VALUES (?1, ?2, ?3)",
          rusqlite::params![
            batch.subject_code,
            batch.subject_name.as_deref().unwrap_or(&batch.subject_code),
            IMPORTED_SUBJECT_ORDER,
          ],
        )?;
        let subject_id: i64 = tx.query_row(
          "SELECT subject_id FROM subjects WHERE code = ?1",
          rusqlite::params![batch.subject_code],
          |r| r.get(0),
        )?;

        let mut report = ImportReport::default();
        for (i, row) in batch.rows.iter().enumerate() {
          let Some(row) = row.normalize() else {
            report.skipped += 1;
            continue;
          };
          // Each row gets its own savepoint so a failure leaves no partial
          // topic or competency behind.
          let sp = tx.savepoint()?;
          match upsert_row(&sp, subject_id, &row) {
            Ok(upserted) => {
              sp.commit()?;
              match upserted {
                Upserted::Inserted => report.inserted += 1,
                Upserted::Updated => report.updated += 1,
              }
            }
            Err(e) => report.errors.push(RowError {
              row:   i + FIRST_DATA_ROW,
              error: e.to_string(),
            }),
          }
        }

        // Rows above bypassed per-row sync; restore the index before commit.
        report.indexed = rebuild_in(tx)?;
        report.success = report.errors.is_empty();
        Ok(report)
      })
      .await?;

    tracing::info!(
      subject = %subject_code,
      inserted = report.inserted,
      updated = report.updated,
      skipped = report.skipped,
      errors = report.errors.len(),
      indexed = report.indexed,
      "import batch applied"
    );
    Ok(report)
  }

  async fn stats(&self) -> Result<CatalogStats> {
    self
      .read(|conn| {
        Ok(CatalogStats {
          subjects:          count(conn, "SELECT COUNT(*) FROM subjects")?,
          topics:            count(conn, "SELECT COUNT(*) FROM topics")?,
          competencies:      count(
            conn,
            "SELECT COUNT(*) FROM competencies WHERE deleted_at IS NULL",
          )?,
          core_competencies: count(
            conn,
            "SELECT COUNT(*) FROM competencies WHERE deleted_at IS NULL AND is_core = 1",
          )?,
        })
      })
      .await
  }
}
