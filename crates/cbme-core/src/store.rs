//! The `CatalogStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `cbme-store-sqlite`).
//! Higher layers (`cbme-api`, `cbme-server`) depend on this abstraction, not
//! on any concrete backend.
//!
//! Every competency mutation keeps the search index in step on the same
//! transaction as the row write; the only writer of the index is the store
//! itself.

use std::future::Future;

use crate::{
  Classify,
  group::GroupedResults,
  import::{ImportBatch, ImportReport},
  model::{
    CatalogStats, CompetencyDetails, CompetencyPatch, NewCompetency, NewSubject, Page,
    PageRequest, Subject, Topic,
  },
  query::SearchRequest,
};

/// Abstraction over a competency catalog backend.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait CatalogStore: Send + Sync {
  type Error: std::error::Error + Classify + Send + Sync + 'static;

  // ── Subjects ──────────────────────────────────────────────────────────

  /// All subjects ordered by display order, then name.
  fn list_subjects(
    &self,
  ) -> impl Future<Output = Result<Vec<Subject>, Self::Error>> + Send + '_;

  /// Retrieve a subject by code. Returns `None` if not found.
  fn get_subject<'a>(
    &'a self,
    code: &'a str,
  ) -> impl Future<Output = Result<Option<Subject>, Self::Error>> + Send + 'a;

  /// Create a subject. Fails with a conflict if the code is taken.
  fn create_subject(
    &self,
    input: NewSubject,
  ) -> impl Future<Output = Result<Subject, Self::Error>> + Send + '_;

  /// Insert any of `subjects` whose code is not present yet; returns how many
  /// were inserted.
  fn seed_subjects(
    &self,
    subjects: Vec<NewSubject>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  // ── Topics ────────────────────────────────────────────────────────────

  /// Topics of a subject ordered by display order, then name.
  fn list_topics<'a>(
    &'a self,
    subject_code: &'a str,
  ) -> impl Future<Output = Result<Vec<Topic>, Self::Error>> + Send + 'a;

  /// Return the topic named `name` under `subject_id`, creating it if needed.
  fn ensure_topic(
    &self,
    subject_id: i64,
    name: String,
  ) -> impl Future<Output = Result<Topic, Self::Error>> + Send + '_;

  // ── Competencies: reads (soft-deleted rows are never returned) ───────

  fn get_competency(
    &self,
    competency_id: i64,
  ) -> impl Future<Output = Result<Option<CompetencyDetails>, Self::Error>> + Send + '_;

  fn get_competency_by_code<'a>(
    &'a self,
    code: &'a str,
  ) -> impl Future<Output = Result<Option<CompetencyDetails>, Self::Error>> + Send + 'a;

  /// Competencies for the given codes, ordered by code. Unknown codes are
  /// ignored.
  fn get_competencies_by_codes<'a>(
    &'a self,
    codes: &'a [String],
  ) -> impl Future<Output = Result<Vec<CompetencyDetails>, Self::Error>> + Send + 'a;

  fn list_competencies_by_topic(
    &self,
    topic_id: i64,
  ) -> impl Future<Output = Result<Vec<CompetencyDetails>, Self::Error>> + Send + '_;

  /// Paginated listing for administration.
  fn list_competencies<'a>(
    &'a self,
    request: &'a PageRequest,
  ) -> impl Future<Output = Result<Page<CompetencyDetails>, Self::Error>> + Send + 'a;

  // ── Competencies: writes (each synchronizes the search index) ────────

  /// Create a competency and its index entry.
  fn create_competency(
    &self,
    input: NewCompetency,
  ) -> impl Future<Output = Result<CompetencyDetails, Self::Error>> + Send + '_;

  /// Apply `patch` and replace the index entry. Soft-deleted or missing
  /// competencies are not found.
  fn update_competency(
    &self,
    competency_id: i64,
    patch: CompetencyPatch,
  ) -> impl Future<Output = Result<CompetencyDetails, Self::Error>> + Send + '_;

  /// Soft-delete a competency and drop its index entry. Deleting an already
  /// deleted competency succeeds without changes.
  fn delete_competency(
    &self,
    competency_id: i64,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Clear the deletion timestamp and index the competency again.
  fn restore_competency(
    &self,
    competency_id: i64,
  ) -> impl Future<Output = Result<CompetencyDetails, Self::Error>> + Send + '_;

  // ── Search ────────────────────────────────────────────────────────────

  /// Ranked, filtered, subject-grouped search. Queries under two characters
  /// after sanitization return the empty result without touching the index.
  fn search<'a>(
    &'a self,
    request: &'a SearchRequest,
  ) -> impl Future<Output = Result<GroupedResults, Self::Error>> + Send + 'a;

  /// Codes of competencies matching `query` as prefixes, best first.
  fn suggestions<'a>(
    &'a self,
    query: &'a str,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + 'a;

  // ── Index maintenance & bulk import ──────────────────────────────────

  /// Regenerate the whole search index from current non-deleted
  /// competencies; returns the number of entries written.
  fn rebuild_index(&self) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// Number of index entries held for `competency_id`.
  fn index_entry_count(
    &self,
    competency_id: i64,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// Upsert a batch of rows for one subject, then rebuild the index.
  fn import_batch(
    &self,
    batch: ImportBatch,
  ) -> impl Future<Output = Result<ImportReport, Self::Error>> + Send + '_;

  fn stats(&self) -> impl Future<Output = Result<CatalogStats, Self::Error>> + Send + '_;
}
