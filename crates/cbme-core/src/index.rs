//! The search index: a denormalized, tokenized view of every live competency.
//!
//! [`TextIndex`] is the capability a match engine must provide. Backends plug
//! in their own engine; the SQLite store uses an FTS5 table written inside
//! the caller's transaction.
//!
//! Only [`crate::sync::Synchronizer`] writes through this trait.

use serde::{Deserialize, Serialize};

use crate::{Error, model::CompetencyDetails, query::MatchExpression};

// ─── Entry ───────────────────────────────────────────────────────────────────

/// One index entry per non-deleted competency, keyed by `competency_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
  pub competency_id: i64,
  pub code:          String,
  pub text:          String,
  pub topic_name:    String,
  pub subject_name:  String,
}

impl From<&CompetencyDetails> for IndexEntry {
  fn from(d: &CompetencyDetails) -> Self {
    Self {
      competency_id: d.competency.competency_id,
      code:          d.competency.code.clone(),
      text:          d.competency.text.clone(),
      topic_name:    d.topic_name.clone(),
      subject_name:  d.subject_name.clone(),
    }
  }
}

/// A match, best first. Higher `score` is more relevant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedHit {
  pub competency_id: i64,
  pub code:          String,
  pub score:         f64,
}

// ─── Capability ──────────────────────────────────────────────────────────────

/// A token-prefix match engine with relevance ranking.
pub trait TextIndex {
  type Error: From<Error>;

  /// Add an entry. Fails if an entry with the same identity already exists.
  fn insert(&mut self, entry: &IndexEntry) -> Result<(), Self::Error>;

  /// Remove every entry for `competency_id`, returning how many were removed.
  fn remove(&mut self, competency_id: i64) -> Result<usize, Self::Error>;

  /// Number of entries held for `competency_id`; 0 or 1 when consistent.
  fn entry_count(&self, competency_id: i64) -> Result<usize, Self::Error>;

  /// Drop every entry, returning how many were removed.
  fn clear(&mut self) -> Result<usize, Self::Error>;

  fn total_entries(&self) -> Result<usize, Self::Error>;

  /// Entries matching every term of `expr` as a token prefix, best first,
  /// ties broken by code. At most `limit` hits, capped at
  /// [`crate::query::MAX_LIMIT`].
  fn match_prefix(
    &self,
    expr: &MatchExpression,
    limit: usize,
  ) -> Result<Vec<RankedHit>, Self::Error>;
}
