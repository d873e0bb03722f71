//! Query preparation: sanitization, prefix match expressions, and filters.
//!
//! Free text from users never reaches a match engine verbatim. It is reduced
//! to word characters and single spaces, split into terms, and every term is
//! treated as a prefix. All terms must match (implicit AND).

use serde::{Deserialize, Deserializer, Serialize};

/// Queries shorter than this (in characters, after sanitization) return the
/// empty result without consulting the index.
pub const MIN_QUERY_CHARS: usize = 2;

pub const DEFAULT_LIMIT: usize = 50;

/// Upper bound on the number of results a single search may request.
pub const MAX_LIMIT: usize = 500;

pub const DEFAULT_SUGGESTION_LIMIT: usize = 10;

/// Replace every character that is not alphanumeric, `_`, or whitespace with
/// a space, collapse whitespace runs, and trim.
///
/// `"AN1.1"` becomes `"AN1 1"`, which still matches the tokens the index
/// produced for that code.
pub fn sanitize(raw: &str) -> String {
  let replaced: String = raw
    .chars()
    .map(|c| if c.is_alphanumeric() || c == '_' || c.is_whitespace() { c } else { ' ' })
    .collect();
  replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ─── Match expression ────────────────────────────────────────────────────────

/// A sanitized, non-trivial query: one or more prefix terms joined by AND.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchExpression {
  terms: Vec<String>,
}

impl MatchExpression {
  /// Sanitize `raw` and split it into terms.
  ///
  /// Returns `None` when the sanitized query is shorter than
  /// [`MIN_QUERY_CHARS`]; callers treat that as "no results", not an error.
  pub fn parse(raw: &str) -> Option<Self> {
    let sanitized = sanitize(raw);
    if sanitized.chars().count() < MIN_QUERY_CHARS {
      return None;
    }
    let terms = sanitized.split(' ').map(str::to_owned).collect();
    Some(Self { terms })
  }

  pub fn terms(&self) -> &[String] { &self.terms }

  /// Render as an SQLite FTS5 query.
  ///
  /// Each term becomes a quoted prefix phrase (`"cardi"*`), so barewords like
  /// `AND` or `NEAR` in user input are matched as text rather than parsed as
  /// operators. Space-separated phrases are ANDed by FTS5.
  pub fn to_fts5(&self) -> String {
    self
      .terms
      .iter()
      .map(|t| format!("\"{}\"*", t.replace('"', "\"\"")))
      .collect::<Vec<_>>()
      .join(" ")
  }
}

// ─── Filters ─────────────────────────────────────────────────────────────────

/// Structured filters, applied as conjunctive predicates on top of the text
/// match. Unknown codes are not rejected; they simply match nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilters {
  /// Subject codes; empty means any subject.
  #[serde(default, deserialize_with = "one_or_many")]
  pub subject:   Vec<String>,
  /// Domain codes (`"K"`, `"K/S"`, …); empty means any domain.
  #[serde(default, deserialize_with = "one_or_many")]
  pub domain:    Vec<String>,
  #[serde(default)]
  pub core_only: bool,
}

impl SearchFilters {
  pub fn subject(mut self, code: impl Into<String>) -> Self {
    self.subject.push(code.into());
    self
  }

  pub fn domain(mut self, code: impl Into<String>) -> Self {
    self.domain.push(code.into());
    self
  }

  pub fn core_only(mut self) -> Self {
    self.core_only = true;
    self
  }
}

/// Accept either `"AN"` or `["AN", "PY"]`.
fn one_or_many<'de, D>(de: D) -> Result<Vec<String>, D::Error>
where
  D: Deserializer<'de>,
{
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum OneOrMany {
    One(String),
    Many(Vec<String>),
  }

  Ok(match Option::<OneOrMany>::deserialize(de)? {
    None => Vec::new(),
    Some(OneOrMany::One(s)) => vec![s],
    Some(OneOrMany::Many(v)) => v,
  })
}

// ─── Request ─────────────────────────────────────────────────────────────────

/// Parameters for [`crate::store::CatalogStore::search`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
  pub query:   String,
  #[serde(default)]
  pub filters: SearchFilters,
  #[serde(default = "default_limit")]
  pub limit:   usize,
}

fn default_limit() -> usize { DEFAULT_LIMIT }

impl SearchRequest {
  pub fn new(query: impl Into<String>) -> Self {
    Self { query: query.into(), filters: SearchFilters::default(), limit: DEFAULT_LIMIT }
  }

  pub fn with_filters(mut self, filters: SearchFilters) -> Self {
    self.filters = filters;
    self
  }

  pub fn with_limit(mut self, limit: usize) -> Self {
    self.limit = limit;
    self
  }

  /// The limit actually applied: zero means the default, and large values
  /// are clamped to [`MAX_LIMIT`].
  pub fn effective_limit(&self) -> usize {
    match self.limit {
      0 => DEFAULT_LIMIT,
      n => n.min(MAX_LIMIT),
    }
  }

  pub fn expression(&self) -> Option<MatchExpression> { MatchExpression::parse(&self.query) }
}
