//! Ranked, filtered full-text search over the FTS5 index.
//!
//! The match runs against `competencies_fts` and joins back to the record
//! tables for the full row and the filter columns. Results come out best
//! first by FTS5 rank (BM25), ties broken by competency code.

use cbme_core::{
  model::CompetencyDetails,
  query::{MatchExpression, SearchFilters},
};
use rusqlite::{Connection, types::Value};

use crate::{
  Result,
  encode::{DETAILS_COLUMNS, RawCompetency},
};

/// Build the SQL and its positional parameters for a search.
fn build_query(
  expr: &MatchExpression,
  filters: &SearchFilters,
  limit: usize,
) -> (String, Vec<Value>) {
  let mut sql = format!(
    "SELECT {DETAILS_COLUMNS}
     FROM competencies_fts
     JOIN competencies c ON c.competency_id = competencies_fts.rowid
     JOIN topics       t ON t.topic_id      = c.topic_id
     JOIN subjects     s ON s.subject_id    = t.subject_id
     WHERE competencies_fts MATCH ?
       AND c.deleted_at IS NULL"
  );
  let mut params = vec![Value::Text(expr.to_fts5())];

  push_membership(&mut sql, &mut params, "s.code", &filters.subject);
  push_membership(&mut sql, &mut params, "c.domain", &filters.domain);
  if filters.core_only {
    sql.push_str(" AND c.is_core = 1");
  }

  sql.push_str(" ORDER BY competencies_fts.rank, c.code LIMIT ?");
  params.push(Value::Integer(limit as i64));

  (sql, params)
}

/// Append `AND column = ?` for one value or `AND column IN (?, …)` for many.
/// Nothing is appended for an empty list.
fn push_membership(sql: &mut String, params: &mut Vec<Value>, column: &str, values: &[String]) {
  match values {
    [] => {}
    [one] => {
      sql.push_str(&format!(" AND {column} = ?"));
      params.push(Value::Text(one.clone()));
    }
    many => {
      let placeholders = vec!["?"; many.len()].join(", ");
      sql.push_str(&format!(" AND {column} IN ({placeholders})"));
      params.extend(many.iter().cloned().map(Value::Text));
    }
  }
}

/// Execute a search on the connection thread.
pub fn execute(
  conn: &Connection,
  expr: &MatchExpression,
  filters: &SearchFilters,
  limit: usize,
) -> Result<Vec<CompetencyDetails>> {
  let (sql, params) = build_query(expr, filters, limit);
  let mut stmt = conn.prepare(&sql)?;
  let raws = stmt
    .query_map(rusqlite::params_from_iter(params), RawCompetency::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawCompetency::into_details).collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn expr(q: &str) -> MatchExpression { MatchExpression::parse(q).unwrap() }

  #[test]
  fn unfiltered_query_has_match_and_limit_only() {
    let (sql, params) = build_query(&expr("heart"), &SearchFilters::default(), 50);
    assert!(sql.contains("MATCH ?"));
    assert!(!sql.contains("s.code ="));
    assert!(!sql.contains("is_core"));
    assert_eq!(params, [Value::Text("\"heart\"*".into()), Value::Integer(50)]);
  }

  #[test]
  fn single_and_multiple_filter_values() {
    let filters = SearchFilters::default()
      .subject("AN")
      .domain("K")
      .domain("K/S")
      .core_only();
    let (sql, params) = build_query(&expr("heart"), &filters, 10);
    assert!(sql.contains("AND s.code = ?"));
    assert!(sql.contains("AND c.domain IN (?, ?)"));
    assert!(sql.contains("AND c.is_core = 1"));
    assert_eq!(params.len(), 5);
    assert_eq!(params[1], Value::Text("AN".into()));
    assert_eq!(params[4], Value::Integer(10));
  }
}
