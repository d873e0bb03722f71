//! Subject grouping of ranked search results.

use serde::{Deserialize, Serialize};

use crate::model::CompetencyDetails;

/// The subject a result group belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectSummary {
  pub code: String,
  pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchGroup {
  pub subject:      SubjectSummary,
  pub competencies: Vec<CompetencyDetails>,
}

/// Search response: the caller's query echoed back, the ungrouped result
/// count, and the groups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupedResults {
  pub query:  String,
  pub total:  usize,
  pub groups: Vec<SearchGroup>,
}

impl GroupedResults {
  pub fn empty(query: impl Into<String>) -> Self {
    Self { query: query.into(), total: 0, groups: Vec::new() }
  }
}

/// Partition `ranked` by subject code.
///
/// Groups appear in the order their subject first occurs in `ranked`, and
/// members keep their relative rank. Nothing is re-sorted.
pub fn group_by_subject(ranked: Vec<CompetencyDetails>, query: &str) -> GroupedResults {
  let total = ranked.len();
  let mut groups: Vec<SearchGroup> = Vec::new();

  for result in ranked {
    match groups.iter_mut().find(|g| g.subject.code == result.subject_code) {
      Some(group) => group.competencies.push(result),
      None => groups.push(SearchGroup {
        subject:      SubjectSummary {
          code: result.subject_code.clone(),
          name: result.subject_name.clone(),
        },
        competencies: vec![result],
      }),
    }
  }

  GroupedResults { query: query.to_owned(), total, groups }
}
