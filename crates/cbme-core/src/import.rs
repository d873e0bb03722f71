//! Bulk import: row normalization and the batch report.
//!
//! Rows arrive already mapped to fields; reading spreadsheets is the
//! caller's job. The store applies a whole batch on one transaction and
//! rebuilds the search index at the end instead of syncing per row.

use serde::{Deserialize, Serialize};

use crate::model::Domain;

/// Topic assigned to rows that name none.
pub const DEFAULT_TOPIC: &str = "General";

/// Spreadsheet row number of the first data row (row 1 is the header).
pub const FIRST_DATA_ROW: usize = 2;

/// One imported row. Every field is optional at this stage; rows without a
/// code or text are skipped.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportRow {
  pub code:               Option<String>,
  pub topic:              Option<String>,
  pub text:               Option<String>,
  pub domain:             Option<String>,
  pub level:              Option<String>,
  /// Raw core marker, e.g. "Y", "Core", "must know".
  pub core:               Option<String>,
  pub teaching_methods:   Option<String>,
  pub assessment_methods: Option<String>,
  pub integrations:       Option<String>,
}

/// All rows belonging to one subject.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportBatch {
  pub subject_code: String,
  /// Name for the subject if it has to be created; defaults to the code.
  pub subject_name: Option<String>,
  pub rows:         Vec<ImportRow>,
}

/// A row that was normalized and is ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedRow {
  pub code:               String,
  pub topic:              String,
  pub text:               String,
  pub domain:             Domain,
  pub level:              String,
  pub is_core:            bool,
  pub teaching_methods:   Option<String>,
  pub assessment_methods: Option<String>,
  pub integrations:       Option<String>,
}

impl ImportRow {
  /// Trim every field and apply defaults. `None` means the row is skipped.
  pub fn normalize(&self) -> Option<NormalizedRow> {
    let code = clean(&self.code)?;
    let text = clean(&self.text)?;
    Some(NormalizedRow {
      code,
      text,
      topic: clean(&self.topic).unwrap_or_else(|| DEFAULT_TOPIC.to_owned()),
      domain: normalize_domain(self.domain.as_deref().unwrap_or("K")),
      level: clean(&self.level).unwrap_or_default(),
      is_core: self.core.as_deref().is_some_and(parse_core_flag),
      teaching_methods: clean(&self.teaching_methods),
      assessment_methods: clean(&self.assessment_methods),
      integrations: clean(&self.integrations),
    })
  }
}

fn clean(field: &Option<String>) -> Option<String> {
  field
    .as_deref()
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .map(str::to_owned)
}

/// Map free-form domain text to a [`Domain`] by which of K, S, A it
/// contains. Anything unrecognized is Knowledge.
pub fn normalize_domain(raw: &str) -> Domain {
  let upper = raw.trim().to_uppercase();
  Domain::from_letters(upper.contains('K'), upper.contains('S'), upper.contains('A'))
    .unwrap_or_default()
}

/// Whether a raw core marker means "core".
pub fn parse_core_flag(raw: &str) -> bool {
  matches!(
    raw.trim().to_lowercase().as_str(),
    "yes" | "true" | "1" | "y" | "core" | "must know"
  )
}

// ─── Report ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
  /// Spreadsheet row number; 0 for batch-level failures.
  pub row:   usize,
  pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
  pub success:  bool,
  pub inserted: usize,
  pub updated:  usize,
  pub skipped:  usize,
  pub errors:   Vec<RowError>,
  /// Entries in the search index after the closing rebuild.
  pub indexed:  usize,
}

impl ImportReport {
  /// Fold another batch's report into this one, prefixing its errors with
  /// `label` (usually the source file name).
  pub fn merge(&mut self, label: &str, other: ImportReport) {
    self.inserted += other.inserted;
    self.updated += other.updated;
    self.skipped += other.skipped;
    self.indexed = other.indexed;
    self.errors.extend(other.errors.into_iter().map(|e| RowError {
      row:   e.row,
      error: format!("{label}: {}", e.error),
    }));
    self.success = self.errors.is_empty();
  }
}
