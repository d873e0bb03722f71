//! Catalog model: Subject → Topic → Competency.
//!
//! Competencies are the unit of search. Subjects and topics exist only to
//! group them; their names are denormalized into the search index so a query
//! for "physiology" finds every competency filed under that subject.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, query::MAX_LIMIT};

// ─── Subject ─────────────────────────────────────────────────────────────────

/// Top-level grouping, e.g. `AN` / "Anatomy".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
  pub subject_id:    i64,
  /// Unique short code; also the prefix of its competency codes.
  pub code:          String,
  pub name:          String,
  pub display_order: i64,
}

/// Input to [`crate::store::CatalogStore::create_subject`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSubject {
  pub code:          String,
  pub name:          String,
  #[serde(default)]
  pub display_order: i64,
}

impl NewSubject {
  pub fn new(code: impl Into<String>, name: impl Into<String>, display_order: i64) -> Self {
    Self { code: code.into(), name: name.into(), display_order }
  }
}

/// Display order assigned to subjects created implicitly by an import.
pub const IMPORTED_SUBJECT_ORDER: i64 = 99;

const DEFAULT_SUBJECTS: [(&str, &str); 19] = [
  ("AN", "Anatomy"),
  ("BI", "Biochemistry"),
  ("PY", "Physiology"),
  ("PA", "Pathology"),
  ("MI", "Microbiology"),
  ("PH", "Pharmacology"),
  ("FM", "Forensic Medicine"),
  ("CM", "Community Medicine"),
  ("IM", "General Medicine"),
  ("SU", "General Surgery"),
  ("OG", "Obstetrics and Gynaecology"),
  ("PE", "Paediatrics"),
  ("OR", "Orthopaedics"),
  ("EN", "Otorhinolaryngology (ENT)"),
  ("OP", "Ophthalmology"),
  ("PS", "Psychiatry"),
  ("DR", "Dermatology, Venereology & Leprosy"),
  ("RD", "Radiodiagnosis"),
  ("AS", "Anaesthesiology"),
];

/// The subjects every fresh catalog is seeded with, in display order.
pub fn default_subjects() -> Vec<NewSubject> {
  DEFAULT_SUBJECTS
    .iter()
    .zip(1..)
    .map(|((code, name), order)| NewSubject::new(*code, *name, order))
    .collect()
}

// ─── Topic ───────────────────────────────────────────────────────────────────

/// Second-level grouping; unique by (subject, name).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
  pub topic_id:      i64,
  pub subject_id:    i64,
  pub name:          String,
  pub display_order: i64,
}

// ─── Domain ──────────────────────────────────────────────────────────────────

/// Learning domain tag: Knowledge, Skill, Attitude, or a combination.
///
/// The string form (`"K"`, `"K/S"`, …) is what the store persists and what
/// filters compare against.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Default,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::AsRefStr,
  strum::IntoStaticStr,
  strum::EnumIter,
)]
pub enum Domain {
  #[default]
  #[serde(rename = "K")]
  #[strum(serialize = "K")]
  Knowledge,
  #[serde(rename = "S")]
  #[strum(serialize = "S")]
  Skill,
  #[serde(rename = "A")]
  #[strum(serialize = "A")]
  Attitude,
  #[serde(rename = "K/S")]
  #[strum(serialize = "K/S")]
  KnowledgeSkill,
  #[serde(rename = "K/A")]
  #[strum(serialize = "K/A")]
  KnowledgeAttitude,
  #[serde(rename = "S/A")]
  #[strum(serialize = "S/A")]
  SkillAttitude,
  #[serde(rename = "K/S/A")]
  #[strum(serialize = "K/S/A")]
  All,
}

impl Domain {
  /// Build a domain from the set of letters present.
  /// Returns `None` when none of K, S, A is present.
  pub fn from_letters(k: bool, s: bool, a: bool) -> Option<Self> {
    Some(match (k, s, a) {
      (true, true, true) => Self::All,
      (true, true, false) => Self::KnowledgeSkill,
      (true, false, true) => Self::KnowledgeAttitude,
      (false, true, true) => Self::SkillAttitude,
      (true, false, false) => Self::Knowledge,
      (false, true, false) => Self::Skill,
      (false, false, true) => Self::Attitude,
      (false, false, false) => return None,
    })
  }
}

// ─── Competency ──────────────────────────────────────────────────────────────

/// An atomic learning outcome, identified by a unique code such as `AN1.1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Competency {
  pub competency_id:      i64,
  pub code:               String,
  pub topic_id:           i64,
  pub text:               String,
  pub domain:             Domain,
  /// Expected level of attainment, e.g. "KH" or "SH". Free text.
  pub level:              String,
  pub is_core:            bool,
  pub teaching_methods:   Option<String>,
  pub assessment_methods: Option<String>,
  pub integrations:       Option<String>,
  pub created_at:         DateTime<Utc>,
  pub updated_at:         DateTime<Utc>,
  /// Set when soft-deleted. Deleted competencies are invisible to every read.
  pub deleted_at:         Option<DateTime<Utc>>,
}

impl Competency {
  pub fn is_deleted(&self) -> bool { self.deleted_at.is_some() }
}

/// A competency joined with the names of its topic and subject.
/// This is the row shape every read path and search result returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetencyDetails {
  #[serde(flatten)]
  pub competency:   Competency,
  pub topic_name:   String,
  pub subject_code: String,
  pub subject_name: String,
}

/// Input to [`crate::store::CatalogStore::create_competency`].
/// Timestamps are always set by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCompetency {
  pub code:               String,
  pub topic_id:           i64,
  pub text:               String,
  #[serde(default)]
  pub domain:             Domain,
  #[serde(default)]
  pub level:              String,
  #[serde(default)]
  pub is_core:            bool,
  pub teaching_methods:   Option<String>,
  pub assessment_methods: Option<String>,
  pub integrations:       Option<String>,
}

impl NewCompetency {
  /// Convenience constructor with all optional fields set to their defaults.
  pub fn new(code: impl Into<String>, topic_id: i64, text: impl Into<String>) -> Self {
    Self {
      code: code.into(),
      topic_id,
      text: text.into(),
      domain: Domain::default(),
      level: String::new(),
      is_core: false,
      teaching_methods: None,
      assessment_methods: None,
      integrations: None,
    }
  }
}

/// Partial update for [`crate::store::CatalogStore::update_competency`].
///
/// `None` leaves a field untouched. For the optional text fields an empty
/// string clears the stored value. The code is immutable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompetencyPatch {
  pub topic_id:           Option<i64>,
  pub text:               Option<String>,
  pub domain:             Option<Domain>,
  pub level:              Option<String>,
  pub is_core:            Option<bool>,
  pub teaching_methods:   Option<String>,
  pub assessment_methods: Option<String>,
  pub integrations:       Option<String>,
}

impl CompetencyPatch {
  pub fn is_empty(&self) -> bool {
    self.topic_id.is_none()
      && self.text.is_none()
      && self.domain.is_none()
      && self.level.is_none()
      && self.is_core.is_none()
      && self.teaching_methods.is_none()
      && self.assessment_methods.is_none()
      && self.integrations.is_none()
  }

  /// Apply this patch to `current` in place.
  pub fn apply(self, current: &mut Competency) {
    if let Some(topic_id) = self.topic_id {
      current.topic_id = topic_id;
    }
    if let Some(text) = self.text {
      current.text = text;
    }
    if let Some(domain) = self.domain {
      current.domain = domain;
    }
    if let Some(level) = self.level {
      current.level = level;
    }
    if let Some(is_core) = self.is_core {
      current.is_core = is_core;
    }
    if let Some(v) = self.teaching_methods {
      current.teaching_methods = non_empty(v);
    }
    if let Some(v) = self.assessment_methods {
      current.assessment_methods = non_empty(v);
    }
    if let Some(v) = self.integrations {
      current.integrations = non_empty(v);
    }
  }
}

fn non_empty(s: String) -> Option<String> {
  if s.is_empty() { None } else { Some(s) }
}

// ─── Listing ─────────────────────────────────────────────────────────────────

/// Parameters for the paginated admin listing.
#[derive(Debug, Clone, Deserialize)]
pub struct PageRequest {
  /// 1-based page number.
  #[serde(default = "PageRequest::first_page")]
  pub page:      usize,
  #[serde(default = "PageRequest::default_page_size")]
  pub page_size: usize,
  pub subject:   Option<String>,
  /// Substring matched against code or text (not the search index).
  pub search:    Option<String>,
}

impl PageRequest {
  fn first_page() -> usize { 1 }

  fn default_page_size() -> usize { 50 }

  /// Rows to skip, or `None` when `page` is so large the offset overflows.
  pub fn offset(&self) -> Option<usize> {
    self.page.saturating_sub(1).checked_mul(self.page_size)
  }

  /// Pages are 1-based and hold between 1 and [`MAX_LIMIT`] rows.
  pub fn validate(&self) -> Result<(), Error> {
    if self.page == 0 {
      return Err(Error::Validation("page must be positive".into()));
    }
    if self.page_size == 0 || self.page_size > MAX_LIMIT {
      return Err(Error::Validation(format!(
        "page_size must be between 1 and {MAX_LIMIT}, got {}",
        self.page_size
      )));
    }
    if self.offset().is_none_or(|o| i64::try_from(o).is_err()) {
      return Err(Error::Validation(format!("page {} is out of range", self.page)));
    }
    Ok(())
  }
}

impl Default for PageRequest {
  fn default() -> Self {
    Self {
      page:      Self::first_page(),
      page_size: Self::default_page_size(),
      subject:   None,
      search:    None,
    }
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
  pub data:        Vec<T>,
  pub total:       usize,
  pub page:        usize,
  pub page_size:   usize,
  pub total_pages: usize,
}

impl<T> Page<T> {
  pub fn new(data: Vec<T>, total: usize, request: &PageRequest) -> Self {
    let total_pages = if request.page_size == 0 {
      0
    } else {
      total.div_ceil(request.page_size)
    };
    Self { data, total, page: request.page, page_size: request.page_size, total_pages }
  }
}

/// Catalog-wide counts. Soft-deleted competencies are not counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogStats {
  pub subjects:         usize,
  pub topics:           usize,
  pub competencies:     usize,
  pub core_competencies: usize,
}

#[cfg(test)]
mod tests {
  use std::str::FromStr;

  use super::*;

  #[test]
  fn domain_string_round_trip() {
    use strum::IntoEnumIterator;
    for d in Domain::iter() {
      assert_eq!(Domain::from_str(d.as_ref()).unwrap(), d);
    }
    assert_eq!(Domain::KnowledgeSkill.to_string(), "K/S");
    assert!(Domain::from_str("X").is_err());
  }

  #[test]
  fn domain_serde_uses_codes() {
    let json = serde_json::to_string(&Domain::All).unwrap();
    assert_eq!(json, "\"K/S/A\"");
  }

  #[test]
  fn default_subjects_are_ordered() {
    let subjects = default_subjects();
    assert_eq!(subjects.len(), 19);
    assert_eq!(subjects[0].code, "AN");
    assert_eq!(subjects[0].display_order, 1);
    assert_eq!(subjects[18].code, "AS");
    assert_eq!(subjects[18].display_order, 19);
  }

  #[test]
  fn page_math() {
    let req = PageRequest { page: 3, page_size: 20, ..Default::default() };
    assert_eq!(req.offset(), Some(40));
    let page = Page::new(Vec::<()>::new(), 41, &req);
    assert_eq!(page.total_pages, 3);
  }

  #[test]
  fn oversized_pages_are_rejected_not_overflowed() {
    let huge = PageRequest { page: 3, page_size: usize::MAX, ..Default::default() };
    assert_eq!(huge.offset(), None);
    assert!(matches!(huge.validate(), Err(Error::Validation(_))));

    let far = PageRequest { page: usize::MAX, page_size: MAX_LIMIT, ..Default::default() };
    assert!(matches!(far.validate(), Err(Error::Validation(_))));

    for bad in [(0, 10), (1, 0), (1, MAX_LIMIT + 1)] {
      let req = PageRequest { page: bad.0, page_size: bad.1, ..Default::default() };
      assert!(req.validate().is_err(), "{bad:?}");
    }
    assert!(PageRequest { page: 2, page_size: MAX_LIMIT, ..Default::default() }.validate().is_ok());
  }

  #[test]
  fn patch_clears_optional_text_with_empty_string() {
    let now = Utc::now();
    let mut c = Competency {
      competency_id:      1,
      code:               "AN1.1".into(),
      topic_id:           1,
      text:               "old".into(),
      domain:             Domain::Knowledge,
      level:              "K".into(),
      is_core:            false,
      teaching_methods:   Some("Lecture".into()),
      assessment_methods: None,
      integrations:       None,
      created_at:         now,
      updated_at:         now,
      deleted_at:         None,
    };
    CompetencyPatch {
      text: Some("new".into()),
      teaching_methods: Some(String::new()),
      ..Default::default()
    }
    .apply(&mut c);
    assert_eq!(c.text, "new");
    assert_eq!(c.teaching_methods, None);
  }
}
