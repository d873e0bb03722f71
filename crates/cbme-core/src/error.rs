//! Error types for `cbme-core`.

use thiserror::Error;

/// Coarse classification shared by every catalog error type.
///
/// Higher layers (the HTTP API) decide how to surface a failure from its
/// kind alone, without knowing which backend produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  /// Malformed input; rejected before reaching storage.
  Validation,
  /// A referenced subject, topic or competency does not exist.
  NotFound,
  /// The write would violate a uniqueness rule.
  Conflict,
  /// The search index holds other than zero or one entry for an identity.
  Consistency,
  /// The backing store failed.
  Storage,
}

/// Implemented by every error type a [`crate::store::CatalogStore`] returns.
pub trait Classify {
  fn kind(&self) -> ErrorKind;
}

#[derive(Debug, Error)]
pub enum Error {
  #[error("validation error: {0}")]
  Validation(String),

  #[error("subject not found: {0}")]
  SubjectNotFound(String),

  #[error("topic not found: {0}")]
  TopicNotFound(i64),

  #[error("competency not found: {0}")]
  CompetencyNotFound(i64),

  #[error("competency code already exists: {0}")]
  DuplicateCode(String),

  #[error("subject code already exists: {0}")]
  DuplicateSubject(String),

  #[error("search index holds {entries} entries for competency {competency_id}")]
  Consistency { competency_id: i64, entries: usize },

  #[error("unknown domain code: {0:?}")]
  UnknownDomain(String),
}

impl Classify for Error {
  fn kind(&self) -> ErrorKind {
    match self {
      Self::Validation(_) => ErrorKind::Validation,
      Self::SubjectNotFound(_)
      | Self::TopicNotFound(_)
      | Self::CompetencyNotFound(_) => ErrorKind::NotFound,
      Self::DuplicateCode(_) | Self::DuplicateSubject(_) => ErrorKind::Conflict,
      Self::Consistency { .. } => ErrorKind::Consistency,
      Self::UnknownDomain(_) => ErrorKind::Storage,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
