//! Error type for `cbme-store-sqlite`.

use cbme_core::{Classify, ErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] cbme_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),
}

impl Classify for Error {
  fn kind(&self) -> ErrorKind {
    match self {
      Error::Core(e) => e.kind(),
      Error::Database(_) | Error::Sqlite(_) | Error::DateParse(_) => ErrorKind::Storage,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
