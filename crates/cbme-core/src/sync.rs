//! Keeps a [`TextIndex`] consistent with the record store.
//!
//! The store calls one of these operations for every competency mutation, on
//! the same transaction as the row write, so a committed state never has a
//! stale entry. Bulk writers may skip per-row calls provided they finish with
//! [`Synchronizer::rebuild_all`] before anyone queries the index.
//!
//! Invariant: a non-deleted competency has exactly one entry, carrying its
//! current topic and subject names; anything else has none.

use crate::{
  Error,
  index::{IndexEntry, TextIndex},
};

/// Borrowed handle over the index being maintained.
pub struct Synchronizer<'a, I> {
  index: &'a mut I,
}

impl<'a, I: TextIndex> Synchronizer<'a, I> {
  pub fn new(index: &'a mut I) -> Self { Self { index } }

  /// Index a newly created competency.
  pub fn on_create(&mut self, entry: &IndexEntry) -> Result<(), I::Error> {
    self.index.insert(entry)
  }

  /// Replace the entry for `entry.competency_id`.
  ///
  /// Delete-then-insert; the caller must run this inside the same atomic unit
  /// as the row update so no reader sees the gap. Afterwards exactly one entry
  /// must exist, otherwise [`Error::Consistency`] is returned and the caller
  /// should roll back and schedule a rebuild.
  pub fn on_update(&mut self, entry: &IndexEntry) -> Result<(), I::Error> {
    self.index.remove(entry.competency_id)?;
    self.index.insert(entry)?;
    self.verify(entry.competency_id, 1)
  }

  /// Drop the entry for `competency_id`. Removing an absent entry is a no-op.
  pub fn on_delete(&mut self, competency_id: i64) -> Result<(), I::Error> {
    self.index.remove(competency_id)?;
    self.verify(competency_id, 0)
  }

  /// Clear the index and re-insert one entry per row of `entries`, which
  /// must be the current non-deleted competencies. Returns the entry count.
  pub fn rebuild_all<E>(&mut self, entries: E) -> Result<usize, I::Error>
  where
    E: IntoIterator<Item = IndexEntry>,
  {
    self.index.clear()?;
    let mut written = 0;
    for entry in entries {
      self.index.insert(&entry)?;
      written += 1;
    }
    Ok(written)
  }

  fn verify(&self, competency_id: i64, expected: usize) -> Result<(), I::Error> {
    let entries = self.index.entry_count(competency_id)?;
    if entries != expected {
      return Err(Error::Consistency { competency_id, entries }.into());
    }
    Ok(())
  }
}
