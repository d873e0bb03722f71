//! Handler for `GET /versions`.

use axum::{Json, extract::State};
use cbme_core::store::CatalogStore;
use serde::Serialize;

use crate::state::{AppState, VersionInfo};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionList {
  pub versions:        Vec<VersionInfo>,
  pub default_version: String,
  /// Whether clients should offer a version picker at all.
  pub show_selector:   bool,
}

/// `GET /versions`
pub async fn list<S>(State(state): State<AppState<S>>) -> Json<VersionList>
where
  S: CatalogStore,
{
  let versions: Vec<VersionInfo> = state.catalogs.infos().cloned().collect();
  Json(VersionList {
    show_selector: versions.len() > 1,
    default_version: state.catalogs.default_version().to_owned(),
    versions,
  })
}
