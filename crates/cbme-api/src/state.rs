//! Shared router state: one store per curriculum version plus admin gating.

use std::{collections::BTreeMap, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Public description of a curriculum version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
  pub id:          String,
  pub name:        String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub released_at: Option<String>,
}

impl VersionInfo {
  pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
    Self { id: id.into(), name: name.into(), description: None, released_at: None }
  }
}

/// The stores behind the API, keyed by version id.
pub struct Catalogs<S> {
  default:  String,
  versions: BTreeMap<String, (VersionInfo, Arc<S>)>,
}

impl<S> Catalogs<S> {
  /// An empty set whose default version is `default`. Add the default
  /// version with [`Catalogs::insert`] before serving.
  pub fn new(default: impl Into<String>) -> Self {
    Self { default: default.into(), versions: BTreeMap::new() }
  }

  /// A single unnamed version, for deployments that do not version the
  /// curriculum.
  pub fn single(store: Arc<S>) -> Self {
    let mut catalogs = Self::new("default");
    catalogs.insert(VersionInfo::new("default", "Default"), store);
    catalogs
  }

  pub fn insert(&mut self, info: VersionInfo, store: Arc<S>) {
    self.versions.insert(info.id.clone(), (info, store));
  }

  pub fn default_version(&self) -> &str { &self.default }

  pub fn infos(&self) -> impl Iterator<Item = &VersionInfo> {
    self.versions.values().map(|(info, _)| info)
  }

  pub fn stores(&self) -> impl Iterator<Item = (&VersionInfo, &Arc<S>)> {
    self.versions.values().map(|(info, store)| (info, store))
  }

  /// The store for `version`, or for the default version when `None`.
  pub fn resolve(&self, version: Option<&str>) -> Result<&Arc<S>, ApiError> {
    let id = version.filter(|v| !v.is_empty()).unwrap_or(&self.default);
    self
      .versions
      .get(id)
      .map(|(_, store)| store)
      .ok_or_else(|| ApiError::NotFound(format!("curriculum version {id} not found")))
  }
}

/// State shared by every handler.
pub struct AppState<S> {
  pub catalogs:      Arc<Catalogs<S>>,
  pub admin_enabled: bool,
}

impl<S> AppState<S> {
  pub fn new(catalogs: Catalogs<S>, admin_enabled: bool) -> Self {
    Self { catalogs: Arc::new(catalogs), admin_enabled }
  }

  pub fn store(&self, version: Option<&str>) -> Result<&Arc<S>, ApiError> {
    self.catalogs.resolve(version)
  }

  /// The store for an admin route; `Forbidden` unless admin is enabled.
  pub fn admin_store(&self, version: Option<&str>) -> Result<&Arc<S>, ApiError> {
    if !self.admin_enabled {
      return Err(ApiError::Forbidden("admin routes are disabled".into()));
    }
    self.store(version)
  }
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self { catalogs: Arc::clone(&self.catalogs), admin_enabled: self.admin_enabled }
  }
}

/// The `?version=` parameter every route accepts.
#[derive(Debug, Default, Deserialize)]
pub struct VersionParam {
  pub version: Option<String>,
}

impl VersionParam {
  pub fn as_deref(&self) -> Option<&str> { self.version.as_deref() }
}
