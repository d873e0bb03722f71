//! Server wiring for the competency catalog: configuration, opening one
//! store per curriculum version, and the top-level router.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::Router;
use cbme_api::{AppState, Catalogs, VersionInfo, api_router};
use cbme_core::{model::default_subjects, store::CatalogStore as _};
use cbme_store_sqlite::SqliteStore;
use serde::Deserialize;
use thiserror::Error;
use tower_http::trace::TraceLayer;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `CBME__*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "ServerConfig::default_host")]
  pub host:            String,
  #[serde(default = "ServerConfig::default_port")]
  pub port:            u16,
  #[serde(default)]
  pub admin_enabled:   bool,
  #[serde(default = "ServerConfig::default_version_id")]
  pub default_version: String,
  #[serde(default = "ServerConfig::default_versions")]
  pub versions:        Vec<VersionConfig>,
}

impl ServerConfig {
  fn default_host() -> String { "127.0.0.1".into() }

  fn default_port() -> u16 { 3000 }

  fn default_version_id() -> String { "default".into() }

  fn default_versions() -> Vec<VersionConfig> {
    vec![VersionConfig {
      id:          Self::default_version_id(),
      name:        "Default".into(),
      store_path:  PathBuf::from("cbme.db"),
      description: None,
      released_at: None,
    }]
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

/// One curriculum version and the SQLite file holding it.
#[derive(Debug, Deserialize, Clone)]
pub struct VersionConfig {
  pub id:          String,
  pub name:        String,
  pub store_path:  PathBuf,
  pub description: Option<String>,
  pub released_at: Option<String>,
}

impl From<&VersionConfig> for VersionInfo {
  fn from(v: &VersionConfig) -> Self {
    VersionInfo {
      id:          v.id.clone(),
      name:        v.name.clone(),
      description: v.description.clone(),
      released_at: v.released_at.clone(),
    }
  }
}

// ─── Errors ───────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum Error {
  #[error("no curriculum versions configured")]
  NoVersions,

  #[error("default version {0:?} is not among the configured versions")]
  UnknownDefaultVersion(String),

  #[error("duplicate version id {0:?}")]
  DuplicateVersion(String),

  #[error("version {version}: {source}")]
  Store {
    version: String,
    #[source]
    source:  cbme_store_sqlite::Error,
  },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

// ─── Stores ───────────────────────────────────────────────────────────────────

/// Open every configured version's store, creating its schema and seeding
/// the default subjects.
pub async fn open_catalogs(config: &ServerConfig) -> Result<Catalogs<SqliteStore>> {
  if config.versions.is_empty() {
    return Err(Error::NoVersions);
  }
  if !config.versions.iter().any(|v| v.id == config.default_version) {
    return Err(Error::UnknownDefaultVersion(config.default_version.clone()));
  }

  let mut catalogs = Catalogs::new(config.default_version.clone());
  let mut seen = Vec::new();
  for version in &config.versions {
    if seen.contains(&version.id) {
      return Err(Error::DuplicateVersion(version.id.clone()));
    }
    seen.push(version.id.clone());

    let store_err = |source: cbme_store_sqlite::Error| Error::Store {
      version: version.id.clone(),
      source,
    };
    let path = expand_tilde(&version.store_path);
    let store = SqliteStore::open(&path).await.map_err(store_err)?;
    let seeded = store
      .seed_subjects(default_subjects())
      .await
      .map_err(store_err)?;
    tracing::info!(version = %version.id, path = %path.display(), seeded, "store opened");

    catalogs.insert(version.into(), Arc::new(store));
  }
  Ok(catalogs)
}

/// Rebuild the search index of every version; returns the total number of
/// entries written.
pub async fn rebuild_all(catalogs: &Catalogs<SqliteStore>) -> Result<usize> {
  let mut total = 0;
  for (info, store) in catalogs.stores() {
    let written = store.rebuild_index().await.map_err(|source| Error::Store {
      version: info.id.clone(),
      source,
    })?;
    tracing::info!(version = %info.id, entries = written, "index rebuilt");
    total += written;
  }
  Ok(total)
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// The API nested under `/api`, with request tracing.
pub fn router(catalogs: Catalogs<SqliteStore>, admin_enabled: bool) -> Router {
  Router::new()
    .nest("/api", api_router(AppState::new(catalogs, admin_enabled)))
    .layer(TraceLayer::new_for_http())
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use axum::{
    body::{Body, to_bytes},
    http::{Request, StatusCode},
  };
  use tower::ServiceExt as _;

  use super::*;

  fn parse(toml: &str) -> ServerConfig {
    config::Config::builder()
      .add_source(config::File::from_str(toml, config::FileFormat::Toml))
      .build()
      .unwrap()
      .try_deserialize()
      .unwrap()
  }

  fn memory_version(id: &str) -> VersionConfig {
    VersionConfig {
      id:          id.into(),
      name:        id.into(),
      store_path:  PathBuf::from(":memory:"),
      description: None,
      released_at: None,
    }
  }

  #[test]
  fn defaults_fill_an_empty_config() {
    let cfg = parse("");
    assert_eq!(cfg.address(), "127.0.0.1:3000");
    assert!(!cfg.admin_enabled);
    assert_eq!(cfg.default_version, "default");
    assert_eq!(cfg.versions.len(), 1);
  }

  #[test]
  fn versions_from_toml() {
    let cfg = parse(
      r#"
      port = 8080
      admin_enabled = true
      default_version = "2024"

      [[versions]]
      id = "2019"
      name = "CBME 2019"
      store_path = "~/cbme/2019.db"

      [[versions]]
      id = "2024"
      name = "CBME 2024"
      store_path = "/var/lib/cbme/2024.db"
      released_at = "2024-08-01"
      "#,
    );
    assert_eq!(cfg.port, 8080);
    assert!(cfg.admin_enabled);
    assert_eq!(cfg.versions[1].released_at.as_deref(), Some("2024-08-01"));
  }

  #[test]
  fn tilde_expansion() {
    let plain = Path::new("/tmp/cbme.db");
    assert_eq!(expand_tilde(plain), plain);
    if let Ok(home) = std::env::var("HOME") {
      assert_eq!(expand_tilde(Path::new("~/x.db")), PathBuf::from(home).join("x.db"));
    }
  }

  #[tokio::test]
  async fn default_version_must_be_configured() {
    let cfg = ServerConfig {
      host:            "127.0.0.1".into(),
      port:            0,
      admin_enabled:   false,
      default_version: "2030".into(),
      versions:        vec![memory_version("2024")],
    };
    assert!(matches!(open_catalogs(&cfg).await, Err(Error::UnknownDefaultVersion(_))));

    let cfg = ServerConfig { versions: vec![], ..cfg };
    assert!(matches!(open_catalogs(&cfg).await, Err(Error::NoVersions)));
  }

  #[tokio::test]
  async fn opened_stores_are_seeded_and_served() {
    let cfg = ServerConfig {
      host:            "127.0.0.1".into(),
      port:            0,
      admin_enabled:   false,
      default_version: "2024".into(),
      versions:        vec![memory_version("2019"), memory_version("2024")],
    };
    let catalogs = open_catalogs(&cfg).await.unwrap();
    assert_eq!(rebuild_all(&catalogs).await.unwrap(), 0);

    let app = router(catalogs, false);
    let response = app
      .oneshot(
        Request::builder()
          .uri("/api/subjects?version=2019")
          .body(Body::empty())
          .unwrap(),
      )
      .await
      .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let subjects: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(subjects.as_array().unwrap().len(), 19);
  }
}
