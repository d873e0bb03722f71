//! Read-only catalog browsing.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/subjects` | Ordered by display order |
//! | `GET`  | `/subjects/{code}/topics` | 404 if the subject is unknown |
//! | `GET`  | `/topics/{id}/competencies` | |
//! | `GET`  | `/competencies` | `?codes=AN1.1,AN1.2` required |
//! | `GET`  | `/competencies/{code}` | 404 if not found |
//! | `GET`  | `/stats` | |

use axum::{
  Json,
  extract::{Path, Query, State},
};
use cbme_core::{
  model::{CatalogStats, CompetencyDetails, Subject, Topic},
  store::CatalogStore,
};
use serde::Deserialize;

use crate::{
  error::ApiError,
  state::{AppState, VersionParam},
};

/// `GET /subjects`
pub async fn subjects<S>(
  State(state): State<AppState<S>>,
  Query(version): Query<VersionParam>,
) -> Result<Json<Vec<Subject>>, ApiError>
where
  S: CatalogStore,
{
  let store = state.store(version.as_deref())?;
  let subjects = store.list_subjects().await.map_err(ApiError::store)?;
  Ok(Json(subjects))
}

/// `GET /subjects/{code}/topics`
pub async fn topics<S>(
  State(state): State<AppState<S>>,
  Path(code): Path<String>,
  Query(version): Query<VersionParam>,
) -> Result<Json<Vec<Topic>>, ApiError>
where
  S: CatalogStore,
{
  let store = state.store(version.as_deref())?;
  store
    .get_subject(&code)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("subject {code} not found")))?;
  let topics = store.list_topics(&code).await.map_err(ApiError::store)?;
  Ok(Json(topics))
}

/// `GET /topics/{id}/competencies`
pub async fn topic_competencies<S>(
  State(state): State<AppState<S>>,
  Path(topic_id): Path<i64>,
  Query(version): Query<VersionParam>,
) -> Result<Json<Vec<CompetencyDetails>>, ApiError>
where
  S: CatalogStore,
{
  let store = state.store(version.as_deref())?;
  let competencies = store
    .list_competencies_by_topic(topic_id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(competencies))
}

#[derive(Debug, Deserialize)]
pub struct CodesParams {
  pub codes:   Option<String>,
  pub version: Option<String>,
}

/// `GET /competencies?codes=AN1.1,AN1.2`
pub async fn by_codes<S>(
  State(state): State<AppState<S>>,
  Query(params): Query<CodesParams>,
) -> Result<Json<Vec<CompetencyDetails>>, ApiError>
where
  S: CatalogStore,
{
  let store = state.store(params.version.as_deref())?;
  let codes: Vec<String> = params
    .codes
    .as_deref()
    .ok_or_else(|| ApiError::BadRequest("missing codes parameter".into()))?
    .split(',')
    .map(str::trim)
    .filter(|c| !c.is_empty())
    .map(str::to_owned)
    .collect();
  let competencies = store
    .get_competencies_by_codes(&codes)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(competencies))
}

/// `GET /competencies/{code}`
pub async fn by_code<S>(
  State(state): State<AppState<S>>,
  Path(code): Path<String>,
  Query(version): Query<VersionParam>,
) -> Result<Json<CompetencyDetails>, ApiError>
where
  S: CatalogStore,
{
  let store = state.store(version.as_deref())?;
  let competency = store
    .get_competency_by_code(&code)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("competency {code} not found")))?;
  Ok(Json(competency))
}

/// `GET /stats`
pub async fn stats<S>(
  State(state): State<AppState<S>>,
  Query(version): Query<VersionParam>,
) -> Result<Json<CatalogStats>, ApiError>
where
  S: CatalogStore,
{
  let store = state.store(version.as_deref())?;
  Ok(Json(store.stats().await.map_err(ApiError::store)?))
}
