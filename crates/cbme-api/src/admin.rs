//! Handlers for `/admin` endpoints. All answer 403 unless admin is enabled.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/admin/competencies` | `?page&page_size&subject&search` |
//! | `POST`   | `/admin/competencies` | Body: [`NewCompetency`]; returns 201 |
//! | `GET`    | `/admin/competencies/{id}` | 404 if missing or deleted |
//! | `PUT`    | `/admin/competencies/{id}` | Body: [`CompetencyPatch`] |
//! | `DELETE` | `/admin/competencies/{id}` | Soft delete; 204 |
//! | `POST`   | `/admin/competencies/{id}/restore` | |
//! | `POST`   | `/admin/import` | Body: list of [`ImportBatch`] |
//! | `POST`   | `/admin/rebuild-index` | |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use cbme_core::{
  import::{ImportBatch, ImportReport, RowError},
  model::{CompetencyDetails, CompetencyPatch, NewCompetency, Page, PageRequest},
  store::CatalogStore,
};
use serde::Serialize;

use crate::{
  error::ApiError,
  state::{AppState, VersionParam},
};

// ─── Competencies ─────────────────────────────────────────────────────────────

/// `GET /admin/competencies`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  Query(version): Query<VersionParam>,
  Query(page): Query<PageRequest>,
) -> Result<Json<Page<CompetencyDetails>>, ApiError>
where
  S: CatalogStore,
{
  let store = state.admin_store(version.as_deref())?;
  page.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
  let page = store.list_competencies(&page).await.map_err(ApiError::store)?;
  Ok(Json(page))
}

/// `POST /admin/competencies`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  Query(version): Query<VersionParam>,
  Json(body): Json<NewCompetency>,
) -> Result<impl IntoResponse, ApiError>
where
  S: CatalogStore,
{
  let store = state.admin_store(version.as_deref())?;
  if body.code.trim().is_empty() || body.text.trim().is_empty() {
    return Err(ApiError::BadRequest("code and text are required".into()));
  }
  let created = store
    .create_competency(body)
    .await
    .map_err(ApiError::store)?;
  tracing::info!(code = %created.competency.code, "competency created");
  Ok((StatusCode::CREATED, Json(created)))
}

/// `GET /admin/competencies/{id}`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<i64>,
  Query(version): Query<VersionParam>,
) -> Result<Json<CompetencyDetails>, ApiError>
where
  S: CatalogStore,
{
  let store = state.admin_store(version.as_deref())?;
  let competency = store
    .get_competency(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("competency {id} not found")))?;
  Ok(Json(competency))
}

/// `PUT /admin/competencies/{id}`
pub async fn update<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<i64>,
  Query(version): Query<VersionParam>,
  Json(patch): Json<CompetencyPatch>,
) -> Result<Json<CompetencyDetails>, ApiError>
where
  S: CatalogStore,
{
  let store = state.admin_store(version.as_deref())?;
  let updated = store
    .update_competency(id, patch)
    .await
    .map_err(ApiError::store)?;
  tracing::info!(id, code = %updated.competency.code, "competency updated");
  Ok(Json(updated))
}

/// `DELETE /admin/competencies/{id}`
pub async fn delete<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<i64>,
  Query(version): Query<VersionParam>,
) -> Result<StatusCode, ApiError>
where
  S: CatalogStore,
{
  let store = state.admin_store(version.as_deref())?;
  store.delete_competency(id).await.map_err(ApiError::store)?;
  tracing::info!(id, "competency deleted");
  Ok(StatusCode::NO_CONTENT)
}

/// `POST /admin/competencies/{id}/restore`
pub async fn restore<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<i64>,
  Query(version): Query<VersionParam>,
) -> Result<Json<CompetencyDetails>, ApiError>
where
  S: CatalogStore,
{
  let store = state.admin_store(version.as_deref())?;
  let restored = store
    .restore_competency(id)
    .await
    .map_err(ApiError::store)?;
  tracing::info!(id, "competency restored");
  Ok(Json(restored))
}

// ─── Import & index ───────────────────────────────────────────────────────────

/// `POST /admin/import`
///
/// Each batch is applied on its own transaction. A batch that fails as a
/// whole is reported as a row-0 error and does not stop the others.
pub async fn import<S>(
  State(state): State<AppState<S>>,
  Query(version): Query<VersionParam>,
  Json(batches): Json<Vec<ImportBatch>>,
) -> Result<Json<ImportReport>, ApiError>
where
  S: CatalogStore,
{
  let store = state.admin_store(version.as_deref())?;
  if batches.is_empty() {
    return Err(ApiError::BadRequest("no import batches given".into()));
  }

  let mut total = ImportReport { success: true, ..Default::default() };
  for batch in batches {
    let label = batch.subject_code.clone();
    match store.import_batch(batch).await {
      Ok(report) => total.merge(&label, report),
      Err(e) => {
        tracing::warn!(subject = %label, error = %e, "import batch failed");
        total.errors.push(RowError { row: 0, error: format!("{label}: {e}") });
        total.success = false;
      }
    }
  }
  Ok(Json(total))
}

#[derive(Debug, Serialize)]
pub struct RebuildReport {
  pub indexed: usize,
}

/// `POST /admin/rebuild-index`
pub async fn rebuild_index<S>(
  State(state): State<AppState<S>>,
  Query(version): Query<VersionParam>,
) -> Result<Json<RebuildReport>, ApiError>
where
  S: CatalogStore,
{
  let store = state.admin_store(version.as_deref())?;
  let indexed = store.rebuild_index().await.map_err(ApiError::store)?;
  Ok(Json(RebuildReport { indexed }))
}
