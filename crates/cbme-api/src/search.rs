//! Handlers for `/search` and `/suggestions`.
//!
//! `subject` and `domain` are accepted as comma-separated strings on `GET`.
//! Queries shorter than two characters return the empty result, never a 400.

use axum::{
  Json,
  extract::{Query, State},
};
use cbme_core::{
  group::GroupedResults,
  query::{DEFAULT_LIMIT, DEFAULT_SUGGESTION_LIMIT, MAX_LIMIT, SearchFilters, SearchRequest},
  store::CatalogStore,
};
use serde::{Deserialize, Serialize};

use crate::{
  error::ApiError,
  state::{AppState, VersionParam},
};

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
  #[serde(alias = "query")]
  pub q:         Option<String>,
  /// Comma-separated subject codes, e.g. `AN,PY`.
  pub subject:   Option<String>,
  /// Comma-separated domain codes, e.g. `K,K/S`.
  pub domain:    Option<String>,
  #[serde(default)]
  pub core_only: bool,
  pub limit:     Option<String>,
  pub version:   Option<String>,
}

fn split_codes(raw: Option<String>) -> Vec<String> {
  raw
    .map(|s| {
      s.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
        .collect()
    })
    .unwrap_or_default()
}

/// Parse a `limit` parameter; anything but a positive integer is a 400.
pub(crate) fn parse_limit(raw: Option<&str>, default: usize) -> Result<usize, ApiError> {
  match raw {
    None => Ok(default),
    Some(s) => match s.trim().parse::<usize>() {
      Ok(n) if n > 0 => Ok(n),
      _ => Err(ApiError::BadRequest(format!("limit must be a positive integer, got {s:?}"))),
    },
  }
}

async fn run<S: CatalogStore>(
  store: &S,
  request: SearchRequest,
) -> Result<GroupedResults, ApiError> {
  store.search(&request).await.map_err(ApiError::search_failed)
}

/// `GET /search?q=...[&subject=AN,PY][&domain=K][&coreOnly=true][&limit=50]`
pub async fn get<S>(
  State(state): State<AppState<S>>,
  Query(params): Query<SearchParams>,
) -> Result<Json<GroupedResults>, ApiError>
where
  S: CatalogStore,
{
  let store = state.store(params.version.as_deref())?;
  let limit = parse_limit(params.limit.as_deref(), DEFAULT_LIMIT)?;
  let filters = SearchFilters {
    subject:   split_codes(params.subject),
    domain:    split_codes(params.domain),
    core_only: params.core_only,
  };
  let request = SearchRequest::new(params.q.unwrap_or_default())
    .with_filters(filters)
    .with_limit(limit);

  Ok(Json(run(store.as_ref(), request).await?))
}

/// `POST /search`, body: `{"query":"...","filters":{...},"limit":50}`
pub async fn post<S>(
  State(state): State<AppState<S>>,
  Query(version): Query<VersionParam>,
  Json(request): Json<SearchRequest>,
) -> Result<Json<GroupedResults>, ApiError>
where
  S: CatalogStore,
{
  let store = state.store(version.as_deref())?;
  if request.limit == 0 {
    return Err(ApiError::BadRequest("limit must be a positive integer".into()));
  }
  Ok(Json(run(store.as_ref(), request).await?))
}

#[derive(Debug, Deserialize, Default)]
pub struct SuggestionParams {
  #[serde(alias = "query")]
  pub q:       Option<String>,
  pub limit:   Option<String>,
  pub version: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Suggestions {
  pub query:       String,
  pub suggestions: Vec<String>,
}

/// `GET /suggestions?q=...[&limit=10]`; `limit` is capped at [`MAX_LIMIT`].
pub async fn suggestions<S>(
  State(state): State<AppState<S>>,
  Query(params): Query<SuggestionParams>,
) -> Result<Json<Suggestions>, ApiError>
where
  S: CatalogStore,
{
  let store = state.store(params.version.as_deref())?;
  let limit = parse_limit(params.limit.as_deref(), DEFAULT_SUGGESTION_LIMIT)?.min(MAX_LIMIT);
  let query = params.q.unwrap_or_default();
  let suggestions = store
    .suggestions(&query, limit)
    .await
    .map_err(ApiError::search_failed)?;
  Ok(Json(Suggestions { query, suggestions }))
}
