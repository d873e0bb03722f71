//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use cbme_core::{Classify, ErrorKind};
use serde_json::json;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("forbidden: {0}")]
  Forbidden(String),

  /// A store failure, classified so the response status follows the
  /// store's error kind.
  #[error("store error: {source}")]
  Store {
    kind:   ErrorKind,
    #[source]
    source: BoxError,
  },

  /// Any failure while searching. The detail is logged, never returned.
  #[error("search failed: {0}")]
  SearchFailed(#[source] BoxError),
}

impl ApiError {
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Classify + Send + Sync + 'static,
  {
    ApiError::Store { kind: e.kind(), source: Box::new(e) }
  }

  pub fn search_failed<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    ApiError::SearchFailed(Box::new(e))
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Forbidden(m) => (StatusCode::FORBIDDEN, m.clone()),
      ApiError::Store { kind, source } => {
        let status = match kind {
          ErrorKind::Validation => StatusCode::BAD_REQUEST,
          ErrorKind::NotFound => StatusCode::NOT_FOUND,
          ErrorKind::Conflict => StatusCode::CONFLICT,
          ErrorKind::Consistency | ErrorKind::Storage => {
            tracing::error!(error = %source, ?kind, "store failure");
            StatusCode::INTERNAL_SERVER_ERROR
          }
        };
        (status, source.to_string())
      }
      ApiError::SearchFailed(e) => {
        tracing::error!(error = %e, "search failed");
        (StatusCode::INTERNAL_SERVER_ERROR, "search failed".to_owned())
      }
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
