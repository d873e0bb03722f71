//! JSON REST API for the competency catalog.
//!
//! Exposes an axum [`Router`] backed by any [`cbme_core::store::CatalogStore`],
//! one store per curriculum version. Auth, TLS, and transport concerns are
//! the caller's responsibility; admin routes are only switched on or off.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", cbme_api::api_router(AppState::new(catalogs, false)))
//! ```

pub mod admin;
pub mod catalog;
pub mod error;
pub mod search;
pub mod state;
pub mod versions;

#[cfg(test)]
mod tests;

use axum::{
  Router,
  routing::{get, post},
};
use cbme_core::store::CatalogStore;

pub use error::ApiError;
pub use state::{AppState, Catalogs, VersionInfo};

/// Build a fully-materialised API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(state: AppState<S>) -> Router<()>
where
  S: CatalogStore + 'static,
{
  Router::new()
    // Search
    .route("/search", get(search::get::<S>).post(search::post::<S>))
    .route("/suggestions", get(search::suggestions::<S>))
    // Catalog
    .route("/subjects", get(catalog::subjects::<S>))
    .route("/subjects/{code}/topics", get(catalog::topics::<S>))
    .route("/topics/{id}/competencies", get(catalog::topic_competencies::<S>))
    .route("/competencies", get(catalog::by_codes::<S>))
    .route("/competencies/{code}", get(catalog::by_code::<S>))
    .route("/stats", get(catalog::stats::<S>))
    .route("/versions", get(versions::list::<S>))
    // Admin
    .route(
      "/admin/competencies",
      get(admin::list::<S>).post(admin::create::<S>),
    )
    .route(
      "/admin/competencies/{id}",
      get(admin::get_one::<S>)
        .put(admin::update::<S>)
        .delete(admin::delete::<S>),
    )
    .route("/admin/competencies/{id}/restore", post(admin::restore::<S>))
    .route("/admin/import", post(admin::import::<S>))
    .route("/admin/rebuild-index", post(admin::rebuild_index::<S>))
    .with_state(state)
}
