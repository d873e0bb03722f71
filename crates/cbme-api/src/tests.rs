//! Router tests driving the API against in-memory SQLite stores.

use std::sync::Arc;

use axum::{
  Router,
  body::{Body, to_bytes},
  http::{Method, Request, StatusCode},
};
use cbme_core::{
  model::{NewCompetency, default_subjects},
  store::CatalogStore,
};
use cbme_store_sqlite::SqliteStore;
use serde_json::{Value, json};
use tower::ServiceExt as _;

use crate::{AppState, Catalogs, VersionInfo, api_router};

async fn fixture_store() -> SqliteStore {
  let s = SqliteStore::open_in_memory().await.unwrap();
  s.seed_subjects(default_subjects()).await.unwrap();
  let an = s.get_subject("AN").await.unwrap().unwrap();
  let py = s.get_subject("PY").await.unwrap().unwrap();
  let heart = s
    .ensure_topic(an.subject_id, "Cardiovascular system".into())
    .await
    .unwrap();
  let physio = s
    .ensure_topic(py.subject_id, "Cardiac physiology".into())
    .await
    .unwrap();

  let mut core = NewCompetency::new("AN1.1", heart.topic_id, "Describe the anatomy of the heart");
  core.is_core = true;
  s.create_competency(core).await.unwrap();
  s.create_competency(NewCompetency::new("PY1.1", physio.topic_id, "Explain the cardiac cycle"))
    .await
    .unwrap();
  s
}

async fn app(admin_enabled: bool) -> Router {
  let store = fixture_store().await;
  api_router(AppState::new(Catalogs::single(Arc::new(store)), admin_enabled))
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
  let builder = Request::builder().method(method).uri(uri);
  let request = match body {
    Some(json) => builder
      .header("content-type", "application/json")
      .body(Body::from(json.to_string()))
      .unwrap(),
    None => builder.body(Body::empty()).unwrap(),
  };
  let response = app.clone().oneshot(request).await.unwrap();
  let status = response.status();
  let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
  let value = if bytes.is_empty() {
    Value::Null
  } else {
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
  };
  (status, value)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
  send(app, Method::GET, uri, None).await
}

// ─── Search ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn search_groups_by_subject() {
  let app = app(false).await;
  let (status, body) = get(&app, "/search?q=cardi").await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["query"], "cardi");
  assert_eq!(body["total"], 2);
  assert_eq!(body["groups"].as_array().unwrap().len(), 2);
  assert!(body["groups"][0]["subject"]["code"].is_string());
}

#[tokio::test]
async fn search_accepts_query_alias_and_filters() {
  let app = app(false).await;
  let (status, body) = get(&app, "/search?query=cardi&subject=AN&coreOnly=true").await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["total"], 1);
  assert_eq!(body["groups"][0]["subject"]["code"], "AN");

  let (_, body) = get(&app, "/search?q=cardi&domain=K/S").await;
  assert_eq!(body["total"], 0);

  let (_, body) = get(&app, "/search?q=cardi&subject=AN,PY").await;
  assert_eq!(body["total"], 2);
}

#[tokio::test]
async fn short_query_is_empty_not_an_error() {
  let app = app(false).await;
  let (status, body) = get(&app, "/search?q=a").await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body, json!({ "query": "a", "total": 0, "groups": [] }));

  let (status, body) = get(&app, "/search").await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["total"], 0);
}

#[tokio::test]
async fn bad_limit_is_rejected() {
  let app = app(false).await;
  for uri in ["/search?q=heart&limit=0", "/search?q=heart&limit=abc"] {
    let (status, body) = get(&app, uri).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
    assert!(body["error"].is_string());
  }
  let (status, body) = get(&app, "/search?q=cardi&limit=1").await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["total"], 1);
}

#[tokio::test]
async fn search_by_post() {
  let app = app(false).await;
  let (status, body) = send(
    &app,
    Method::POST,
    "/search",
    Some(json!({ "query": "heart", "filters": { "subject": ["AN"] } })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["total"], 1);
  assert_eq!(body["groups"][0]["competencies"][0]["code"], "AN1.1");
}

#[tokio::test]
async fn suggestions_return_codes() {
  let app = app(false).await;
  let (status, body) = get(&app, "/suggestions?q=anat").await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["suggestions"], json!(["AN1.1"]));
}

#[tokio::test]
async fn huge_suggestion_limit_is_capped() {
  let app = app(false).await;
  let (status, body) = get(&app, "/suggestions?q=cardi&limit=18446744073709551615").await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["suggestions"].as_array().unwrap().len(), 2);
}

// ─── Catalog ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn browse_subjects_topics_and_competencies() {
  let app = app(false).await;

  let (status, subjects) = get(&app, "/subjects").await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(subjects.as_array().unwrap().len(), 19);

  let (_, topics) = get(&app, "/subjects/AN/topics").await;
  assert_eq!(topics[0]["name"], "Cardiovascular system");
  let topic_id = topics[0]["topic_id"].as_i64().unwrap();

  let (_, competencies) = get(&app, &format!("/topics/{topic_id}/competencies")).await;
  assert_eq!(competencies[0]["code"], "AN1.1");

  let (status, _) = get(&app, "/subjects/ZZ/topics").await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn competency_lookups() {
  let app = app(false).await;

  let (status, one) = get(&app, "/competencies/PY1.1").await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(one["subject_code"], "PY");
  assert_eq!(one["domain"], "K");

  let (status, _) = get(&app, "/competencies/ZZ9.9").await;
  assert_eq!(status, StatusCode::NOT_FOUND);

  let (_, many) = get(&app, "/competencies?codes=PY1.1,AN1.1").await;
  assert_eq!(many.as_array().unwrap().len(), 2);

  let (status, _) = get(&app, "/competencies").await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn stats_and_versions() {
  let app = app(false).await;
  let (_, stats) = get(&app, "/stats").await;
  assert_eq!(stats["competencies"], 2);
  assert_eq!(stats["core_competencies"], 1);

  let (_, versions) = get(&app, "/versions").await;
  assert_eq!(versions["defaultVersion"], "default");
  assert_eq!(versions["showSelector"], false);
}

#[tokio::test]
async fn unknown_version_is_not_found() {
  let app = app(false).await;
  let (status, _) = get(&app, "/search?q=heart&version=1997").await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn versions_route_to_their_own_store() {
  let old = SqliteStore::open_in_memory().await.unwrap();
  let mut catalogs = Catalogs::new("2024");
  catalogs.insert(VersionInfo::new("2019", "CBME 2019"), Arc::new(old));
  catalogs.insert(VersionInfo::new("2024", "CBME 2024"), Arc::new(fixture_store().await));
  let app = api_router(AppState::new(catalogs, false));

  let (_, current) = get(&app, "/search?q=heart").await;
  assert_eq!(current["total"], 1);
  let (_, previous) = get(&app, "/search?q=heart&version=2019").await;
  assert_eq!(previous["total"], 0);

  let (_, versions) = get(&app, "/versions").await;
  assert_eq!(versions["showSelector"], true);
  assert_eq!(versions["versions"].as_array().unwrap().len(), 2);
}

// ─── Admin ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn admin_is_forbidden_when_disabled() {
  let app = app(false).await;
  let (status, _) = get(&app, "/admin/competencies").await;
  assert_eq!(status, StatusCode::FORBIDDEN);
  let (status, _) = send(&app, Method::POST, "/admin/rebuild-index", None).await;
  assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_crud_keeps_search_in_step() {
  let app = app(true).await;
  let (_, topics) = get(&app, "/subjects/AN/topics").await;
  let topic_id = topics[0]["topic_id"].as_i64().unwrap();

  let (status, created) = send(
    &app,
    Method::POST,
    "/admin/competencies",
    Some(json!({ "code": "AN1.2", "topic_id": topic_id, "text": "Describe the pericardium" })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);
  let id = created["competency_id"].as_i64().unwrap();
  assert_eq!(get(&app, "/search?q=pericard").await.1["total"], 1);

  let (status, _) = send(
    &app,
    Method::POST,
    "/admin/competencies",
    Some(json!({ "code": "AN1.2", "topic_id": topic_id, "text": "Again" })),
  )
  .await;
  assert_eq!(status, StatusCode::CONFLICT);

  let (status, updated) = send(
    &app,
    Method::PUT,
    &format!("/admin/competencies/{id}"),
    Some(json!({ "text": "Describe the mediastinum" })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(updated["text"], "Describe the mediastinum");
  assert_eq!(get(&app, "/search?q=pericard").await.1["total"], 0);
  assert_eq!(get(&app, "/search?q=mediast").await.1["total"], 1);

  let (status, _) = send(&app, Method::DELETE, &format!("/admin/competencies/{id}"), None).await;
  assert_eq!(status, StatusCode::NO_CONTENT);
  assert_eq!(get(&app, "/search?q=mediast").await.1["total"], 0);
  let (status, _) = get(&app, &format!("/admin/competencies/{id}")).await;
  assert_eq!(status, StatusCode::NOT_FOUND);

  let (status, _) = send(
    &app,
    Method::POST,
    &format!("/admin/competencies/{id}/restore"),
    None,
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(get(&app, "/search?q=mediast").await.1["total"], 1);

  let (status, _) = send(&app, Method::DELETE, "/admin/competencies/9999", None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admin_list_paginates() {
  let app = app(true).await;
  let (status, page) = get(&app, "/admin/competencies?page_size=1").await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(page["total"], 2);
  assert_eq!(page["total_pages"], 2);
  assert_eq!(page["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn admin_list_rejects_out_of_range_pages_and_keeps_serving() {
  let app = app(true).await;
  for query in [
    "page=3&page_size=18446744073709551615",
    "page=18446744073709551615&page_size=500",
    "page_size=501",
    "page=0",
  ] {
    let (status, _) = get(&app, &format!("/admin/competencies?{query}")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{query}");
  }

  let (status, page) = get(&app, "/admin/competencies").await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(page["total"], 2);
  let (status, body) = get(&app, "/search?q=heart").await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["total"], 1);
}

#[tokio::test]
async fn admin_import_and_rebuild() {
  let app = app(true).await;
  let (status, report) = send(
    &app,
    Method::POST,
    "/admin/import",
    Some(json!([{
      "subject_code": "FM",
      "subject_name": "Forensic Medicine",
      "rows": [
        { "code": "FM1.1", "topic": "Toxicology", "text": "Describe arsenic poisoning" },
        { "code": "FM1.2" }
      ]
    }])),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(report["success"], true);
  assert_eq!(report["inserted"], 1);
  assert_eq!(report["skipped"], 1);
  assert_eq!(report["indexed"], 3);
  assert_eq!(get(&app, "/search?q=arsenic").await.1["total"], 1);

  let (status, rebuilt) = send(&app, Method::POST, "/admin/rebuild-index", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(rebuilt["indexed"], 3);
}
