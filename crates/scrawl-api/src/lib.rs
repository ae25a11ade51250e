//! JSON-over-HTTP API for scrawl reports.
//!
//! Exposes an axum [`Router`] claiming the `/v1/` namespace, backed by a
//! [`ReportHandler`]. Middleware, body limits and transport concerns are the
//! caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! let app = Router::new()
//!   .route("/health", get(health))
//!   .merge(scrawl_api::reports_router(handler));
//! ```

pub mod error;
pub mod handler;
pub mod reports;

use std::sync::Arc;

use axum::{
  Router,
  routing::{any, get, post},
};
use scrawl_core::{notify::Notifier, store::ReportStore};

pub use error::{ApiError, Operation};
pub use handler::{Rendered, ReportHandler};

/// Build the `/v1/` router for `handler`.
///
/// Every request under `/v1/` gets a terminal response; unknown paths and
/// methods are 404 (never 405), including `HEAD` on a report. Requests outside `/v1/` are left to whatever
/// the router is merged into.
pub fn reports_router<S, N>(handler: Arc<ReportHandler<S, N>>) -> Router<()>
where
  S: ReportStore + 'static,
  N: Notifier + 'static,
{
  Router::new()
    .route(
      "/v1/reports",
      post(reports::create::<S, N>).fallback(reports::not_found),
    )
    .route(
      "/v1/reports/{id}",
      get(reports::fetch::<S, N>)
        .head(reports::not_found)
        .patch(reports::update::<S, N>)
        .fallback(reports::not_found),
    )
    .route("/v1/", any(reports::not_found))
    .route("/v1/{*rest}", any(reports::not_found))
    .with_state(handler)
}

// ─── Integration tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use std::{
    io,
    sync::{
      Mutex,
      atomic::{AtomicUsize, Ordering},
    },
  };

  use axum::{
    body::{Body, to_bytes},
    extract::DefaultBodyLimit,
    http::{HeaderMap, Request, StatusCode, header},
  };
  use scrawl_core::{
    Report, ReportId,
    id::IdGenerator,
    normalize::LineListNormalizer,
    notify::NotifyPolicy,
  };
  use scrawl_store_sql::SqlStore;
  use serde_json::{Value, json};
  use tower::ServiceExt as _;

  use super::*;

  // ── Fakes ──────────────────────────────────────────────────────────────────

  /// Records every payload; fails every delivery when `fail` is set.
  #[derive(Default)]
  struct RecordingNotifier {
    seen: Mutex<Vec<String>>,
    fail: bool,
  }

  impl Notifier for RecordingNotifier {
    type Error = io::Error;

    async fn notify(&self, report_json: &str) -> Result<(), io::Error> {
      self.seen.lock().unwrap().push(report_json.to_owned());
      if self.fail {
        return Err(io::Error::other("channel unavailable"));
      }
      Ok(())
    }
  }

  /// A store whose database is always down.
  struct BrokenStore;

  impl ReportStore for BrokenStore {
    type Error = io::Error;

    async fn insert(&self, _: &Report) -> Result<(), io::Error> {
      Err(io::Error::other("connection refused"))
    }

    async fn find_by_id(&self, _: &ReportId) -> Result<Option<Report>, io::Error> {
      Err(io::Error::other("connection refused"))
    }

    async fn replace_data(&self, _: &ReportId, _: &Value) -> Result<Option<Report>, io::Error> {
      Err(io::Error::other("connection refused"))
    }
  }

  /// Always hands out the same id.
  struct FixedId(&'static str);

  impl IdGenerator for FixedId {
    fn generate(&self) -> scrawl_core::Result<ReportId> { ReportId::parse(self.0) }
  }

  /// Fails every draw, as an exhausted entropy source would.
  struct FailingIds;

  impl IdGenerator for FailingIds {
    fn generate(&self) -> scrawl_core::Result<ReportId> {
      Err(scrawl_core::Error::Generation("entropy source unavailable".into()))
    }
  }

  /// Counts writes reaching an in-memory store.
  struct CountingStore {
    inner:  SqlStore,
    writes: AtomicUsize,
  }

  impl ReportStore for CountingStore {
    type Error = scrawl_store_sql::Error;

    async fn insert(&self, report: &Report) -> scrawl_store_sql::Result<()> {
      self.writes.fetch_add(1, Ordering::SeqCst);
      self.inner.insert(report).await
    }

    async fn find_by_id(&self, id: &ReportId) -> scrawl_store_sql::Result<Option<Report>> {
      self.inner.find_by_id(id).await
    }

    async fn replace_data(
      &self,
      id: &ReportId,
      data: &Value,
    ) -> scrawl_store_sql::Result<Option<Report>> {
      self.writes.fetch_add(1, Ordering::SeqCst);
      self.inner.replace_data(id, data).await
    }
  }

  /// Finds every report, but each one is gone by the time it is written.
  struct VanishingStore;

  impl ReportStore for VanishingStore {
    type Error = io::Error;

    async fn insert(&self, _: &Report) -> Result<(), io::Error> { Ok(()) }

    async fn find_by_id(&self, id: &ReportId) -> Result<Option<Report>, io::Error> {
      Ok(Some(Report::new(id.clone(), json!("old"))))
    }

    async fn replace_data(&self, _: &ReportId, _: &Value) -> Result<Option<Report>, io::Error> {
      Ok(None)
    }
  }

  type Handler = ReportHandler<SqlStore, RecordingNotifier>;

  async fn counting_store() -> Arc<CountingStore> {
    Arc::new(CountingStore {
      inner:  SqlStore::open_in_memory().await.unwrap(),
      writes: AtomicUsize::new(0),
    })
  }

  async fn store() -> Arc<SqlStore> {
    Arc::new(SqlStore::open_in_memory().await.unwrap())
  }

  fn app(handler: Handler) -> Router { reports_router(Arc::new(handler)) }

  struct Reply {
    status:  StatusCode,
    headers: HeaderMap,
    body:    Vec<u8>,
  }

  impl Reply {
    fn json(&self) -> Value { serde_json::from_slice(&self.body).unwrap() }
  }

  async fn send(app: &Router, method: &str, uri: &str, body: impl Into<Body>) -> Reply {
    let req = Request::builder()
      .method(method)
      .uri(uri)
      .body(body.into())
      .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let headers = resp.headers().clone();
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap().to_vec();
    Reply { status, headers, body }
  }

  // ── Create ─────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn create_returns_201_with_generated_id() {
    let app = app(Handler::new(store().await));

    let reply = send(&app, "POST", "/v1/reports", r#"{"msg":"x"}"#).await;
    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(
      reply.headers.get(header::CONTENT_TYPE).unwrap(),
      "application/json; charset=utf-8"
    );

    let body = reply.json();
    assert_eq!(body["id"].as_str().unwrap().len(), 10);
    assert!(body["time"].is_string());
    assert_eq!(body["data"], json!({"msg": "x"}));
  }

  #[tokio::test]
  async fn create_with_empty_body_succeeds() {
    let app = app(Handler::new(store().await));

    let reply = send(&app, "POST", "/v1/reports", Body::empty()).await;
    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(reply.json()["data"], json!(""));
  }

  #[tokio::test]
  async fn created_report_round_trips_through_fetch() {
    let app = app(Handler::new(store().await));

    let created = send(&app, "POST", "/v1/reports", "crash at line 42\r\n").await.json();
    let id = created["id"].as_str().unwrap();

    let fetched = send(&app, "GET", &format!("/v1/reports/{id}"), Body::empty()).await;
    assert_eq!(fetched.status, StatusCode::OK);
    assert_eq!(fetched.json(), created);
    assert_eq!(created["data"], json!("crash at line 42"));
  }

  #[tokio::test]
  async fn concurrent_creates_get_distinct_ids() {
    let app = app(Handler::new(store().await));

    let replies = create_many(&app, 50).await;
    let mut ids: Vec<String> = replies
      .iter()
      .map(|r| r.json()["id"].as_str().unwrap().to_owned())
      .collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 50);
  }

  async fn create_many(app: &Router, n: usize) -> Vec<Reply> {
    let tasks: Vec<_> = (0..n)
      .map(|i| {
        let app = app.clone();
        tokio::spawn(async move { send(&app, "POST", "/v1/reports", format!("{{\"n\":{i}}}")).await })
      })
      .collect();
    let mut replies = Vec::with_capacity(n);
    for task in tasks {
      let reply = task.await.unwrap();
      assert_eq!(reply.status, StatusCode::CREATED);
      replies.push(reply);
    }
    replies
  }

  #[tokio::test]
  async fn oversized_body_is_400_and_nothing_is_stored() {
    let store = store().await;
    let handler = Handler::new(store.clone()).with_id_generator(Arc::new(FixedId("fixedid123")));
    let app = app(handler).layer(DefaultBodyLimit::max(8));

    let reply = send(&app, "POST", "/v1/reports", "x".repeat(64)).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert!(reply.body.is_empty());

    let id = ReportId::parse("fixedid123").unwrap();
    assert!(store.find_by_id(&id).await.unwrap().is_none());
  }

  #[tokio::test]
  async fn duplicate_id_is_an_internal_error() {
    let handler = Handler::new(store().await).with_id_generator(Arc::new(FixedId("samesameid")));
    let app = app(handler);

    assert_eq!(send(&app, "POST", "/v1/reports", "a").await.status, StatusCode::CREATED);
    let second = send(&app, "POST", "/v1/reports", "b").await;
    assert_eq!(second.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(second.body.is_empty());
  }

  #[tokio::test]
  async fn id_generation_failure_is_an_empty_500_and_nothing_is_stored() {
    let store = counting_store().await;
    let handler = ReportHandler::<_, RecordingNotifier>::new(store.clone())
      .with_id_generator(Arc::new(FailingIds));
    let app = reports_router(Arc::new(handler));

    let reply = send(&app, "POST", "/v1/reports", r#"{"msg":"x"}"#).await;
    assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(reply.body.is_empty());
    assert_eq!(store.writes.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn configured_normalizer_is_used() {
    let handler = Handler::new(store().await).with_normalizer(Arc::new(LineListNormalizer));
    let app = app(handler);

    let reply = send(&app, "POST", "/v1/reports", "Alice\nBob\nAlice\n").await;
    assert_eq!(reply.json()["data"], json!(["Alice", "Bob"]));
  }

  // ── Fetch ──────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn fetch_missing_returns_empty_404() {
    let app = app(Handler::new(store().await));

    let reply = send(&app, "GET", "/v1/reports/doesnotexist", Body::empty()).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert!(reply.body.is_empty());
  }

  #[tokio::test]
  async fn store_failure_is_an_empty_500() {
    let app = reports_router(Arc::new(ReportHandler::<_, RecordingNotifier>::new(Arc::new(
      BrokenStore,
    ))));

    let fetch = send(&app, "GET", "/v1/reports/abc", Body::empty()).await;
    assert_eq!(fetch.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(fetch.body.is_empty());

    let create = send(&app, "POST", "/v1/reports", "{}").await;
    assert_eq!(create.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(create.body.is_empty());
  }

  // ── Update ─────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn patch_replaces_data_and_keeps_id_and_time() {
    let app = app(Handler::new(store().await));

    let created = send(&app, "POST", "/v1/reports", r#"{"msg":"x"}"#).await.json();
    let uri = format!("/v1/reports/{}", created["id"].as_str().unwrap());

    let patched = send(&app, "PATCH", &uri, r#"{"msg":"y"}"#).await;
    assert_eq!(patched.status, StatusCode::OK);
    let patched = patched.json();
    assert_eq!(patched["id"], created["id"]);
    assert_eq!(patched["time"], created["time"]);
    assert_eq!(patched["data"], json!({"msg": "y"}));

    let fetched = send(&app, "GET", &uri, Body::empty()).await.json();
    assert_eq!(fetched, patched);
  }

  #[tokio::test]
  async fn patch_missing_returns_404_and_writes_nothing() {
    let store = store().await;
    let app = app(Handler::new(store.clone()));

    let reply = send(&app, "PATCH", "/v1/reports/ghost", r#"{"msg":"y"}"#).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert!(reply.body.is_empty());

    let id = ReportId::parse("ghost").unwrap();
    assert!(store.find_by_id(&id).await.unwrap().is_none());
  }

  #[tokio::test]
  async fn oversized_patch_is_400_and_keeps_the_old_data() {
    let store = store().await;
    let handler = Handler::new(store.clone()).with_id_generator(Arc::new(FixedId("patchlimit")));
    let app = app(handler).layer(DefaultBodyLimit::max(16));

    assert_eq!(send(&app, "POST", "/v1/reports", "a").await.status, StatusCode::CREATED);

    let reply = send(&app, "PATCH", "/v1/reports/patchlimit", "x".repeat(64)).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert!(reply.body.is_empty());

    let id = ReportId::parse("patchlimit").unwrap();
    assert_eq!(store.find_by_id(&id).await.unwrap().unwrap().data, json!("a"));
  }

  #[tokio::test]
  async fn report_deleted_between_lookup_and_write_is_404() {
    let app = reports_router(Arc::new(ReportHandler::<_, RecordingNotifier>::new(Arc::new(
      VanishingStore,
    ))));

    let reply = send(&app, "PATCH", "/v1/reports/gonenow", r#"{"msg":"y"}"#).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert!(reply.body.is_empty());
  }

  // ── Routing ────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn non_utf8_id_is_an_empty_404() {
    let store = counting_store().await;
    let app = reports_router(Arc::new(ReportHandler::<_, RecordingNotifier>::new(store.clone())));

    for method in ["GET", "PATCH"] {
      let reply = send(&app, method, "/v1/reports/%FF", "x").await;
      assert_eq!(reply.status, StatusCode::NOT_FOUND, "{method}");
      assert!(reply.body.is_empty(), "{method}");
    }
    assert_eq!(store.writes.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn head_on_a_report_is_404() {
    let app = app(Handler::new(store().await));

    let created = send(&app, "POST", "/v1/reports", "a").await.json();
    let uri = format!("/v1/reports/{}", created["id"].as_str().unwrap());

    let reply = send(&app, "HEAD", &uri, Body::empty()).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert!(reply.body.is_empty());
  }

  #[tokio::test]
  async fn unmatched_requests_under_v1_are_404() {
    let app = app(Handler::new(store().await));

    for (method, uri) in [
      ("GET", "/v1/reports"),
      ("PUT", "/v1/reports"),
      ("DELETE", "/v1/reports/abc"),
      ("POST", "/v1/reports/abc"),
      ("GET", "/v1/reports/abc/extra"),
      ("GET", "/v1/other"),
      ("GET", "/v1/"),
    ] {
      let reply = send(&app, method, uri, Body::empty()).await;
      assert_eq!(reply.status, StatusCode::NOT_FOUND, "{method} {uri}");
      assert!(reply.body.is_empty(), "{method} {uri}");
    }
  }

  #[tokio::test]
  async fn paths_outside_v1_are_left_to_the_parent_router() {
    let reports = app(Handler::new(store().await));
    let app = Router::new()
      .route("/elsewhere", get(|| async { "mine" }))
      .merge(reports);

    let reply = send(&app, "GET", "/elsewhere", Body::empty()).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body, b"mine");
  }

  // ── Notification ───────────────────────────────────────────────────────────

  #[tokio::test]
  async fn notifier_receives_the_created_report() {
    let notifier = Arc::new(RecordingNotifier::default());
    let handler =
      Handler::new(store().await).with_notifier(notifier.clone(), NotifyPolicy::Required);
    let app = app(handler);

    let reply = send(&app, "POST", "/v1/reports", r#"{"msg":"x"}"#).await;
    assert_eq!(reply.status, StatusCode::CREATED);

    let seen = notifier.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].as_bytes(), reply.body.as_slice());
  }

  #[tokio::test]
  async fn fetch_and_update_do_not_notify() {
    let notifier = Arc::new(RecordingNotifier::default());
    let handler =
      Handler::new(store().await).with_notifier(notifier.clone(), NotifyPolicy::Required);
    let app = app(handler);

    let created = send(&app, "POST", "/v1/reports", "a").await.json();
    let uri = format!("/v1/reports/{}", created["id"].as_str().unwrap());
    send(&app, "GET", &uri, Body::empty()).await;
    send(&app, "PATCH", &uri, "b").await;

    assert_eq!(notifier.seen.lock().unwrap().len(), 1);
  }

  #[tokio::test]
  async fn required_notification_failure_is_500_and_nothing_is_stored() {
    let store = store().await;
    let notifier = Arc::new(RecordingNotifier { fail: true, ..Default::default() });
    let handler = Handler::new(store.clone())
      .with_id_generator(Arc::new(FixedId("notifyfail")))
      .with_notifier(notifier, NotifyPolicy::Required);
    let app = app(handler);

    let reply = send(&app, "POST", "/v1/reports", "{}").await;
    assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(reply.body.is_empty());

    let id = ReportId::parse("notifyfail").unwrap();
    assert!(store.find_by_id(&id).await.unwrap().is_none());
  }

  #[tokio::test]
  async fn best_effort_notification_failure_still_creates() {
    let store = store().await;
    let notifier = Arc::new(RecordingNotifier { fail: true, ..Default::default() });
    let handler =
      Handler::new(store.clone()).with_notifier(notifier.clone(), NotifyPolicy::BestEffort);
    let app = app(handler);

    let reply = send(&app, "POST", "/v1/reports", "{}").await;
    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(notifier.seen.lock().unwrap().len(), 1);

    let id = ReportId::parse(reply.json()["id"].as_str().unwrap()).unwrap();
    assert!(store.find_by_id(&id).await.unwrap().is_some());
  }

  // ── Handler ────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn update_of_missing_report_is_not_found() {
    let handler = Handler::new(store().await);
    let id = ReportId::parse("nobody").unwrap();

    let err = handler.update(&id, b"x").await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound));
    assert_eq!(err.status(), StatusCode::NOT_FOUND);
  }
}
