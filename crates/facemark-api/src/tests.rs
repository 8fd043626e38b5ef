use std::{
  sync::{Arc, Mutex},
  time::Duration,
};

use axum::{
  Router,
  body::Body,
  http::{Request, Response, StatusCode, header},
};
use chrono::NaiveDate;
use facemark_attendance::{
  CapturedImage, DispatchConfig, DispatchWorkers, Dispatcher, FaceMatcher, MatchDecision,
};
use facemark_core::{
  identity::Identity,
  notify::{Delivery, Notification, Notifier},
};
use facemark_store_sqlite::SqliteStore;
use serde_json::{Value, json};
use tower::ServiceExt as _;

use super::*;
use crate::auth::hash_password;

// ─── Fixtures ────────────────────────────────────────────────────────────────

/// Collects every send; never fails.
#[derive(Clone, Default)]
struct MockNotifier {
  sent: Arc<Mutex<Vec<(String, Notification)>>>,
}

impl MockNotifier {
  fn recipients(&self) -> Vec<String> {
    self.sent.lock().unwrap().iter().map(|(to, _)| to.clone()).collect()
  }
}

impl Notifier for MockNotifier {
  async fn send<'a>(&'a self, recipient: &'a str, notification: &'a Notification) -> Delivery {
    self.sent.lock().unwrap().push((recipient.to_owned(), notification.clone()));
    Ok("ok".into())
  }
}

struct RejectAll;

impl FaceMatcher for RejectAll {
  fn verify(&self, _: &CapturedImage, _: &Identity) -> MatchDecision { MatchDecision::NoMatch }
}

const COOKIE: &str = "facemark_session";
const IMAGE: &str = "data:image/jpeg;base64,aGVsbG8=";

struct TestApp {
  app:      Router,
  notifier: MockNotifier,
  workers:  DispatchWorkers,
}

fn may_first_at(h: u32, m: u32) -> FixedClock {
  FixedClock(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap().and_hms_opt(h, m, 0).unwrap())
}

async fn make_app_with(
  configure: impl FnOnce(AppState<SqliteStore, MockNotifier>) -> AppState<SqliteStore, MockNotifier>,
) -> TestApp {
  let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
  let notifier = MockNotifier::default();
  let (dispatcher, workers) =
    Dispatcher::spawn(Arc::clone(&store), Arc::new(notifier.clone()), DispatchConfig::default());

  let state = AppState::new(store, Arc::new(notifier.clone()), dispatcher, ApiConfig {
    admin:          AdminCredentials {
      username:      "admin".into(),
      password_hash: hash_password("admin-secret").unwrap(),
    },
    cookie_name:    COOKIE.into(),
    notify_timeout: Duration::from_secs(5),
    session_ttl:    DEFAULT_SESSION_TTL,
  });
  let state = configure(state.with_clock(may_first_at(9, 0)));

  TestApp { app: router(state), notifier, workers }
}

async fn make_app() -> TestApp { make_app_with(|s| s).await }

impl TestApp {
  async fn call(&self, method: &str, uri: &str, cookie: Option<&str>, body: Option<Value>) -> Response<Body> {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
      req = req.header(header::COOKIE, cookie);
    }
    let req = match body {
      Some(json) => req
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json.to_string())),
      None => req.body(Body::empty()),
    }
    .unwrap();
    self.app.clone().oneshot(req).await.unwrap()
  }

  async fn register(&self, name: &str, email: Option<&str>) {
    let resp = self
      .call("POST", "/auth/register", None, Some(json!({
        "name": name,
        "password": "pw",
        "email": email,
      })))
      .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
  }

  /// Log in and return the `name=value` cookie pair.
  async fn login(&self, name: &str) -> String {
    let resp = self
      .call("POST", "/auth/login", None, Some(json!({ "name": name, "password": "pw" })))
      .await;
    assert_eq!(resp.status(), StatusCode::OK);
    session_cookie(&resp)
  }

  async fn admin(&self) -> String {
    let resp = self
      .call("POST", "/auth/admin/login", None, Some(json!({
        "username": "admin",
        "password": "admin-secret",
      })))
      .await;
    assert_eq!(resp.status(), StatusCode::OK);
    session_cookie(&resp)
  }

  /// Wait for queued confirmations to be delivered.
  async fn drain(self) -> MockNotifier {
    drop(self.app);
    self.workers.join().await;
    self.notifier
  }
}

fn session_cookie(resp: &Response<Body>) -> String {
  let set_cookie = resp.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap();
  assert!(set_cookie.contains("HttpOnly"), "Set-Cookie: {set_cookie}");
  set_cookie.split(';').next().unwrap().to_owned()
}

async fn json_body(resp: Response<Body>) -> Value {
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  serde_json::from_slice(&bytes).unwrap()
}

async fn text_body(resp: Response<Body>) -> String {
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  String::from_utf8(bytes.to_vec()).unwrap()
}

// ── Registration / login ─────────────────────────────────────────────────────

#[tokio::test]
async fn register_validates_and_rejects_duplicates() {
  let t = make_app().await;
  t.register("Ann", Some("ann@example.com")).await;

  let dup = t
    .call("POST", "/auth/register", None, Some(json!({ "name": "Ann", "password": "x" })))
    .await;
  assert_eq!(dup.status(), StatusCode::CONFLICT);
  assert_eq!(json_body(dup).await["success"], false);

  let blank = t
    .call("POST", "/auth/register", None, Some(json!({ "name": "  ", "password": "x" })))
    .await;
  assert_eq!(blank.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_registrations_conflict_instead_of_failing() {
  let t = make_app().await;

  let mut handles = Vec::new();
  for _ in 0..16 {
    let app = t.app.clone();
    handles.push(tokio::spawn(async move {
      let req = Request::builder()
        .method("POST")
        .uri("/auth/register")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "name": "Ann", "password": "pw" }).to_string()))
        .unwrap();
      app.oneshot(req).await.unwrap().status()
    }));
  }

  let mut statuses = Vec::new();
  for h in handles {
    statuses.push(h.await.unwrap());
  }
  assert_eq!(statuses.iter().filter(|s| **s == StatusCode::CREATED).count(), 1);
  assert_eq!(statuses.iter().filter(|s| **s == StatusCode::CONFLICT).count(), 15, "{statuses:?}");
}

#[tokio::test]
async fn registration_never_echoes_password_hash() {
  let t = make_app().await;
  let resp = t
    .call("POST", "/auth/register", None, Some(json!({ "name": "Ann", "password": "pw" })))
    .await;
  let body = json_body(resp).await;
  assert_eq!(body["user"]["name"], "Ann");
  assert!(body["user"].get("password_hash").is_none());
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
  let t = make_app().await;
  t.register("Ann", None).await;
  let resp = t
    .call("POST", "/auth/login", None, Some(json!({ "name": "Ann", "password": "nope" })))
    .await;
  assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

  let admin = t
    .call("POST", "/auth/admin/login", None, Some(json!({ "username": "admin", "password": "nope" })))
    .await;
  assert_eq!(admin.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_ends_the_session() {
  let t = make_app().await;
  t.register("Ann", None).await;
  let cookie = t.login("Ann").await;

  let resp = t.call("POST", "/auth/logout", Some(&cookie), None).await;
  assert_eq!(resp.status(), StatusCode::OK);

  let me = t.call("GET", "/me", Some(&cookie), None).await;
  assert_eq!(me.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn expired_sessions_are_rejected_and_dropped() {
  let mut sessions = None;
  let t = make_app_with(|mut state| {
    state.sessions = Arc::new(SessionStore::new(COOKIE, Duration::ZERO));
    sessions = Some(Arc::clone(&state.sessions));
    state
  })
  .await;
  let sessions = sessions.unwrap();
  t.register("Ann", None).await;

  // Logging in without a cookie never replaces an old entry; expiry does.
  t.login("Ann").await;
  let cookie = t.login("Ann").await;
  assert_eq!(sessions.len().await, 1);

  let me = t.call("GET", "/me", Some(&cookie), None).await;
  assert_eq!(me.status(), StatusCode::UNAUTHORIZED);
  assert_eq!(sessions.len().await, 0);
}

#[tokio::test]
async fn session_cookie_carries_max_age() {
  let t = make_app().await;
  t.register("Ann", None).await;
  let resp = t
    .call("POST", "/auth/login", None, Some(json!({ "name": "Ann", "password": "pw" })))
    .await;
  let set_cookie = resp.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap();
  assert!(
    set_cookie.contains(&format!("Max-Age={}", DEFAULT_SESSION_TTL.as_secs())),
    "Set-Cookie: {set_cookie}"
  );
}

#[tokio::test]
async fn profile_attaches_email() {
  let t = make_app().await;
  t.register("Ann", None).await;
  let cookie = t.login("Ann").await;

  let resp = t
    .call("POST", "/me/profile", Some(&cookie), Some(json!({ "email": "ann@example.com" })))
    .await;
  assert_eq!(resp.status(), StatusCode::OK);
  assert_eq!(json_body(resp).await["user"]["email"], "ann@example.com");

  let cleared = t
    .call("POST", "/me/profile", Some(&cookie), Some(json!({ "email": "" })))
    .await;
  assert_eq!(json_body(cleared).await["user"]["email"], Value::Null);
}

// ── Marking attendance ───────────────────────────────────────────────────────

#[tokio::test]
async fn mark_requires_student_session() {
  let t = make_app().await;
  let resp = t.call("POST", "/attendance/mark", None, Some(json!({ "image": IMAGE }))).await;
  assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
  assert_eq!(json_body(resp).await["message"], "not logged in");
}

#[tokio::test]
async fn mark_requires_image() {
  let t = make_app().await;
  t.register("Ann", None).await;
  let cookie = t.login("Ann").await;

  let resp = t.call("POST", "/attendance/mark", Some(&cookie), Some(json!({}))).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  assert_eq!(json_body(resp).await["message"], "no image provided");
}

#[tokio::test]
async fn mark_then_mark_again() {
  let t = make_app().await;
  t.register("Ann", Some("ann@example.com")).await;
  t.register("Bob", Some("bob@example.com")).await;
  let cookie = t.login("Ann").await;

  let first = t.call("POST", "/attendance/mark", Some(&cookie), Some(json!({ "image": IMAGE }))).await;
  assert_eq!(first.status(), StatusCode::OK);
  let first = json_body(first).await;
  assert_eq!(first["success"], true);
  assert_eq!(first["name"], "Ann");
  assert_eq!(first["date"], "2024-05-01");
  assert_eq!(first["time"], "09:00:00");
  assert_eq!(first["present_today"], 1);
  assert_eq!(first["absent_today"], 1);
  assert_eq!(first["confirmation"], "queued");

  let again = t.call("POST", "/attendance/mark", Some(&cookie), Some(json!({ "image": IMAGE }))).await;
  assert_eq!(again.status(), StatusCode::OK);
  let again = json_body(again).await;
  assert_eq!(again["success"], false);
  assert_eq!(again["time"], "09:00:00");

  let today = json_body(t.call("GET", "/attendance/today", Some(&cookie), None).await).await;
  assert_eq!(today["records"].as_array().unwrap().len(), 1);

  let notifier = t.drain().await;
  assert_eq!(notifier.recipients(), ["ann@example.com"]);
}

#[tokio::test]
async fn unmatched_face_is_rejected() {
  let t = make_app_with(|s| s.with_matcher(RejectAll)).await;
  t.register("Ann", None).await;
  let cookie = t.login("Ann").await;

  let resp = t.call("POST", "/attendance/mark", Some(&cookie), Some(json!({ "image": IMAGE }))).await;
  assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

// ── Admin ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn admin_routes_reject_students_and_strangers() {
  let t = make_app().await;
  t.register("Ann", None).await;
  let student = t.login("Ann").await;

  for cookie in [None, Some(student.as_str())] {
    let resp = t.call("GET", "/admin/stats", cookie, None).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(json_body(resp).await["message"], "admin access required");
  }
}

#[tokio::test]
async fn ledger_listing_filters_and_validates() {
  let t = make_app().await;
  t.register("Ann", None).await;
  t.register("Bob", None).await;
  for name in ["Ann", "Bob"] {
    let cookie = t.login(name).await;
    t.call("POST", "/attendance/mark", Some(&cookie), Some(json!({ "image": IMAGE }))).await;
  }
  let admin = t.admin().await;

  let all = json_body(t.call("GET", "/admin/attendance?date=2024-05-01&name=", Some(&admin), None).await).await;
  assert_eq!(all["records"].as_array().unwrap().len(), 2);

  let bob = json_body(t.call("GET", "/admin/attendance?name=Bob", Some(&admin), None).await).await;
  let records = bob["records"].as_array().unwrap();
  assert_eq!(records.len(), 1);
  assert_eq!(records[0]["name"], "Bob");

  let bad = t.call("GET", "/admin/attendance?date=May%201", Some(&admin), None).await;
  assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn stats_and_users() {
  let t = make_app().await;
  t.register("Ann", Some("ann@example.com")).await;
  t.register("Bob", None).await;
  let cookie = t.login("Ann").await;
  t.call("POST", "/attendance/mark", Some(&cookie), Some(json!({ "image": IMAGE }))).await;
  let admin = t.admin().await;

  let stats = json_body(t.call("GET", "/admin/stats", Some(&admin), None).await).await;
  assert_eq!(stats["date"], "2024-05-01");
  assert_eq!((stats["present"].as_u64(), stats["absent"].as_u64(), stats["total"].as_u64()), (Some(1), Some(1), Some(2)));

  let other_day = json_body(t.call("GET", "/admin/stats?date=2024-05-02", Some(&admin), None).await).await;
  assert_eq!(other_day["present"], 0);

  let users = json_body(t.call("GET", "/admin/users", Some(&admin), None).await).await;
  let users = users["users"].as_array().unwrap();
  assert_eq!(users.len(), 2);
  assert_eq!(users[0]["email"], "ann@example.com");
}

#[tokio::test]
async fn export_is_csv_attachment() {
  let t = make_app().await;
  t.register("Doe, Jane", None).await;
  let cookie = t.login("Doe, Jane").await;
  t.call("POST", "/attendance/mark", Some(&cookie), Some(json!({ "image": IMAGE }))).await;
  let admin = t.admin().await;

  let resp = t.call("GET", "/admin/attendance/export", Some(&admin), None).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let ct = resp.headers().get(header::CONTENT_TYPE).unwrap().to_str().unwrap();
  assert!(ct.starts_with("text/csv"), "Content-Type: {ct}");
  assert_eq!(
    resp.headers().get(header::CONTENT_DISPOSITION).unwrap(),
    "attachment; filename=attendance_export.csv",
  );
  assert_eq!(
    text_body(resp).await,
    "Name,Date,Time\r\n\"Doe, Jane\",2024-05-01,09:00:00\r\n",
  );
}

#[tokio::test]
async fn notification_settings_round_trip() {
  let t = make_app().await;
  let admin = t.admin().await;

  let initial = json_body(t.call("GET", "/admin/notification-settings", Some(&admin), None).await).await;
  assert_eq!(initial["settings"], json!({
    "attendance_confirmations": true,
    "absence_alerts": true,
    "cutoff_time": "10:00",
  }));

  let wanted = json!({
    "attendance_confirmations": false,
    "absence_alerts": true,
    "cutoff_time": "08:45",
  });
  let resp = t.call("POST", "/admin/notification-settings", Some(&admin), Some(wanted.clone())).await;
  assert_eq!(resp.status(), StatusCode::OK);

  let stored = json_body(t.call("GET", "/admin/notification-settings", Some(&admin), None).await).await;
  assert_eq!(stored["settings"], wanted);

  let bad = t
    .call("POST", "/admin/notification-settings", Some(&admin), Some(json!({ "cutoff_time": "8am" })))
    .await;
  assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn check_absences_mails_the_absent() {
  let t = make_app().await;
  t.register("Ann", Some("ann@example.com")).await;
  t.register("Bob", Some("bob@example.com")).await;
  t.register("Cy", None).await;
  let ann = t.login("Ann").await;
  t.call("POST", "/attendance/mark", Some(&ann), Some(json!({ "image": IMAGE }))).await;
  let admin = t.admin().await;

  let resp = json_body(t.call("POST", "/admin/check-absences", Some(&admin), None).await).await;
  assert_eq!(resp["success"], true);
  assert_eq!(resp["message"], "absence notifications sent to 1 students");
  assert_eq!(resp["report"]["status"], "completed");
  assert_eq!(resp["report"]["absent"], 1);

  let notifier = t.drain().await;
  let recipients = notifier.recipients();
  assert!(recipients.contains(&"bob@example.com".to_owned()));
  assert!(!recipients.iter().any(|r| r.starts_with("cy")));
}

#[tokio::test]
async fn check_absences_respects_disabled_alerts() {
  let t = make_app().await;
  t.register("Bob", Some("bob@example.com")).await;
  let admin = t.admin().await;
  t.call("POST", "/admin/notification-settings", Some(&admin), Some(json!({ "absence_alerts": false })))
    .await;

  let resp = json_body(t.call("POST", "/admin/check-absences", Some(&admin), None).await).await;
  assert_eq!(resp["success"], false);
  assert_eq!(resp["report"]["status"], "disabled");

  let notifier = t.drain().await;
  assert!(notifier.recipients().is_empty());
}
