//! JSON HTTP API for FaceMark.
//!
//! Exposes an axum [`Router`] backed by any
//! [`facemark_core::store::AttendanceStore`] and
//! [`facemark_core::notify::Notifier`]. Students and the administrator log in
//! with cookie sessions; TLS and request tracing are the caller's concern.
//!
//! | Method | Path | Session |
//! |--------|------|---------|
//! | `POST` | `/auth/register` | |
//! | `POST` | `/auth/login` | |
//! | `POST` | `/auth/admin/login` | |
//! | `POST` | `/auth/logout` | any |
//! | `GET`  | `/me` | student |
//! | `POST` | `/me/profile` | student |
//! | `POST` | `/attendance/mark` | student |
//! | `GET`  | `/attendance/today` | student |
//! | `GET`  | `/admin/attendance` | admin |
//! | `GET`  | `/admin/attendance/export` | admin |
//! | `GET`  | `/admin/stats` | admin |
//! | `GET`  | `/admin/users` | admin |
//! | `GET`/`POST` | `/admin/notification-settings` | admin |
//! | `POST` | `/admin/check-absences` | admin |

pub mod auth;
pub mod csv;
pub mod error;
pub mod handlers;

use std::{sync::Arc, time::Duration};

use axum::{
  Router,
  routing::{get, post},
};
use chrono::{NaiveDate, NaiveDateTime};
use facemark_attendance::{
  Dispatcher, FaceMatcher, PlaceholderMatcher, PolicyAccess, Reconciler, Recorder,
};
use facemark_core::{notify::Notifier, store::AttendanceStore};
use tower_cookies::CookieManagerLayer;

pub use auth::{AdminCredentials, DEFAULT_SESSION_TTL, SessionStore};
pub use error::ApiError;

// ─── Clock ───────────────────────────────────────────────────────────────────

/// Source of the local wall-clock time used to date attendance.
pub trait Clock: Send + Sync {
  fn now(&self) -> NaiveDateTime;

  fn today(&self) -> NaiveDate { self.now().date() }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> NaiveDateTime { chrono::Local::now().naive_local() }
}

/// Always reports the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
  fn now(&self) -> NaiveDateTime { self.0 }
}

// ─── Application state ───────────────────────────────────────────────────────

pub struct ApiConfig {
  pub admin:          AdminCredentials,
  pub cookie_name:    String,
  /// Bound on each absence-alert send during reconciliation.
  pub notify_timeout: Duration,
  pub session_ttl:    Duration,
}

/// Shared state threaded through all handlers.
pub struct AppState<S, N> {
  pub store:      Arc<S>,
  pub recorder:   Recorder<S>,
  pub reconciler: Reconciler<S, N>,
  pub policies:   PolicyAccess<S>,
  pub matcher:    Arc<dyn FaceMatcher>,
  pub sessions:   Arc<SessionStore>,
  pub admin:      Arc<AdminCredentials>,
  pub clock:      Arc<dyn Clock>,
}

impl<S, N> Clone for AppState<S, N> {
  fn clone(&self) -> Self {
    Self {
      store:      Arc::clone(&self.store),
      recorder:   self.recorder.clone(),
      reconciler: self.reconciler.clone(),
      policies:   self.policies.clone(),
      matcher:    Arc::clone(&self.matcher),
      sessions:   Arc::clone(&self.sessions),
      admin:      Arc::clone(&self.admin),
      clock:      Arc::clone(&self.clock),
    }
  }
}

impl<S, N> AppState<S, N>
where
  S: AttendanceStore + 'static,
  N: Notifier + 'static,
{
  /// Wire the attendance services over `store`. Uses the system clock and
  /// the placeholder face matcher.
  pub fn new(store: Arc<S>, notifier: Arc<N>, dispatcher: Dispatcher, config: ApiConfig) -> Self {
    Self {
      recorder:   Recorder::new(Arc::clone(&store), dispatcher),
      reconciler: Reconciler::new(Arc::clone(&store), notifier, config.notify_timeout),
      policies:   PolicyAccess::new(Arc::clone(&store)),
      matcher:    Arc::new(PlaceholderMatcher),
      sessions:   Arc::new(SessionStore::new(config.cookie_name, config.session_ttl)),
      admin:      Arc::new(config.admin),
      clock:      Arc::new(SystemClock),
      store,
    }
  }

  pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
    self.clock = Arc::new(clock);
    self
  }

  pub fn with_matcher(mut self, matcher: impl FaceMatcher + 'static) -> Self {
    self.matcher = Arc::new(matcher);
    self
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the API router, including the cookie layer sessions depend on.
pub fn router<S, N>(state: AppState<S, N>) -> Router
where
  S: AttendanceStore + 'static,
  N: Notifier + 'static,
{
  use handlers::{admin, auth, student};

  Router::new()
    // Authentication
    .route("/auth/register", post(auth::register::<S, N>))
    .route("/auth/login", post(auth::login::<S, N>))
    .route("/auth/admin/login", post(auth::admin_login::<S, N>))
    .route("/auth/logout", post(auth::logout::<S, N>))
    // Student
    .route("/me", get(student::me::<S, N>))
    .route("/me/profile", post(student::update_profile::<S, N>))
    .route("/attendance/mark", post(student::mark::<S, N>))
    .route("/attendance/today", get(student::today::<S, N>))
    // Administrator
    .route("/admin/attendance", get(admin::list_attendance::<S, N>))
    .route("/admin/attendance/export", get(admin::export::<S, N>))
    .route("/admin/stats", get(admin::stats::<S, N>))
    .route("/admin/users", get(admin::users::<S, N>))
    .route(
      "/admin/notification-settings",
      get(admin::get_settings::<S, N>).post(admin::set_settings::<S, N>),
    )
    .route("/admin/check-absences", post(admin::check_absences::<S, N>))
    .layer(CookieManagerLayer::new())
    .with_state(state)
}

#[cfg(test)]
mod tests;
