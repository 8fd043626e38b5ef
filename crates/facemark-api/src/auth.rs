//! Password credentials, cookie sessions, and the session extractors.
//!
//! A session is an opaque v4 UUID in an HTTP-only cookie, mapped in memory
//! to either a student identity or the administrator. Sessions do not
//! survive a restart.

use std::{collections::HashMap, time::Instant};

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use axum::{extract::FromRequestParts, http::request::Parts};
use facemark_core::{notify::Notifier, store::AttendanceStore};
use rand_core::OsRng;
use tokio::sync::RwLock;
use tower_cookies::{
  Cookie, Cookies,
  cookie::{SameSite, time::Duration},
};
use uuid::Uuid;

use crate::{AppState, error::ApiError};

// ─── Passwords ───────────────────────────────────────────────────────────────

/// Hash `password` into an argon2 PHC string.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map(|hash| hash.to_string())
    .map_err(|e| ApiError::Internal(format!("argon2 error: {e}")))
}

/// Check `password` against a PHC string. Unparseable hashes never verify.
pub fn verify_password(password: &str, phc: &str) -> bool {
  let Ok(parsed) = PasswordHash::new(phc) else {
    return false;
  };
  Argon2::default()
    .verify_password(password.as_bytes(), &parsed)
    .is_ok()
}

/// The single administrator account, from configuration.
#[derive(Clone)]
pub struct AdminCredentials {
  pub username:      String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
}

impl AdminCredentials {
  pub fn verify(&self, username: &str, password: &str) -> bool {
    username == self.username && verify_password(password, &self.password_hash)
  }
}

// ─── Sessions ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Session {
  Student(Uuid),
  Admin,
}

/// How long a session lasts when the configuration does not say.
pub const DEFAULT_SESSION_TTL: std::time::Duration = std::time::Duration::from_secs(12 * 60 * 60);

struct Entry {
  session: Session,
  issued:  Instant,
}

/// Sessions expire `ttl` after login. Expired entries are dropped whenever
/// a session starts, and when a request presents one.
pub struct SessionStore {
  cookie_name: String,
  ttl:         std::time::Duration,
  sessions:    RwLock<HashMap<Uuid, Entry>>,
}

impl SessionStore {
  pub fn new(cookie_name: impl Into<String>, ttl: std::time::Duration) -> Self {
    Self { cookie_name: cookie_name.into(), ttl, sessions: RwLock::default() }
  }

  /// Start `session` under a fresh token, replacing any session the
  /// request already carried.
  pub async fn start(&self, cookies: &Cookies, session: Session) {
    let token = Uuid::new_v4();
    {
      let mut sessions = self.sessions.write().await;
      if let Some(old) = self.token(cookies) {
        sessions.remove(&old);
      }
      let before = sessions.len();
      sessions.retain(|_, entry| entry.issued.elapsed() < self.ttl);
      if sessions.len() < before {
        tracing::debug!(expired = before - sessions.len(), "pruned expired sessions");
      }
      sessions.insert(token, Entry { session, issued: Instant::now() });
    }

    let max_age = Duration::seconds(i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX));
    let cookie = Cookie::build((self.cookie_name.clone(), token.to_string()))
      .path("/")
      .http_only(true)
      .same_site(SameSite::Lax)
      .max_age(max_age)
      .build();
    cookies.add(cookie);
  }

  pub async fn current(&self, cookies: &Cookies) -> Option<Session> {
    let token = self.token(cookies)?;
    {
      let sessions = self.sessions.read().await;
      let entry = sessions.get(&token)?;
      if entry.issued.elapsed() < self.ttl {
        return Some(entry.session);
      }
    }
    self.sessions.write().await.remove(&token);
    tracing::debug!("session expired");
    None
  }

  /// Forget the request's session and expire its cookie.
  pub async fn end(&self, cookies: &Cookies) -> Option<Session> {
    let ended = match self.token(cookies) {
      Some(token) => self.sessions.write().await.remove(&token),
      None => None,
    };

    let cookie = Cookie::build((self.cookie_name.clone(), ""))
      .path("/")
      .http_only(true)
      .max_age(Duration::ZERO)
      .build();
    cookies.add(cookie);
    ended.map(|entry| entry.session)
  }

  #[cfg(test)]
  pub(crate) async fn len(&self) -> usize { self.sessions.read().await.len() }

  fn token(&self, cookies: &Cookies) -> Option<Uuid> {
    cookies
      .get(&self.cookie_name)
      .and_then(|c| Uuid::parse_str(c.value()).ok())
  }
}

// ─── Extractors ──────────────────────────────────────────────────────────────

async fn session_of<S, N>(parts: &mut Parts, state: &AppState<S, N>) -> Option<Session>
where
  S: AttendanceStore + 'static,
  N: Notifier + 'static,
{
  let cookies = Cookies::from_request_parts(parts, state).await.ok()?;
  state.sessions.current(&cookies).await
}

/// The logged-in student's identity id.
pub struct StudentSession(pub Uuid);

impl<S, N> FromRequestParts<AppState<S, N>> for StudentSession
where
  S: AttendanceStore + 'static,
  N: Notifier + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S, N>,
  ) -> Result<Self, Self::Rejection> {
    match session_of(parts, state).await {
      Some(Session::Student(id)) => Ok(Self(id)),
      _ => Err(ApiError::not_logged_in()),
    }
  }
}

/// Present in a handler means the request carries the admin session.
pub struct AdminSession;

impl<S, N> FromRequestParts<AppState<S, N>> for AdminSession
where
  S: AttendanceStore + 'static,
  N: Notifier + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S, N>,
  ) -> Result<Self, Self::Rejection> {
    match session_of(parts, state).await {
      Some(Session::Admin) => Ok(Self),
      _ => Err(ApiError::Forbidden),
    }
  }
}
