//! Handlers for `/auth` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/auth/register` | `{"name", "password", "email"?, "photo_url"?}`; 409 on a taken name |
//! | `POST` | `/auth/login` | `{"name", "password"}` |
//! | `POST` | `/auth/admin/login` | `{"username", "password"}` |
//! | `POST` | `/auth/logout` | Ends whichever session the cookie names |

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use facemark_core::{identity::NewIdentity, notify::Notifier, store::AttendanceStore};
use serde::Deserialize;
use serde_json::json;
use tower_cookies::Cookies;

use crate::{
  AppState,
  auth::{Session, hash_password, verify_password},
  error::ApiError,
};

/// `None` for absent or blank input.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
  value
    .map(|v| v.trim().to_owned())
    .filter(|v| !v.is_empty())
}

// ─── Register ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RegisterBody {
  #[serde(default)]
  pub name:      String,
  #[serde(default)]
  pub password:  String,
  pub email:     Option<String>,
  pub photo_url: Option<String>,
}

/// `POST /auth/register`
pub async fn register<S, N>(
  State(state): State<AppState<S, N>>,
  Json(body): Json<RegisterBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: AttendanceStore + 'static,
  N: Notifier + 'static,
{
  let name = body.name.trim();
  if name.is_empty() || body.password.is_empty() {
    return Err(ApiError::BadRequest("name and password are required".into()));
  }

  let taken = || ApiError::Conflict(format!("name {name:?} is already registered"));
  if state
    .store
    .find_identity_by_name(name)
    .await
    .map_err(ApiError::store)?
    .is_some()
  {
    return Err(taken());
  }

  let mut input = NewIdentity::local(name, hash_password(&body.password)?);
  input.email = non_blank(body.email);
  input.photo_url = non_blank(body.photo_url);

  // The lookup above is only a fast path; the store decides races.
  let identity = state
    .store
    .create_identity(input)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(taken)?;
  tracing::info!(name = %identity.name, id = %identity.id, "identity registered");

  Ok((
    StatusCode::CREATED,
    Json(json!({
      "success": true,
      "message": "registration successful",
      "user": identity,
    })),
  ))
}

// ─── Student login ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LoginBody {
  pub name:     String,
  pub password: String,
}

/// `POST /auth/login`
pub async fn login<S, N>(
  State(state): State<AppState<S, N>>,
  cookies: Cookies,
  Json(body): Json<LoginBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: AttendanceStore + 'static,
  N: Notifier + 'static,
{
  let identity = state
    .store
    .find_identity_by_name(body.name.trim())
    .await
    .map_err(ApiError::store)?
    .filter(|identity| verify_password(&body.password, &identity.password_hash))
    .ok_or_else(|| ApiError::Unauthorized("invalid name or password".into()))?;

  state.sessions.start(&cookies, Session::Student(identity.id)).await;
  tracing::info!(name = %identity.name, "student logged in");

  Ok(Json(json!({
    "success": true,
    "message": format!("welcome back, {}", identity.name),
    "user": identity,
  })))
}

// ─── Admin login ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AdminLoginBody {
  pub username: String,
  pub password: String,
}

/// `POST /auth/admin/login`
pub async fn admin_login<S, N>(
  State(state): State<AppState<S, N>>,
  cookies: Cookies,
  Json(body): Json<AdminLoginBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: AttendanceStore + 'static,
  N: Notifier + 'static,
{
  if !state.admin.verify(&body.username, &body.password) {
    tracing::warn!(username = %body.username, "rejected admin login");
    return Err(ApiError::Unauthorized("invalid admin credentials".into()));
  }

  state.sessions.start(&cookies, Session::Admin).await;
  tracing::info!("admin logged in");
  Ok(Json(json!({ "success": true, "message": "admin login successful" })))
}

// ─── Logout ──────────────────────────────────────────────────────────────────

/// `POST /auth/logout`
pub async fn logout<S, N>(
  State(state): State<AppState<S, N>>,
  cookies: Cookies,
) -> Json<serde_json::Value>
where
  S: AttendanceStore + 'static,
  N: Notifier + 'static,
{
  if let Some(session) = state.sessions.end(&cookies).await {
    tracing::debug!(?session, "session ended");
  }
  Json(json!({ "success": true, "message": "logged out" }))
}
