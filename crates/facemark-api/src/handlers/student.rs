//! Handlers for the logged-in student.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/me` | The session's identity |
//! | `POST` | `/me/profile` | `{"email"?, "photo_url"?}`; a blank string clears |
//! | `POST` | `/attendance/mark` | `{"image": "<base64 or data URL>"}` |
//! | `GET`  | `/attendance/today` | Today's record, if any |

use axum::{Json, extract::State};
use facemark_attendance::{CapturedImage, MatchDecision, RecognizeError, RecordOutcome};
use facemark_core::{identity::Identity, notify::Notifier, store::AttendanceStore};
use serde::Deserialize;
use serde_json::{Value, json};

use super::auth::non_blank;
use crate::{AppState, auth::StudentSession, error::ApiError};

async fn identity_of<S, N>(state: &AppState<S, N>, session: &StudentSession) -> Result<Identity, ApiError>
where
  S: AttendanceStore + 'static,
  N: Notifier + 'static,
{
  state
    .store
    .get_identity(session.0)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound("user not found".into()))
}

// ─── Profile ─────────────────────────────────────────────────────────────────

/// `GET /me`
pub async fn me<S, N>(
  State(state): State<AppState<S, N>>,
  session: StudentSession,
) -> Result<Json<Value>, ApiError>
where
  S: AttendanceStore + 'static,
  N: Notifier + 'static,
{
  let identity = identity_of(&state, &session).await?;
  Ok(Json(json!({ "success": true, "user": identity })))
}

#[derive(Debug, Deserialize)]
pub struct ProfileBody {
  pub email:     Option<String>,
  pub photo_url: Option<String>,
}

/// `POST /me/profile` — fields left out are unchanged.
pub async fn update_profile<S, N>(
  State(state): State<AppState<S, N>>,
  session: StudentSession,
  Json(body): Json<ProfileBody>,
) -> Result<Json<Value>, ApiError>
where
  S: AttendanceStore + 'static,
  N: Notifier + 'static,
{
  let mut identity = identity_of(&state, &session).await?;
  let not_found = || ApiError::NotFound("user not found".into());

  if let Some(email) = body.email {
    identity = state
      .store
      .set_identity_email(session.0, non_blank(Some(email)))
      .await
      .map_err(ApiError::store)?
      .ok_or_else(not_found)?;
  }
  if let Some(photo_url) = body.photo_url {
    identity = state
      .store
      .set_identity_photo(session.0, non_blank(Some(photo_url)))
      .await
      .map_err(ApiError::store)?
      .ok_or_else(not_found)?;
  }

  tracing::info!(name = %identity.name, "profile updated");
  Ok(Json(json!({ "success": true, "message": "profile updated", "user": identity })))
}

// ─── Mark attendance ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct MarkBody {
  pub image: Option<String>,
}

/// `POST /attendance/mark`
///
/// A repeat mark on the same day is not an error: it answers 200 with
/// `success: false` and the time of the existing record.
pub async fn mark<S, N>(
  State(state): State<AppState<S, N>>,
  session: StudentSession,
  Json(body): Json<MarkBody>,
) -> Result<Json<Value>, ApiError>
where
  S: AttendanceStore + 'static,
  N: Notifier + 'static,
{
  let no_image = || ApiError::BadRequest("no image provided".into());
  let raw = body.image.filter(|i| !i.trim().is_empty()).ok_or_else(no_image)?;
  let image = CapturedImage::from_base64(&raw).map_err(|e| match e {
    RecognizeError::Empty => no_image(),
    RecognizeError::InvalidBase64(_) => ApiError::BadRequest(e.to_string()),
  })?;

  let identity = identity_of(&state, &session).await?;
  if state.matcher.verify(&image, &identity) == MatchDecision::NoMatch {
    tracing::warn!(name = %identity.name, "face did not match");
    return Err(ApiError::Rejected("face not recognised".into()));
  }

  let policy = state.policies.get().await?;
  let outcome = state
    .recorder
    .record_attendance(identity.id, state.clock.now(), &policy)
    .await?;

  match outcome {
    RecordOutcome::Recorded { identity, record, stats, confirmation } => Ok(Json(json!({
      "success": true,
      "message": "attendance marked successfully",
      "name": record.name,
      "date": record.date,
      "time": record.time,
      "photo_url": identity.photo_url,
      "present_today": stats.present,
      "absent_today": stats.absent(),
      "confirmation": confirmation,
    }))),
    RecordOutcome::AlreadyRecorded { record, .. } => Ok(Json(json!({
      "success": false,
      "message": "attendance already marked for today",
      "name": record.name,
      "date": record.date,
      "time": record.time,
    }))),
    RecordOutcome::IdentityNotFound(_) => Err(ApiError::NotFound("user not found".into())),
  }
}

// ─── Today ───────────────────────────────────────────────────────────────────

/// `GET /attendance/today`
pub async fn today<S, N>(
  State(state): State<AppState<S, N>>,
  session: StudentSession,
) -> Result<Json<Value>, ApiError>
where
  S: AttendanceStore + 'static,
  N: Notifier + 'static,
{
  let identity = identity_of(&state, &session).await?;
  let records: Vec<_> = state
    .store
    .find_attendance(identity.id, &identity.name, state.clock.today())
    .await
    .map_err(ApiError::store)?
    .into_iter()
    .collect();

  Ok(Json(json!({ "success": true, "records": records })))
}
