//! Handlers for `/admin` endpoints. All require the admin session.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/admin/attendance` | Optional `?date=YYYY-MM-DD&name=`; newest first |
//! | `GET`  | `/admin/attendance/export` | Same filters; `text/csv` |
//! | `GET`  | `/admin/stats` | Optional `?date=`, default today |
//! | `GET`  | `/admin/users` | |
//! | `GET`  | `/admin/notification-settings` | |
//! | `POST` | `/admin/notification-settings` | Whole-policy replace |
//! | `POST` | `/admin/check-absences` | Reconcile today |

use axum::{
  Json,
  extract::{Query, State},
  http::header,
  response::IntoResponse,
};
use chrono::NaiveDate;
use facemark_attendance::ReconciliationReport;
use facemark_core::{
  attendance::LedgerQuery,
  notify::Notifier,
  policy::{CutoffTime, NotificationPolicy},
  store::AttendanceStore,
};
use serde::Deserialize;
use serde_json::{Value, json};

use super::auth::non_blank;
use crate::{AppState, auth::AdminSession, csv, error::ApiError};

// ─── Filters ─────────────────────────────────────────────────────────────────

/// Raw query parameters; blank values mean "no filter".
#[derive(Debug, Default, Deserialize)]
pub struct LedgerParams {
  pub date: Option<String>,
  pub name: Option<String>,
}

fn parse_date(raw: Option<String>) -> Result<Option<NaiveDate>, ApiError> {
  non_blank(raw)
    .map(|d| {
      NaiveDate::parse_from_str(&d, "%Y-%m-%d")
        .map_err(|_| ApiError::BadRequest(format!("invalid date {d:?}: expected YYYY-MM-DD")))
    })
    .transpose()
}

impl LedgerParams {
  fn into_query(self) -> Result<LedgerQuery, ApiError> {
    Ok(LedgerQuery { date: parse_date(self.date)?, name: non_blank(self.name) })
  }
}

// ─── Ledger ──────────────────────────────────────────────────────────────────

/// `GET /admin/attendance[?date=&name=]`
pub async fn list_attendance<S, N>(
  State(state): State<AppState<S, N>>,
  _admin: AdminSession,
  Query(params): Query<LedgerParams>,
) -> Result<Json<Value>, ApiError>
where
  S: AttendanceStore + 'static,
  N: Notifier + 'static,
{
  let query = params.into_query()?;
  let records = state.store.list_attendance(&query).await.map_err(ApiError::store)?;
  Ok(Json(json!({ "success": true, "records": records })))
}

/// `GET /admin/attendance/export[?date=&name=]`
pub async fn export<S, N>(
  State(state): State<AppState<S, N>>,
  _admin: AdminSession,
  Query(params): Query<LedgerParams>,
) -> Result<impl IntoResponse, ApiError>
where
  S: AttendanceStore + 'static,
  N: Notifier + 'static,
{
  let query = params.into_query()?;
  let records = state.store.list_attendance(&query).await.map_err(ApiError::store)?;

  let mut body = String::new();
  csv::write_row(&mut body, ["Name", "Date", "Time"]);
  for record in &records {
    csv::write_row(&mut body, [
      record.name.clone(),
      record.date.format("%Y-%m-%d").to_string(),
      record.time.format("%H:%M:%S").to_string(),
    ]);
  }
  tracing::info!(rows = records.len(), "attendance exported");

  Ok((
    [
      (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
      (header::CONTENT_DISPOSITION, "attachment; filename=attendance_export.csv"),
    ],
    body,
  ))
}

// ─── Stats / users ───────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct StatsParams {
  pub date: Option<String>,
}

/// `GET /admin/stats[?date=]`
pub async fn stats<S, N>(
  State(state): State<AppState<S, N>>,
  _admin: AdminSession,
  Query(params): Query<StatsParams>,
) -> Result<Json<Value>, ApiError>
where
  S: AttendanceStore + 'static,
  N: Notifier + 'static,
{
  let date = parse_date(params.date)?.unwrap_or_else(|| state.clock.today());
  let stats = state.store.day_stats(date).await.map_err(ApiError::store)?;
  Ok(Json(json!({
    "success": true,
    "date": stats.date,
    "present": stats.present,
    "absent": stats.absent(),
    "total": stats.total,
  })))
}

/// `GET /admin/users`
pub async fn users<S, N>(
  State(state): State<AppState<S, N>>,
  _admin: AdminSession,
) -> Result<Json<Value>, ApiError>
where
  S: AttendanceStore + 'static,
  N: Notifier + 'static,
{
  let users: Vec<Value> = state
    .store
    .list_identities()
    .await
    .map_err(ApiError::store)?
    .into_iter()
    .map(|u| json!({ "id": u.id, "name": u.name, "email": u.email, "photo_url": u.photo_url }))
    .collect();
  Ok(Json(json!({ "success": true, "users": users })))
}

// ─── Notification settings ───────────────────────────────────────────────────

/// `GET /admin/notification-settings`
pub async fn get_settings<S, N>(
  State(state): State<AppState<S, N>>,
  _admin: AdminSession,
) -> Result<Json<Value>, ApiError>
where
  S: AttendanceStore + 'static,
  N: Notifier + 'static,
{
  let policy = state.policies.get().await?;
  Ok(Json(json!({ "success": true, "settings": policy })))
}

fn enabled() -> bool { true }

/// Omitted fields take their default value rather than keeping the stored
/// one: every POST replaces the whole policy.
#[derive(Debug, Deserialize)]
pub struct SettingsBody {
  #[serde(default = "enabled")]
  pub attendance_confirmations: bool,
  #[serde(default = "enabled")]
  pub absence_alerts:           bool,
  pub cutoff_time:              Option<String>,
}

/// `POST /admin/notification-settings`
pub async fn set_settings<S, N>(
  State(state): State<AppState<S, N>>,
  _admin: AdminSession,
  Json(body): Json<SettingsBody>,
) -> Result<Json<Value>, ApiError>
where
  S: AttendanceStore + 'static,
  N: Notifier + 'static,
{
  let cutoff_time = match body.cutoff_time {
    Some(raw) => raw
      .parse::<CutoffTime>()
      .map_err(|e| ApiError::BadRequest(e.to_string()))?,
    None => CutoffTime::default(),
  };
  let policy = state
    .policies
    .set(NotificationPolicy {
      attendance_confirmations: body.attendance_confirmations,
      absence_alerts: body.absence_alerts,
      cutoff_time,
    })
    .await?;

  Ok(Json(json!({
    "success": true,
    "message": "settings updated successfully",
    "settings": policy,
  })))
}

// ─── Reconciliation ──────────────────────────────────────────────────────────

/// `POST /admin/check-absences`
pub async fn check_absences<S, N>(
  State(state): State<AppState<S, N>>,
  _admin: AdminSession,
) -> Result<Json<Value>, ApiError>
where
  S: AttendanceStore + 'static,
  N: Notifier + 'static,
{
  let policy = state.policies.get().await?;
  let report = state
    .reconciler
    .reconcile_absences(state.clock.today(), &policy)
    .await?;

  let body = match &report {
    ReconciliationReport::Disabled => json!({
      "success": false,
      "message": "absence alerts are disabled",
      "report": report,
    }),
    ReconciliationReport::Completed { sent, .. } => json!({
      "success": true,
      "message": format!("absence notifications sent to {sent} students"),
      "report": report,
    }),
  };
  Ok(Json(body))
}
