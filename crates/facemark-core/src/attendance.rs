//! Attendance records — the daily ledger.
//!
//! A record is a presence mark for one identity on one calendar day. The
//! ledger holds at most one record per (identity, date); the only mutation a
//! record ever sees is the asynchronous flip of `email_sent` once a
//! confirmation has been delivered.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Record ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
  pub id:          Uuid,
  /// Display name at the time of marking; denormalised for listings/export.
  pub name:        String,
  /// `None` only for rows written before records were linked to identities.
  pub identity_id: Option<Uuid>,
  pub date:        NaiveDate,
  pub time:        NaiveTime,
  pub email_sent:  bool,
  pub created_at:  DateTime<Utc>,
}

/// Input to [`crate::store::AttendanceStore::insert_attendance`].
#[derive(Debug, Clone)]
pub struct NewAttendance {
  pub identity_id: Uuid,
  pub name:        String,
  pub date:        NaiveDate,
  pub time:        NaiveTime,
}

/// Result of an insert against the (identity, date) uniqueness constraint.
#[derive(Debug, Clone)]
pub enum InsertOutcome {
  Inserted(AttendanceRecord),
  /// Another record for the same identity and date already exists.
  Duplicate(AttendanceRecord),
}

// ─── Queries ─────────────────────────────────────────────────────────────────

/// Filter for [`crate::store::AttendanceStore::list_attendance`]. Empty
/// fields match everything.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LedgerQuery {
  pub date: Option<NaiveDate>,
  pub name: Option<String>,
}

// ─── Aggregates ──────────────────────────────────────────────────────────────

/// Same-day presence counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DayStats {
  pub date:    NaiveDate,
  /// Distinct people with at least one record on `date`.
  pub present: u64,
  /// All registered identities.
  pub total:   u64,
}

impl DayStats {
  /// Identities without a record; saturates at zero when legacy rows for
  /// unregistered names push `present` above `total`.
  pub fn absent(&self) -> u64 { self.total.saturating_sub(self.present) }
}
