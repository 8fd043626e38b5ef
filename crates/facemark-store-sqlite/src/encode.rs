//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 UTC with microsecond precision. Calendar dates are
//! `YYYY-MM-DD`, times of day `HH:MM:SS`. UUIDs are hyphenated lowercase.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Utc};
use facemark_core::{
  attendance::AttendanceRecord,
  identity::{Identity, Provider},
  policy::{CutoffTime, NotificationPolicy},
};
use uuid::Uuid;

use crate::{Error, Result};

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S";

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Also accepts the naive `YYYY-MM-DD HH:MM:SS[.f]` form written by the
/// legacy layout, read as UTC.
pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
    return Ok(dt.with_timezone(&Utc));
  }
  NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
    .map(|naive| naive.and_utc())
    .map_err(|e| Error::Decode(format!("timestamp {s:?}: {e}")))
}

// ─── Calendar date / time of day ─────────────────────────────────────────────

pub fn encode_date(d: NaiveDate) -> String { d.format(DATE_FORMAT).to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, DATE_FORMAT)
    .map_err(|e| Error::Decode(format!("date {s:?}: {e}")))
}

pub fn encode_time(t: NaiveTime) -> String { t.format(TIME_FORMAT).to_string() }

pub fn decode_time(s: &str) -> Result<NaiveTime> {
  NaiveTime::parse_from_str(s, TIME_FORMAT)
    .map_err(|e| Error::Decode(format!("time {s:?}: {e}")))
}

// ─── Provider ────────────────────────────────────────────────────────────────

pub fn encode_provider(p: Provider) -> &'static str { p.into() }

pub fn decode_provider(s: &str) -> Result<Provider> {
  s.parse()
    .map_err(|_| Error::Core(facemark_core::Error::UnknownProvider(s.to_owned())))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawIdentity::from_row`].
pub const IDENTITY_COLUMNS: &str = "id, name, email, password_hash, photo_url, \
   COALESCE(provider, 'local'), provider_id, created_at";

/// Raw strings read directly from a `users` row.
pub struct RawIdentity {
  pub id:            String,
  pub name:          String,
  pub email:         Option<String>,
  pub password_hash: String,
  pub photo_url:     Option<String>,
  pub provider:      String,
  pub provider_id:   Option<String>,
  pub created_at:    String,
}

impl RawIdentity {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:            row.get(0)?,
      name:          row.get(1)?,
      email:         row.get(2)?,
      password_hash: row.get(3)?,
      photo_url:     row.get(4)?,
      provider:      row.get(5)?,
      provider_id:   row.get(6)?,
      created_at:    row.get(7)?,
    })
  }

  pub fn into_identity(self) -> Result<Identity> {
    Ok(Identity {
      id:            decode_uuid(&self.id)?,
      name:          self.name,
      email:         self.email,
      password_hash: self.password_hash,
      photo_url:     self.photo_url,
      provider:      decode_provider(&self.provider)?,
      provider_id:   self.provider_id,
      created_at:    decode_dt(&self.created_at)?,
    })
  }
}

/// Column list matching [`RawAttendance::from_row`].
pub const ATTENDANCE_COLUMNS: &str =
  "id, name, user_id, date, time, COALESCE(email_sent, 0), created_at";

/// Raw values read directly from an `attendance` row.
pub struct RawAttendance {
  pub id:         String,
  pub name:       String,
  pub user_id:    Option<String>,
  pub date:       String,
  pub time:       String,
  pub email_sent: bool,
  pub created_at: String,
}

impl RawAttendance {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:         row.get(0)?,
      name:       row.get(1)?,
      user_id:    row.get(2)?,
      date:       row.get(3)?,
      time:       row.get(4)?,
      email_sent: row.get(5)?,
      created_at: row.get(6)?,
    })
  }

  pub fn into_record(self) -> Result<AttendanceRecord> {
    Ok(AttendanceRecord {
      id:          decode_uuid(&self.id)?,
      name:        self.name,
      identity_id: self.user_id.as_deref().map(decode_uuid).transpose()?,
      date:        decode_date(&self.date)?,
      time:        decode_time(&self.time)?,
      email_sent:  self.email_sent,
      created_at:  decode_dt(&self.created_at)?,
    })
  }
}

/// Column list matching [`RawPolicy::from_row`].
pub const POLICY_COLUMNS: &str = "COALESCE(attendance_confirmations, 1), \
   COALESCE(absence_alerts, 1), COALESCE(cutoff_time, '10:00')";

pub struct RawPolicy {
  pub attendance_confirmations: bool,
  pub absence_alerts:           bool,
  pub cutoff_time:              String,
}

impl RawPolicy {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      attendance_confirmations: row.get(0)?,
      absence_alerts:           row.get(1)?,
      cutoff_time:              row.get(2)?,
    })
  }

  pub fn into_policy(self) -> Result<NotificationPolicy> {
    Ok(NotificationPolicy {
      attendance_confirmations: self.attendance_confirmations,
      absence_alerts:           self.absence_alerts,
      cutoff_time:              self.cutoff_time.parse::<CutoffTime>()?,
    })
  }
}
