//! The `AttendanceStore` trait.
//!
//! Implemented by storage backends (e.g. `facemark-store-sqlite`). The
//! recorder, reconciler, and HTTP layer depend on this abstraction only.
//!
//! Backends must enforce (identity, date) uniqueness themselves: a racing
//! second insert has to come back as [`InsertOutcome::Duplicate`], not as a
//! second row.

use std::future::Future;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::{
  attendance::{AttendanceRecord, DayStats, InsertOutcome, LedgerQuery, NewAttendance},
  identity::{Identity, NewIdentity},
  policy::NotificationPolicy,
};

/// All methods return `Send` futures so the trait can be used from axum
/// handlers and spawned tasks.
pub trait AttendanceStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Identities ────────────────────────────────────────────────────────

  /// Persist a new identity. Returns `None` if the display name is taken,
  /// including when a concurrent insert claimed it first.
  fn create_identity(
    &self,
    input: NewIdentity,
  ) -> impl Future<Output = Result<Option<Identity>, Self::Error>> + Send + '_;

  fn get_identity(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Identity>, Self::Error>> + Send + '_;

  fn find_identity_by_name<'a>(
    &'a self,
    name: &'a str,
  ) -> impl Future<Output = Result<Option<Identity>, Self::Error>> + Send + 'a;

  /// All identities, oldest first.
  fn list_identities(
    &self,
  ) -> impl Future<Output = Result<Vec<Identity>, Self::Error>> + Send + '_;

  /// Identities whose email is set and non-blank.
  fn identities_with_email(
    &self,
  ) -> impl Future<Output = Result<Vec<Identity>, Self::Error>> + Send + '_;

  /// Attach (or clear) an email address. Returns the updated identity, or
  /// `None` if `id` does not exist.
  fn set_identity_email(
    &self,
    id: Uuid,
    email: Option<String>,
  ) -> impl Future<Output = Result<Option<Identity>, Self::Error>> + Send + '_;

  /// Attach (or clear) the enrollment photo reference.
  fn set_identity_photo(
    &self,
    id: Uuid,
    photo_url: Option<String>,
  ) -> impl Future<Output = Result<Option<Identity>, Self::Error>> + Send + '_;

  // ── Ledger ────────────────────────────────────────────────────────────

  /// Insert a record, or return the existing one for the same identity and
  /// date.
  fn insert_attendance(
    &self,
    input: NewAttendance,
  ) -> impl Future<Output = Result<InsertOutcome, Self::Error>> + Send + '_;

  /// The record for `identity` on `date`. Rows without an identity
  /// reference are matched on `name` instead.
  fn find_attendance<'a>(
    &'a self,
    identity_id: Uuid,
    name: &'a str,
    date: NaiveDate,
  ) -> impl Future<Output = Result<Option<AttendanceRecord>, Self::Error>> + Send + 'a;

  /// Records matching `query`, newest first.
  fn list_attendance<'a>(
    &'a self,
    query: &'a LedgerQuery,
  ) -> impl Future<Output = Result<Vec<AttendanceRecord>, Self::Error>> + Send + 'a;

  /// Flip `email_sent` on a record after a confirmation was delivered.
  fn mark_email_sent(
    &self,
    record_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Present/total counts for `date`.
  fn day_stats(
    &self,
    date: NaiveDate,
  ) -> impl Future<Output = Result<DayStats, Self::Error>> + Send + '_;

  // ── Policy ────────────────────────────────────────────────────────────

  /// The stored policy, if one has been written.
  fn load_policy(
    &self,
  ) -> impl Future<Output = Result<Option<NotificationPolicy>, Self::Error>> + Send + '_;

  /// Write `policy` only if no policy row exists yet. Returns whichever
  /// policy is stored afterwards and whether this call wrote it.
  fn insert_policy_if_absent(
    &self,
    policy: NotificationPolicy,
  ) -> impl Future<Output = Result<(NotificationPolicy, bool), Self::Error>> + Send + '_;

  /// Replace the stored policy wholesale.
  fn save_policy(
    &self,
    policy: NotificationPolicy,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}
