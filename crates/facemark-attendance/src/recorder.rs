//! Marking a student present for the day.

use std::sync::Arc;

use chrono::{NaiveDateTime, SubsecRound as _};
use facemark_core::{
  attendance::{AttendanceRecord, DayStats, InsertOutcome, NewAttendance},
  identity::Identity,
  notify::Notification,
  policy::NotificationPolicy,
  store::AttendanceStore,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
  Error, Result,
  dispatch::{ConfirmationJob, Dispatcher, SubmitError},
};

// ─── Outcomes ────────────────────────────────────────────────────────────────

/// What happened to the confirmation mail for a fresh record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Confirmation {
  /// Handed to the worker pool; delivery is eventual.
  Queued,
  /// Confirmations are switched off in the policy.
  PolicyDisabled,
  /// The identity has no usable email address.
  NoEmail,
  /// The worker pool's queue was full; the mail is dropped.
  QueueFull,
  /// The worker pool has shut down.
  Unavailable,
}

#[derive(Debug, Clone)]
pub enum RecordOutcome {
  Recorded {
    identity:     Identity,
    record:       AttendanceRecord,
    stats:        DayStats,
    confirmation: Confirmation,
  },
  /// A record for this identity and day already existed; nothing was
  /// written or sent.
  AlreadyRecorded {
    identity: Identity,
    record:   AttendanceRecord,
  },
  IdentityNotFound(Uuid),
}

// ─── Recorder ────────────────────────────────────────────────────────────────

pub struct Recorder<S> {
  store:      Arc<S>,
  dispatcher: Dispatcher,
}

impl<S> Clone for Recorder<S> {
  fn clone(&self) -> Self {
    Self {
      store:      Arc::clone(&self.store),
      dispatcher: self.dispatcher.clone(),
    }
  }
}

impl<S: AttendanceStore> Recorder<S> {
  pub fn new(store: Arc<S>, dispatcher: Dispatcher) -> Self { Self { store, dispatcher } }

  /// Record `identity_id` as present at `now`, at most once per calendar
  /// day. The time of day is kept to whole seconds.
  ///
  /// The caller's result never depends on the confirmation mail; at most it
  /// reports how the mail was handled.
  pub async fn record_attendance(
    &self,
    identity_id: Uuid,
    now: NaiveDateTime,
    policy: &NotificationPolicy,
  ) -> Result<RecordOutcome> {
    let Some(identity) = self.store.get_identity(identity_id).await.map_err(Error::storage)?
    else {
      return Ok(RecordOutcome::IdentityNotFound(identity_id));
    };

    let now = now.trunc_subsecs(0);
    let date = now.date();

    if let Some(record) = self
      .store
      .find_attendance(identity.id, &identity.name, date)
      .await
      .map_err(Error::storage)?
    {
      return Ok(RecordOutcome::AlreadyRecorded { identity, record });
    }

    let input = NewAttendance {
      identity_id: identity.id,
      name:        identity.name.clone(),
      date,
      time:        now.time(),
    };
    let record = match self.store.insert_attendance(input).await.map_err(Error::storage)? {
      InsertOutcome::Inserted(record) => record,
      // Lost the race to a concurrent mark for the same day.
      InsertOutcome::Duplicate(record) => {
        return Ok(RecordOutcome::AlreadyRecorded { identity, record });
      }
    };
    tracing::info!(name = %record.name, %date, time = %record.time, "attendance recorded");

    let stats = self.store.day_stats(date).await.map_err(Error::storage)?;
    let confirmation = self.confirm(&identity, &record, policy);

    Ok(RecordOutcome::Recorded { identity, record, stats, confirmation })
  }

  fn confirm(
    &self,
    identity: &Identity,
    record: &AttendanceRecord,
    policy: &NotificationPolicy,
  ) -> Confirmation {
    if !policy.attendance_confirmations {
      return Confirmation::PolicyDisabled;
    }
    let Some(recipient) = identity.notify_address() else {
      return Confirmation::NoEmail;
    };

    let job = ConfirmationJob {
      record_id:    record.id,
      recipient:    recipient.to_owned(),
      notification: Notification::Confirmation {
        name: record.name.clone(),
        date: record.date,
        time: record.time,
      },
    };
    match self.dispatcher.submit(job) {
      Ok(()) => Confirmation::Queued,
      Err(SubmitError::Full) => {
        tracing::warn!(%recipient, record_id = %record.id, "confirmation queue full, mail dropped");
        Confirmation::QueueFull
      }
      Err(SubmitError::Closed) => {
        tracing::error!(%recipient, record_id = %record.id, "confirmation dispatcher closed");
        Confirmation::Unavailable
      }
    }
  }
}
