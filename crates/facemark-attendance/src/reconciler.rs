//! Absence reconciliation: mail every reachable identity that has no record
//! for a given day.
//!
//! Runs sequentially, one notifier call at a time, each bounded by a timeout.
//! A failed or slow recipient is logged and counted; the batch carries on.
//! Only storage errors abort the run.
//!
//! There is no "absence mail sent" flag, so running this twice for the same
//! day mails every still-absent identity twice.

use std::{sync::Arc, time::Duration};

use chrono::NaiveDate;
use facemark_core::{
  notify::{Notification, Notifier},
  policy::NotificationPolicy,
  store::AttendanceStore,
};
use serde::Serialize;

use crate::{Error, Result, dispatch::send_with_timeout};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReconciliationReport {
  /// Absence alerts are switched off; nothing was read or sent.
  Disabled,
  Completed {
    date:       NaiveDate,
    /// Identities with an email address.
    candidates: usize,
    /// Candidates without a record for `date`.
    absent:     usize,
    sent:       usize,
    failed:     usize,
  },
}

impl ReconciliationReport {
  /// Successfully delivered absence notifications.
  pub fn sent(&self) -> usize {
    match self {
      Self::Disabled => 0,
      Self::Completed { sent, .. } => *sent,
    }
  }
}

pub struct Reconciler<S, N> {
  store:    Arc<S>,
  notifier: Arc<N>,
  timeout:  Duration,
}

impl<S, N> Clone for Reconciler<S, N> {
  fn clone(&self) -> Self {
    Self {
      store:    Arc::clone(&self.store),
      notifier: Arc::clone(&self.notifier),
      timeout:  self.timeout,
    }
  }
}

impl<S: AttendanceStore, N: Notifier> Reconciler<S, N> {
  pub fn new(store: Arc<S>, notifier: Arc<N>, timeout: Duration) -> Self {
    Self { store, notifier, timeout }
  }

  pub async fn reconcile_absences(
    &self,
    date: NaiveDate,
    policy: &NotificationPolicy,
  ) -> Result<ReconciliationReport> {
    if !policy.absence_alerts {
      tracing::info!(%date, "absence alerts disabled, skipping reconciliation");
      return Ok(ReconciliationReport::Disabled);
    }

    let candidates = self.store.identities_with_email().await.map_err(Error::storage)?;
    let (mut absent, mut sent, mut failed) = (0, 0, 0);

    for identity in &candidates {
      let Some(recipient) = identity.notify_address() else { continue };

      let record = self
        .store
        .find_attendance(identity.id, &identity.name, date)
        .await
        .map_err(Error::storage)?;
      if record.is_some() {
        continue;
      }
      absent += 1;

      let notification = Notification::Absence {
        name:   identity.name.clone(),
        date,
        cutoff: policy.cutoff_time,
      };
      match send_with_timeout(self.notifier.as_ref(), recipient, &notification, self.timeout).await {
        Ok(message) => {
          sent += 1;
          tracing::info!(%recipient, name = %identity.name, %date, %message, "absence alert sent");
        }
        Err(message) => {
          failed += 1;
          tracing::warn!(%recipient, name = %identity.name, %date, %message, "absence alert failed");
        }
      }
    }

    tracing::info!(%date, candidates = candidates.len(), absent, sent, failed, "absence reconciliation finished");
    Ok(ReconciliationReport::Completed {
      date,
      candidates: candidates.len(),
      absent,
      sent,
      failed,
    })
  }
}
