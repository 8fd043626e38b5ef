//! The `Notifier` trait — the outbound mail boundary.
//!
//! A notifier delivers one [`Notification`] to one recipient and reports
//! success or failure with a human-readable message. It never retries; the
//! caller decides what a failure means.

use std::future::Future;

use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;

use crate::policy::CutoffTime;

/// The template kind plus the fields it needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
  /// Sent once when a student's attendance is recorded.
  Confirmation {
    name: String,
    date: NaiveDate,
    time: NaiveTime,
  },
  /// Sent by reconciliation to students without a record for `date`.
  Absence {
    name:   String,
    date:   NaiveDate,
    cutoff: CutoffTime,
  },
}

impl Notification {
  pub fn kind(&self) -> &'static str {
    match self {
      Self::Confirmation { .. } => "confirmation",
      Self::Absence { .. } => "absence",
    }
  }
}

/// Delivery outcome: `Ok` and `Err` both carry a message meant for logs,
/// never for programmatic inspection.
pub type Delivery = Result<String, String>;

/// Abstraction over a mail transport.
pub trait Notifier: Send + Sync {
  fn send<'a>(
    &'a self,
    recipient: &'a str,
    notification: &'a Notification,
  ) -> impl Future<Output = Delivery> + Send + 'a;
}
