//! Notification policy — the singleton switchboard for outbound mail.

use std::{fmt, str::FromStr};

use chrono::{NaiveTime, Timelike as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::Error;

// ─── Cutoff ──────────────────────────────────────────────────────────────────

/// The nominal "present by" deadline, serialised as `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CutoffTime(NaiveTime);

impl CutoffTime {
  pub fn new(hour: u32, minute: u32) -> Option<Self> {
    NaiveTime::from_hms_opt(hour, minute, 0).map(Self)
  }
}

impl Default for CutoffTime {
  fn default() -> Self { Self(NaiveTime::from_hms_opt(10, 0, 0).unwrap_or_default()) }
}

impl fmt::Display for CutoffTime {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{:02}:{:02}", self.0.hour(), self.0.minute())
  }
}

impl FromStr for CutoffTime {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M")
      .map(Self)
      .map_err(|_| Error::InvalidCutoff(s.to_owned()))
  }
}

impl Serialize for CutoffTime {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(self)
  }
}

impl<'de> Deserialize<'de> for CutoffTime {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let raw = String::deserialize(deserializer)?;
    raw.parse().map_err(serde::de::Error::custom)
  }
}

// ─── Policy ──────────────────────────────────────────────────────────────────

/// Controls which notifications are sent. Replaced wholesale on update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPolicy {
  pub attendance_confirmations: bool,
  pub absence_alerts:           bool,
  pub cutoff_time:              CutoffTime,
}

impl Default for NotificationPolicy {
  fn default() -> Self {
    Self {
      attendance_confirmations: true,
      absence_alerts:           true,
      cutoff_time:              CutoffTime::default(),
    }
  }
}
