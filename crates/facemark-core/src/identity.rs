//! Identity — a registered person who can log in and mark attendance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where an identity originated.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Provider {
  /// Registered directly with a name and password.
  #[default]
  Local,
  Google,
  Github,
}

/// A stored identity. The display name is unique across the store.
#[derive(Debug, Clone, Serialize)]
pub struct Identity {
  pub id:            Uuid,
  pub name:          String,
  pub email:         Option<String>,
  /// Argon2 PHC string; never serialised to clients.
  #[serde(skip_serializing)]
  pub password_hash: String,
  pub photo_url:     Option<String>,
  pub provider:      Provider,
  pub provider_id:   Option<String>,
  pub created_at:    DateTime<Utc>,
}

impl Identity {
  /// The email address to notify, if one is set and non-blank.
  pub fn notify_address(&self) -> Option<&str> {
    self
      .email
      .as_deref()
      .map(str::trim)
      .filter(|e| !e.is_empty())
  }
}

/// Input to [`crate::store::AttendanceStore::create_identity`].
#[derive(Debug, Clone)]
pub struct NewIdentity {
  pub name:          String,
  pub email:         Option<String>,
  pub password_hash: String,
  pub photo_url:     Option<String>,
  pub provider:      Provider,
  pub provider_id:   Option<String>,
}

impl NewIdentity {
  /// A locally registered identity with no email or photo.
  pub fn local(name: impl Into<String>, password_hash: impl Into<String>) -> Self {
    Self {
      name:          name.into(),
      email:         None,
      password_hash: password_hash.into(),
      photo_url:     None,
      provider:      Provider::Local,
      provider_id:   None,
    }
  }
}
