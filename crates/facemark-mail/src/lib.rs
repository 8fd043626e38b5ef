//! Mail transports implementing [`facemark_core::notify::Notifier`].
//!
//! - [`SmtpNotifier`] sends through an SMTP relay.
//! - [`ConsoleNotifier`] only logs, for development and for deployments
//!   without a relay.
//!
//! [`MailNotifier`] picks one at startup.

pub mod console;
pub mod smtp;
pub mod templates;

use facemark_core::notify::{Delivery, Notification, Notifier};
use thiserror::Error;

pub use console::ConsoleNotifier;
pub use smtp::{SmtpConfig, SmtpNotifier};

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid address: {0}")]
  Address(#[from] lettre::address::AddressError),

  #[error("smtp error: {0}")]
  Smtp(#[from] lettre::transport::smtp::Error),

  #[error("mail task failed: {0}")]
  Join(#[source] tokio::task::JoinError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The transport chosen from configuration.
pub enum MailNotifier {
  Smtp(SmtpNotifier),
  Console(ConsoleNotifier),
}

impl MailNotifier {
  /// SMTP when configured, console otherwise.
  pub fn from_config(smtp: Option<SmtpConfig>) -> Result<Self> {
    match smtp {
      Some(config) => Ok(Self::Smtp(SmtpNotifier::new(config)?)),
      None => {
        tracing::warn!("no SMTP relay configured, notifications will only be logged");
        Ok(Self::Console(ConsoleNotifier))
      }
    }
  }
}

impl Notifier for MailNotifier {
  async fn send<'a>(&'a self, recipient: &'a str, notification: &'a Notification) -> Delivery {
    match self {
      Self::Smtp(n) => n.send(recipient, notification).await,
      Self::Console(n) => n.send(recipient, notification).await,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn missing_relay_falls_back_to_console() {
    assert!(matches!(MailNotifier::from_config(None).unwrap(), MailNotifier::Console(_)));
  }
}
