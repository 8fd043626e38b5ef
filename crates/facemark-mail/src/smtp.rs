//! SMTP delivery through `lettre`.
//!
//! `lettre`'s `SmtpTransport` is blocking, so each send runs on the blocking
//! pool. Timeouts are the caller's business.

use facemark_core::notify::{Delivery, Notification, Notifier};
use lettre::{
  Message, SmtpTransport, Transport,
  message::{Mailbox, MultiPart},
  transport::smtp::authentication::Credentials,
};
use serde::Deserialize;

use crate::{Result, templates};

fn default_port() -> u16 { 587 }

fn default_starttls() -> bool { true }

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
  pub host:       String,
  #[serde(default = "default_port")]
  pub port:       u16,
  pub username:   String,
  pub password:   String,
  pub from_email: String,
  #[serde(default)]
  pub from_name:  Option<String>,
  /// Upgrade a plain connection with STARTTLS (port 587) rather than
  /// connecting over implicit TLS (port 465).
  #[serde(default = "default_starttls")]
  pub starttls:   bool,
}

pub struct SmtpNotifier {
  transport: SmtpTransport,
  from:      Mailbox,
}

impl SmtpNotifier {
  pub fn new(config: SmtpConfig) -> Result<Self> {
    let from = Mailbox::new(config.from_name, config.from_email.parse()?);
    let creds = Credentials::new(config.username, config.password);

    let builder = if config.starttls {
      SmtpTransport::starttls_relay(&config.host)?
    } else {
      SmtpTransport::relay(&config.host)?
    };
    let transport = builder.port(config.port).credentials(creds).build();

    tracing::info!(host = %config.host, port = config.port, "SMTP notifier configured");
    Ok(Self { transport, from })
  }

  /// Open and close one connection to the relay.
  pub async fn test_connection(&self) -> Result<bool> {
    let transport = self.transport.clone();
    let ok = tokio::task::spawn_blocking(move || transport.test_connection())
      .await
      .map_err(crate::Error::Join)??;
    Ok(ok)
  }

  fn build_message(&self, recipient: &str, notification: &Notification) -> Result<Message, String> {
    let to: Mailbox = recipient
      .parse()
      .map_err(|e| format!("invalid recipient {recipient:?}: {e}"))?;
    let rendered = templates::render(notification);

    Message::builder()
      .from(self.from.clone())
      .to(to)
      .subject(rendered.subject)
      .multipart(MultiPart::alternative_plain_html(rendered.text, rendered.html))
      .map_err(|e| format!("failed to build email: {e}"))
  }
}

impl Notifier for SmtpNotifier {
  async fn send<'a>(&'a self, recipient: &'a str, notification: &'a Notification) -> Delivery {
    let message = self.build_message(recipient, notification)?;
    let transport = self.transport.clone();

    match tokio::task::spawn_blocking(move || transport.send(&message)).await {
      Ok(Ok(_)) => Ok(format!("{} email sent to {recipient}", notification.kind())),
      Ok(Err(e)) => Err(format!("failed to send {} email: {e}", notification.kind())),
      Err(e) => Err(format!("mail task failed: {e}")),
    }
  }
}

#[cfg(test)]
mod tests {
  use chrono::{NaiveDate, NaiveTime};

  use super::*;

  fn config() -> SmtpConfig {
    SmtpConfig {
      host:       "smtp.example.com".into(),
      port:       587,
      username:   "user".into(),
      password:   "secret".into(),
      from_email: "attendance@example.com".into(),
      from_name:  Some("FaceMark".into()),
      starttls:   true,
    }
  }

  fn confirmation() -> Notification {
    Notification::Confirmation {
      name: "Ann".into(),
      date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
      time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
    }
  }

  #[test]
  fn bad_sender_address_is_rejected() {
    let mut config = config();
    config.from_email = "not an address".into();
    assert!(SmtpNotifier::new(config).is_err());
  }

  #[test]
  fn message_headers() {
    let notifier = SmtpNotifier::new(config()).unwrap();
    let message = notifier.build_message("ann@example.com", &confirmation()).unwrap();
    let raw = String::from_utf8(message.formatted()).unwrap();
    assert!(raw.contains("attendance@example.com"));
    assert!(raw.contains("To: ann@example.com"));
    assert!(raw.contains("Subject: Attendance Confirmed - FaceMark"));
  }

  #[tokio::test]
  async fn bad_recipient_fails_without_connecting() {
    let notifier = SmtpNotifier::new(config()).unwrap();
    let err = notifier.send("nobody", &confirmation()).await.unwrap_err();
    assert!(err.contains("invalid recipient"));
  }
}
