//! Log-only delivery for development.

use facemark_core::notify::{Delivery, Notification, Notifier};

use crate::templates;

/// Writes each notification to the log instead of sending it.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
  async fn send<'a>(&'a self, recipient: &'a str, notification: &'a Notification) -> Delivery {
    let rendered = templates::render(notification);
    tracing::info!(
      %recipient,
      kind = notification.kind(),
      subject = %rendered.subject,
      body = %rendered.text,
      "email (console)",
    );
    Ok(format!("{} email logged for {recipient}", notification.kind()))
  }
}
