use std::{
  collections::HashSet,
  sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
  },
  time::Duration,
};

use facemark_core::notify::{Delivery, Notification, Notifier};
use tokio::sync::{Notify, Semaphore};

/// Records every send. Can be told to fail specific recipients, to stall, or
/// to park until [`RecordingNotifier::open_gate`] is called.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
  failing:  HashSet<String>,
  delay:    Option<Duration>,
  gate:     Option<Arc<Semaphore>>,
  started:  Arc<Notify>,
  attempts: Arc<AtomicUsize>,
  sent:     Arc<Mutex<Vec<(String, Notification)>>>,
}

impl RecordingNotifier {
  pub fn new() -> Self { Self::default() }

  pub fn failing_for(mut self, recipient: &str) -> Self {
    self.failing.insert(recipient.to_owned());
    self
  }

  pub fn with_delay(mut self, delay: Duration) -> Self {
    self.delay = Some(delay);
    self
  }

  pub fn gated(mut self) -> Self {
    self.gate = Some(Arc::new(Semaphore::new(0)));
    self
  }

  pub fn open_gate(&self) {
    if let Some(gate) = &self.gate {
      gate.add_permits(64);
    }
  }

  /// Resolves once some send has begun.
  pub async fn wait_started(&self) { self.started.notified().await }

  pub fn attempts(&self) -> usize { self.attempts.load(Ordering::SeqCst) }

  pub fn sent(&self) -> Vec<(String, Notification)> { self.sent.lock().unwrap().clone() }

  pub fn sent_to(&self) -> Vec<String> {
    self.sent().into_iter().map(|(to, _)| to).collect()
  }
}

impl Notifier for RecordingNotifier {
  async fn send<'a>(&'a self, recipient: &'a str, notification: &'a Notification) -> Delivery {
    self.attempts.fetch_add(1, Ordering::SeqCst);
    self.started.notify_one();

    if let Some(gate) = &self.gate {
      let _permit = gate.acquire().await;
    }
    if let Some(delay) = self.delay {
      tokio::time::sleep(delay).await;
    }
    if self.failing.contains(recipient) {
      return Err(format!("{recipient} rejected"));
    }

    self.sent.lock().unwrap().push((recipient.to_owned(), notification.clone()));
    Ok("delivered".to_owned())
  }
}
